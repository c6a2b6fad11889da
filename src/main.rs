// Entrypoint for the CLI application.
// - Keeps `main` small: load config, authenticate, fetch folders and hand
//   everything to the sorting loop.
// - Returns `anyhow::Result` so startup failures print with context.

use anyhow::{bail, Context, Result};
use dialoguer::{Input, Password};
use std::io::{self, IsTerminal};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use instapaper_sort::api::{ApiClient, HttpTransport};
use instapaper_sort::auth::authenticate;
use instapaper_sort::config::{Config, Login};
use instapaper_sort::credentials::CredentialStore;
use instapaper_sort::input::TerminalKeys;
use instapaper_sort::rules::RuleStore;
use instapaper_sort::ui::{spinner, FolderMenu, Sorter};
use instapaper_sort::Error;

fn main() -> Result<()> {
    init_logging();

    let config = Config::from_env().context("Failed to read configuration")?;
    debug!(?config, "starting");

    let store = CredentialStore::new(config.credentials_path());
    if config.reauth {
        store.clear().context("Failed to remove stored credentials")?;
    }

    let transport = HttpTransport::new()?;
    let credentials = authenticate(&transport, &config.api_base, &config.consumer, &store, || {
        prompt_login(&config)
    })
    .context("Authentication failed")?;

    let api = ApiClient::new(transport, config.api_base.as_str(), config.consumer.clone(), credentials);
    let interactive = io::stdout().is_terminal();

    let progress = interactive.then(|| spinner("Fetching folders..."));
    let folders = api.list_folders();
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }
    let folders = match folders {
        Err(Error::Auth(msg)) => bail!(
            "Stored credentials were rejected ({msg}). Rerun with INSTAPAPER_REAUTH=1 to sign in again."
        ),
        other => other.context("Failed to list folders")?,
    };
    if folders.is_empty() {
        bail!("No user-created folders. Create folders in Instapaper first.");
    }

    let mut rules = RuleStore::open(config.rules_path()).context("Failed to open rule file")?;

    // Blocks until the queue is empty or the user quits.
    let summary = Sorter::new(&api, &mut rules, FolderMenu::new(folders), TerminalKeys, io::stdout())
        .batch_size(config.batch_size)
        .with_spinners(interactive)
        .run()?;
    debug!(?summary, "finished");
    Ok(())
}

/// Login for the one-time token exchange: environment first, then an
/// interactive prompt when attached to a terminal.
fn prompt_login(config: &Config) -> instapaper_sort::Result<Login> {
    if let Some(login) = config.login() {
        return Ok(login);
    }
    if !io::stdin().is_terminal() {
        return Err(Error::MissingEnv(if config.username.is_none() {
            "INSTAPAPER_USERNAME"
        } else {
            "INSTAPAPER_PASSWORD"
        }));
    }

    println!("No stored credentials; signing in once to obtain a token.");
    let username = match &config.username {
        Some(username) => username.clone(),
        None => Input::<String>::new()
            .with_prompt("Instapaper email")
            .interact_text()?,
    };
    // `Password` hides input in the terminal.
    let password = match &config.password {
        Some(password) => password.clone(),
        None => Password::new()
            .with_prompt("Password")
            .allow_empty_password(true)
            .interact()?,
    };
    Ok(Login { username, password })
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
