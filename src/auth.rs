// Authentication: reuse the stored token pair when there is one, otherwise
// trade a username/password for a token pair once (xAuth) and remember it.

use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::api::{HttpResponse, Transport};
use crate::config::{Consumer, Login};
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{Error, Result};
use crate::oauth::Signer;

/// Returns credentials for the account, performing the xAuth exchange only
/// when nothing usable is stored.
///
/// `login` is only called when an exchange is actually needed, so callers
/// can prompt for a password lazily.
pub fn authenticate<T, F>(
    transport: &T,
    base_url: &str,
    consumer: &Consumer,
    store: &CredentialStore,
    login: F,
) -> Result<Credentials>
where
    T: Transport,
    F: FnOnce() -> Result<Login>,
{
    match store.load() {
        Ok(Some(creds)) => {
            debug!("using stored credentials from {}", store.path().display());
            return Ok(creds);
        }
        Ok(None) => {}
        Err(err @ Error::CorruptCredentialFile { .. }) => {
            warn!("{err}; authenticating again");
        }
        Err(err) => return Err(err),
    }

    let login = login()?;
    let creds = exchange_xauth(transport, base_url, consumer, &login)?;
    store.save(&creds)?;
    info!("stored new credentials at {}", store.path().display());
    Ok(creds)
}

/// `POST /oauth/access_token` with xAuth client_auth parameters.
pub fn exchange_xauth<T: Transport>(
    transport: &T,
    base_url: &str,
    consumer: &Consumer,
    login: &Login,
) -> Result<Credentials> {
    let url = format!("{}/oauth/access_token", base_url.trim_end_matches('/'));
    let form = vec![
        ("x_auth_username".to_string(), login.username.clone()),
        ("x_auth_password".to_string(), login.password.clone()),
        ("x_auth_mode".to_string(), "client_auth".to_string()),
    ];
    let authorization = Signer::new(consumer.clone()).authorization("POST", &url, &form)?;

    let res = transport.post_form(&url, &authorization, &form)?;
    match res.status {
        401 | 403 => Err(Error::Auth(rejection_message(&res))),
        _ if !res.is_success() => Err(Error::Auth(format!(
            "token exchange failed (HTTP {}): {}",
            res.status,
            rejection_message(&res)
        ))),
        _ => parse_token_pair(&res.body),
    }
}

fn parse_token_pair(body: &str) -> Result<Credentials> {
    let mut token = None;
    let mut secret = None;
    for (key, value) in form_urlencoded::parse(body.trim().as_bytes()) {
        match key.as_ref() {
            "oauth_token" => token = Some(value.into_owned()),
            "oauth_token_secret" => secret = Some(value.into_owned()),
            _ => {}
        }
    }
    match (token, secret) {
        (Some(oauth_token), Some(oauth_token_secret))
            if !oauth_token.is_empty() && !oauth_token_secret.is_empty() =>
        {
            Ok(Credentials {
                oauth_token,
                oauth_token_secret,
            })
        }
        _ => Err(Error::Auth("token exchange returned no token pair".into())),
    }
}

fn rejection_message(res: &HttpResponse) -> String {
    let body = res.body.trim();
    if body.is_empty() {
        "invalid username or password".into()
    } else {
        body.to_string()
    }
}
