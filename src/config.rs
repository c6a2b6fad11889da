// Configuration module: everything the tool needs to know comes from the
// environment. The lookup is injectable so tests do not have to mutate the
// real process environment.

use crate::error::{Error, Result};
use std::fmt;
use std::path::PathBuf;

/// Default Instapaper API base URL.
pub const DEFAULT_API_BASE: &str = "https://www.instapaper.com/api/1";

/// Default number of unread bookmarks requested per page.
pub const DEFAULT_BATCH_SIZE: u32 = 25;

/// Largest page the service will return.
pub const MAX_BATCH_SIZE: u32 = 500;

const CONFIG_DIR_NAME: &str = "instapaper-cli";

/// Application consumer pair issued by Instapaper.
#[derive(Clone)]
pub struct Consumer {
    pub key: String,
    pub secret: String,
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Username/password pair used once for the xAuth exchange.
#[derive(Clone)]
pub struct Login {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Runtime configuration.
#[derive(Clone)]
pub struct Config {
    pub consumer: Consumer,
    pub username: Option<String>,
    pub password: Option<String>,
    pub config_dir: PathBuf,
    pub api_base: String,
    pub batch_size: u32,
    pub reauth: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("consumer", &self.consumer)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("config_dir", &self.config_dir)
            .field("api_base", &self.api_base)
            .field("batch_size", &self.batch_size)
            .field("reauth", &self.reauth)
            .finish()
    }
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String> {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or(Error::MissingEnv(name))
        };

        let consumer = Consumer {
            key: required("INSTAPAPER_CONSUMER_KEY")?,
            secret: required("INSTAPAPER_CONSUMER_SECRET")?,
        };

        let config_dir = match lookup("INSTAPAPER_CONFIG_DIR").filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => default_config_dir(),
        };

        let api_base = lookup("INSTAPAPER_API_BASE")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.into())
            .trim_end_matches('/')
            .to_string();

        let batch_size = match lookup("INSTAPAPER_BATCH_SIZE").filter(|v| !v.is_empty()) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| {
                    Error::InvalidConfig(format!("INSTAPAPER_BATCH_SIZE is not a number: {raw}"))
                })?
                .clamp(1, MAX_BATCH_SIZE),
            None => DEFAULT_BATCH_SIZE,
        };

        let reauth = lookup("INSTAPAPER_REAUTH")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Config {
            consumer,
            username: lookup("INSTAPAPER_USERNAME").filter(|v| !v.is_empty()),
            // An empty password is legitimate for Instapaper accounts.
            password: lookup("INSTAPAPER_PASSWORD"),
            config_dir,
            api_base,
            batch_size,
            reauth,
        })
    }

    /// Login taken from the environment, if both halves are present.
    pub fn login(&self) -> Option<Login> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Login {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.config_dir.join("credentials.json")
    }

    pub fn rules_path(&self) -> PathBuf {
        self.config_dir.join("rules.json")
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const CONSUMER: [(&str, &str); 2] = [
        ("INSTAPAPER_CONSUMER_KEY", "ck"),
        ("INSTAPAPER_CONSUMER_SECRET", "cs"),
    ];

    #[test]
    fn consumer_pair_is_required() {
        let err = Config::from_lookup(lookup_from(&[("INSTAPAPER_CONSUMER_KEY", "ck")]))
            .unwrap_err();
        assert!(matches!(err, Error::MissingEnv("INSTAPAPER_CONSUMER_SECRET")));

        let err = Config::from_lookup(lookup_from(&[
            ("INSTAPAPER_CONSUMER_KEY", ""),
            ("INSTAPAPER_CONSUMER_SECRET", "cs"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::MissingEnv("INSTAPAPER_CONSUMER_KEY")));
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup_from(&CONSUMER)).unwrap();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert!(!config.reauth);
        assert!(config.login().is_none());
        assert!(config.rules_path().ends_with("instapaper-cli/rules.json"));
    }

    #[test]
    fn overrides_are_read() {
        let mut pairs = CONSUMER.to_vec();
        pairs.extend([
            ("INSTAPAPER_CONFIG_DIR", "/tmp/ip"),
            ("INSTAPAPER_API_BASE", "http://localhost:9000/api/1/"),
            ("INSTAPAPER_BATCH_SIZE", "9000"),
            ("INSTAPAPER_REAUTH", "true"),
            ("INSTAPAPER_USERNAME", "me@example.com"),
            ("INSTAPAPER_PASSWORD", ""),
        ]);
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.credentials_path(), PathBuf::from("/tmp/ip/credentials.json"));
        assert_eq!(config.api_base, "http://localhost:9000/api/1");
        assert_eq!(config.batch_size, MAX_BATCH_SIZE);
        assert!(config.reauth);
        let login = config.login().unwrap();
        assert_eq!(login.username, "me@example.com");
        assert_eq!(login.password, "");
    }

    #[test]
    fn bad_batch_size_is_rejected() {
        let mut pairs = CONSUMER.to_vec();
        pairs.push(("INSTAPAPER_BATCH_SIZE", "lots"));
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn debug_hides_secrets() {
        let mut pairs = CONSUMER.to_vec();
        pairs[1] = ("INSTAPAPER_CONSUMER_SECRET", "s3cr3t-consumer");
        pairs.extend([("INSTAPAPER_USERNAME", "me"), ("INSTAPAPER_PASSWORD", "hunter2")]);
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        let login = config.login().unwrap();
        let rendered = format!("{config:?} {login:?}");
        assert!(!rendered.contains("s3cr3t-consumer"));
        assert!(!rendered.contains("hunter2"));
    }
}
