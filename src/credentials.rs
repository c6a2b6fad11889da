// Credential store: the OAuth token pair obtained once through xAuth and
// reused for every later run. The file is owner-readable only and its
// contents are never logged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::storage;

/// Access token pair for the user's account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub oauth_token: String,
    pub oauth_token_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("oauth_token", &"<redacted>")
            .field("oauth_token_secret", &"<redacted>")
            .finish()
    }
}

/// Reads and writes `credentials.json`.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored pair, `None` when nothing has been stored yet.
    ///
    /// A file that cannot be parsed, or that holds an empty token, yields
    /// `Error::CorruptCredentialFile`.
    pub fn load(&self) -> Result<Option<Credentials>> {
        let Some(bytes) = storage::read_optional(&self.path)? else {
            debug!("no stored credentials at {}", self.path.display());
            return Ok(None);
        };

        let creds: Credentials =
            serde_json::from_slice(&bytes).map_err(|e| self.corrupt(e.to_string()))?;
        if creds.oauth_token.is_empty() || creds.oauth_token_secret.is_empty() {
            return Err(self.corrupt("empty token".into()));
        }
        Ok(Some(creds))
    }

    pub fn save(&self, creds: &Credentials) -> Result<()> {
        storage::write_json_private(&self.path, creds)?;
        debug!("stored credentials at {}", self.path.display());
        Ok(())
    }

    /// Deletes the stored pair so the next run authenticates again.
    pub fn clear(&self) -> Result<()> {
        if storage::remove_if_exists(&self.path)? {
            debug!("removed credentials at {}", self.path.display());
        }
        Ok(())
    }

    fn corrupt(&self, reason: String) -> Error {
        Error::CorruptCredentialFile {
            path: self.path.clone(),
            reason,
        }
    }
}
