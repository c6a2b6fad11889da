// Error types shared by the whole crate.

use std::io;
use std::path::PathBuf;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while talking to the service or touching
/// the local state files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The service rejected our credentials. Never retried.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The service kept throttling us until the retry budget ran out.
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded {
        /// Number of requests issued before giving up.
        attempts: u32,
    },

    /// Transport failure (DNS, TLS, connection reset, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with an error that retrying will not fix.
    #[error("API error (HTTP {status}, code {code:?}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Instapaper error code, when the body carried one.
        code: Option<u32>,
        /// Message from the service, or the raw body.
        message: String,
    },

    /// The rule file exists but cannot be parsed.
    #[error("rule file {} is corrupt: {reason}", path.display())]
    CorruptRuleFile {
        /// Location of the file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The credential file exists but cannot be parsed.
    #[error("credential file {} is corrupt: {reason}", path.display())]
    CorruptCredentialFile {
        /// Location of the file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A rule pattern that can never match a hostname.
    #[error("invalid rule pattern: {0:?}")]
    InvalidRule(String),

    /// A required environment variable is unset or empty.
    #[error("missing environment variable: {0}")]
    MissingEnv(&'static str),

    /// A configuration value could not be interpreted.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Fatal errors end the run; everything else aborts only the current
    /// operation.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Creates an API error from a status and body text.
    #[must_use]
    pub fn api(status: u16, code: Option<u32>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code,
            message: message.into(),
        }
    }
}
