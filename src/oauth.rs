// OAuth 1.0a request signing (RFC 5849, HMAC-SHA1).
//
// Instapaper signs every call, including the xAuth token exchange, which
// is signed with the consumer pair alone.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Consumer;
use crate::credentials::Credentials;
use crate::error::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const VERSION: &str = "1.0";

/// Produces `Authorization` header values for signed requests.
#[derive(Debug, Clone)]
pub struct Signer {
    consumer: Consumer,
    token: Option<Credentials>,
}

impl Signer {
    /// Signer for requests made before a token exists.
    pub fn new(consumer: Consumer) -> Self {
        Self {
            consumer,
            token: None,
        }
    }

    /// Signer for requests made on behalf of a user.
    pub fn with_token(mut self, token: Credentials) -> Self {
        self.token = Some(token);
        self
    }

    /// Header value for a request, with a fresh nonce and timestamp.
    pub fn authorization(&self, method: &str, url: &str, form: &[(String, String)]) -> Result<String> {
        self.authorization_with(method, url, form, &nonce(), timestamp())
    }

    pub(crate) fn authorization_with(
        &self,
        method: &str,
        url: &str,
        form: &[(String, String)],
        nonce: &str,
        timestamp: u64,
    ) -> Result<String> {
        let mut protocol: Vec<(String, String)> = vec![
            ("oauth_consumer_key".into(), self.consumer.key.clone()),
            ("oauth_nonce".into(), nonce.to_string()),
            ("oauth_signature_method".into(), SIGNATURE_METHOD.into()),
            ("oauth_timestamp".into(), timestamp.to_string()),
            ("oauth_version".into(), VERSION.into()),
        ];
        if let Some(token) = &self.token {
            protocol.push(("oauth_token".into(), token.oauth_token.clone()));
        }

        let mut all = protocol.clone();
        all.extend(form.iter().cloned());
        let base = base_string(method, url, &all);
        let signature = self.sign(&base)?;
        protocol.push(("oauth_signature".into(), signature));

        let fields: Vec<String> = protocol
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect();
        Ok(format!("OAuth {}", fields.join(", ")))
    }

    fn sign(&self, base: &str) -> Result<String> {
        let token_secret = self
            .token
            .as_ref()
            .map(|t| t.oauth_token_secret.as_str())
            .unwrap_or("");
        let key = format!(
            "{}&{}",
            percent_encode(&self.consumer.secret),
            percent_encode(token_secret)
        );
        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| Error::Auth(format!("cannot build signing key: {e}")))?;
        mac.update(base.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// Signature base string: method, url and the sorted, encoded parameters.
pub(crate) fn base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    let normalized: Vec<String> = encoded.into_iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(url),
        percent_encode(&normalized.join("&"))
    )
}

/// RFC 3986 percent-encoding: only unreserved characters pass through.
pub fn percent_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}

fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
