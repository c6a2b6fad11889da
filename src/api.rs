// API client module: a small blocking client for the three Instapaper calls
// this tool needs (list folders, list unread bookmarks, move a bookmark).
// Every request is OAuth-signed and retried with exponential backoff while
// the service is throttling us.

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Consumer;
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::model::{Bookmark, BookmarkId, Folder, FolderId};
use crate::oauth::Signer;

/// Instapaper's error code for throttled requests.
const RATE_LIMIT_CODE: u32 = 1040;

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a signed, form-encoded POST. Implementations report transport
/// failures as `Error::Network` and leave status handling to the caller.
pub trait Transport {
    fn post_form(&self, url: &str, authorization: &str, form: &[(String, String)]) -> Result<HttpResponse>;
}

/// `reqwest` blocking transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_form(&self, url: &str, authorization: &str, form: &[(String, String)]) -> Result<HttpResponse> {
        let res = self
            .client
            .post(url)
            .header(AUTHORIZATION, authorization)
            .header(USER_AGENT, concat!("instapaper-sort/", env!("CARGO_PKG_VERSION")))
            .form(form)
            .send()
            .map_err(|e| Error::Network(e.to_string()))?;
        let status = res.status().as_u16();
        let body = res.text().map_err(|e| Error::Network(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

/// How hard to push against rate limiting.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_millis(600),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given (zero-based) attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Error entry in an Instapaper error response.
#[derive(Debug, Deserialize)]
struct ErrorItem {
    #[serde(rename = "type")]
    kind: String,
    error_code: Option<u32>,
    message: Option<String>,
}

/// Item of a listing response. Listings mix bookmarks with `user` and
/// `meta` entries; only the fields this tool reads are declared.
#[derive(Debug, Deserialize)]
struct ListItem {
    #[serde(rename = "type")]
    kind: String,
    bookmark_id: Option<u64>,
    folder_id: Option<u64>,
    title: Option<String>,
    url: Option<String>,
}

/// `bookmarks/list` answers either with a bare array or with an object
/// carrying a `bookmarks` array, depending on API revision.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BookmarkListing {
    Envelope { bookmarks: Vec<ListItem> },
    Items(Vec<ListItem>),
}

/// Outcome of a single attempt.
enum Attempt {
    Done(String),
    Throttled,
}

/// Signed client for the Instapaper Full API.
pub struct ApiClient<T = HttpTransport> {
    transport: T,
    base_url: String,
    signer: Signer,
    retry: RetryPolicy,
}

impl<T: Transport> ApiClient<T> {
    /// Client acting on behalf of the user identified by `credentials`.
    pub fn new(transport: T, base_url: impl Into<String>, consumer: Consumer, credentials: Credentials) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            signer: Signer::new(consumer).with_token(credentials),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// User-created folders, in the order the service returns them.
    pub fn list_folders(&self) -> Result<Vec<Folder>> {
        let body = self.post("/folders/list", Vec::new())?;
        let items: Vec<ListItem> = serde_json::from_str(&body)?;
        Ok(items
            .into_iter()
            .filter(|item| item.kind == "folder")
            .filter_map(|item| {
                Some(Folder {
                    id: FolderId(item.folder_id?),
                    title: item.title.unwrap_or_default(),
                })
            })
            .collect())
    }

    /// Up to `limit` unread bookmarks, excluding the ids in `have`.
    pub fn list_unread_bookmarks(&self, limit: u32, have: &[BookmarkId]) -> Result<Vec<Bookmark>> {
        let mut form = vec![
            ("folder_id".to_string(), "unread".to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        if !have.is_empty() {
            let ids: Vec<String> = have.iter().map(ToString::to_string).collect();
            form.push(("have".to_string(), ids.join(",")));
        }

        let body = self.post("/bookmarks/list", form)?;
        let listing: BookmarkListing = serde_json::from_str(&body)?;
        let items = match listing {
            BookmarkListing::Envelope { bookmarks } => bookmarks,
            BookmarkListing::Items(items) => items,
        };
        Ok(items
            .into_iter()
            .filter(|item| item.kind == "bookmark")
            .filter_map(|item| {
                Some(Bookmark {
                    id: BookmarkId(item.bookmark_id?),
                    url: item.url.unwrap_or_default().trim().to_string(),
                    title: item.title.unwrap_or_default(),
                })
            })
            .collect())
    }

    pub fn move_bookmark(&self, bookmark: BookmarkId, folder: FolderId) -> Result<()> {
        self.post(
            "/bookmarks/move",
            vec![
                ("bookmark_id".to_string(), bookmark.to_string()),
                ("folder_id".to_string(), folder.to_string()),
            ],
        )?;
        Ok(())
    }

    /// Issues a signed POST, retrying while throttled.
    fn post(&self, path: &str, form: Vec<(String, String)>) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let attempts = self.retry.max_attempts.max(1);
        for attempt in 0..attempts {
            // Re-sign every attempt: nonces may not be reused.
            let authorization = self.signer.authorization("POST", &url, &form)?;
            debug!("POST {path} (attempt {})", attempt + 1);
            let res = self.transport.post_form(&url, &authorization, &form)?;
            match classify(res)? {
                Attempt::Done(body) => return Ok(body),
                Attempt::Throttled if attempt + 1 < attempts => {
                    let delay = self.retry.delay(attempt);
                    warn!("{path} throttled, retrying in {delay:?}");
                    thread::sleep(delay);
                }
                Attempt::Throttled => {}
            }
        }
        Err(Error::RateLimitExceeded { attempts })
    }
}

/// Sorts a response into success, throttling, or a hard error.
fn classify(res: HttpResponse) -> Result<Attempt> {
    if res.is_success() {
        return Ok(Attempt::Done(res.body));
    }

    let (code, message) = parse_error_body(&res.body);
    match res.status {
        429 | 502 | 503 | 504 => Ok(Attempt::Throttled),
        _ if code == Some(RATE_LIMIT_CODE) => Ok(Attempt::Throttled),
        401 | 403 => Err(Error::Auth(message)),
        status => Err(Error::api(status, code, message)),
    }
}

fn parse_error_body(body: &str) -> (Option<u32>, String) {
    let items: Vec<ErrorItem> = serde_json::from_str(body).unwrap_or_default();
    match items.into_iter().find(|item| item.kind == "error") {
        Some(item) => (
            item.error_code,
            item.message.unwrap_or_else(|| "unknown error".into()),
        ),
        None => (None, body.trim().to_string()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for exercising the client without a network.

    use super::*;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    /// A request as the transport saw it.
    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub url: String,
        pub authorization: String,
        pub form: Vec<(String, String)>,
    }

    impl Recorded {
        pub fn param(&self, name: &str) -> Option<&str> {
            self.form
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        }
    }

    /// Answers each path from its own queue of canned results.
    #[derive(Default)]
    pub struct ScriptedTransport {
        replies: RefCell<HashMap<String, VecDeque<Result<HttpResponse>>>>,
        requests: RefCell<Vec<Recorded>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, path: &str, status: u16, body: &str) -> Self {
            self.push(path, Ok(HttpResponse::new(status, body)));
            self
        }

        pub fn fail(self, path: &str, err: Error) -> Self {
            self.push(path, Err(err));
            self
        }

        fn push(&self, path: &str, reply: Result<HttpResponse>) {
            self.replies
                .borrow_mut()
                .entry(path.to_string())
                .or_default()
                .push_back(reply);
        }

        pub fn requests(&self) -> Vec<Recorded> {
            self.requests.borrow().clone()
        }

        pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
            self.requests()
                .into_iter()
                .filter(|r| r.url.ends_with(path))
                .collect()
        }
    }

    impl Transport for ScriptedTransport {
        fn post_form(&self, url: &str, authorization: &str, form: &[(String, String)]) -> Result<HttpResponse> {
            self.requests.borrow_mut().push(Recorded {
                url: url.to_string(),
                authorization: authorization.to_string(),
                form: form.to_vec(),
            });
            let mut replies = self.replies.borrow_mut();
            let reply = replies
                .iter_mut()
                .find(|(path, _)| url.ends_with(path.as_str()))
                .and_then(|(_, queue)| queue.pop_front());
            reply.unwrap_or_else(|| Err(Error::Network(format!("no scripted reply for {url}"))))
        }
    }

    pub fn consumer() -> Consumer {
        Consumer {
            key: "ck".into(),
            secret: "cs".into(),
        }
    }

    pub fn credentials() -> Credentials {
        Credentials {
            oauth_token: "tok".into(),
            oauth_token_secret: "ts".into(),
        }
    }

    pub fn no_wait() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn client(transport: ScriptedTransport) -> ApiClient<ScriptedTransport> {
        ApiClient::new(transport, "https://api.test/api/1", consumer(), credentials()).with_retry(no_wait())
    }
}
