//! HTTP fetch layer shared by every source.
//!
//! One `HttpFetcher` is built per run and handed to all parsers. It keeps two
//! pooled clients (TLS verified / not verified), caps in-flight requests per
//! upstream host and retries transient failures with exponential backoff.
//! No cookie store is enabled, so per-source headers never leak between sources.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use encoding_rs::Encoding;
use log::{debug, warn};
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::config::FetchSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub json_body: Option<Value>,
    pub verify_tls: bool,
    pub retries: Option<u32>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            query: Vec::new(),
            headers: Vec::new(),
            json_body: None,
            verify_tls: true,
            retries: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self { method: Method::Post, json_body: Some(body), ..Self::get(url) }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Headers most HTML sites expect from a desktop browser.
    pub fn browser_headers(self) -> Self {
        self.header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "az,en-US;q=0.9,en;q=0.8,ru;q=0.7")
    }

    /// Disable certificate verification for a source with a broken TLS setup.
    pub fn insecure(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
}

impl Body {
    /// Some APIs answer with a JSON payload under a text content type.
    pub fn into_json(self) -> Option<Value> {
        match self {
            Body::Json(value) => Some(value),
            Body::Text(text) => serde_json::from_str(&text).ok(),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Body::Json(value) => value.to_string(),
            Body::Text(text) => text,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("giving up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Connection problems, timeouts and server-side errors are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { source, .. } => !source.is_builder() && !source.is_redirect(),
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::Decode { .. } | FetchError::Exhausted { .. } => false,
        }
    }
}

#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<Body, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
    settings: FetchSettings,
    host_limits: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HttpFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self> {
        let build = |verify_tls: bool| {
            reqwest::Client::builder()
                .user_agent(settings.user_agent.as_str())
                .timeout(settings.request_timeout)
                .connect_timeout(Duration::from_secs(10))
                .redirect(reqwest::redirect::Policy::limited(5))
                .danger_accept_invalid_certs(!verify_tls)
                .build()
        };

        Ok(Self {
            client: build(true).context("Failed to create HTTP client")?,
            insecure_client: build(false).context("Failed to create HTTP client without TLS verification")?,
            settings,
            host_limits: Mutex::new(HashMap::new()),
        })
    }

    fn host_limit(&self, url: &str) -> Arc<Semaphore> {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        let mut limits = match self.host_limits.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        limits
            .entry(host)
            .or_insert_with(|| Arc::new(Semaphore::new(self.settings.per_host_concurrency)))
            .clone()
    }

    async fn send_once(&self, request: &FetchRequest) -> Result<Body, FetchError> {
        let client = if request.verify_tls { &self.client } else { &self.insecure_client };
        let transport = |source| FetchError::Transport { url: request.url.clone(), source };

        let mut builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: request.url.clone(), status: status.as_u16() });
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase());
        let bytes = resp.bytes().await.map_err(transport)?;
        decode_body(&request.url, content_type.as_deref(), &bytes)
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<Body, FetchError> {
        let limit = self.host_limit(&request.url);
        let retries = request.retries.unwrap_or(self.settings.retries);
        let (limit, request) = (&limit, &request);

        retry_with_backoff(&request.url, retries, self.settings.retry_base_delay, move |_| async move {
            // A closed semaphore only means no cap.
            let _permit = limit.acquire().await.ok();
            self.send_once(request).await
        })
        .await
    }
}

/// Runs `op` until it succeeds, fails permanently, or `retries` extra attempts are spent.
pub async fn retry_with_backoff<T, F, Fut>(url: &str, retries: u32, base_delay: Duration, mut op: F) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < retries => {
                let delay = backoff_delay(base_delay, attempt);
                warn!("{} (attempt {}/{}), retrying in {:?}", err, attempt + 1, retries + 1, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) if attempt > 0 => {
                return Err(FetchError::Exhausted { url: url.to_string(), attempts: attempt + 1, last: Box::new(err) });
            }
            Err(err) => return Err(err),
        }
    }
}

pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(16))
}

pub fn decode_body(url: &str, content_type: Option<&str>, bytes: &[u8]) -> Result<Body, FetchError> {
    if content_type.is_some_and(|ct| ct.contains("json")) {
        return serde_json::from_slice(bytes)
            .map(Body::Json)
            .map_err(|source| FetchError::Decode { url: url.to_string(), source });
    }
    let text = match content_type.and_then(declared_encoding) {
        Some(encoding) => encoding.decode(bytes).0.into_owned(),
        None => decode_text(bytes),
    };
    Ok(Body::Text(text))
}

/// The encoding named by a `charset=` parameter, if it is one we know.
fn declared_encoding(content_type: &str) -> Option<&'static Encoding> {
    let label = content_type
        .split(';')
        .find_map(|param| param.trim().strip_prefix("charset="))?
        .trim_matches(|c| c == '"' || c == '\'');
    let encoding = Encoding::for_label(label.as_bytes());
    if encoding.is_none() {
        debug!("Unknown charset {:?}, guessing", label);
    }
    encoding
}

/// UTF-8 first, then ISO-8859-1 for legacy pages that are not valid UTF-8.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            debug!("Body is not valid UTF-8, decoding as ISO-8859-1");
            bytes.iter().map(|&b| char::from(b)).collect()
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    type Responder = Box<dyn Fn(&FetchRequest) -> Option<Result<Body, FetchError>> + Send + Sync>;

    /// Serves canned bodies keyed by URL (query string included) and records every request.
    #[derive(Default)]
    pub struct StubFetcher {
        routes: HashMap<String, Result<Body, u16>>,
        responder: Option<Responder>,
        pub requests: Mutex<Vec<FetchRequest>>,
    }

    impl StubFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_text(mut self, url: &str, body: &str) -> Self {
            self.routes.insert(url.to_string(), Ok(Body::Text(body.to_string())));
            self
        }

        pub fn with_json(mut self, url: &str, body: Value) -> Self {
            self.routes.insert(url.to_string(), Ok(Body::Json(body)));
            self
        }

        pub fn with_status(mut self, url: &str, status: u16) -> Self {
            self.routes.insert(url.to_string(), Err(status));
            self
        }

        pub fn with_responder<F>(mut self, responder: F) -> Self
        where
            F: Fn(&FetchRequest) -> Option<Result<Body, FetchError>> + Send + Sync + 'static,
        {
            self.responder = Some(Box::new(responder));
            self
        }

        pub fn key(request: &FetchRequest) -> String {
            if request.query.is_empty() {
                return request.url.clone();
            }
            let query: Vec<String> = request.query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            format!("{}?{}", request.url, query.join("&"))
        }

        pub fn recorded(&self) -> Vec<FetchRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetch for StubFetcher {
        async fn fetch(&self, request: FetchRequest) -> Result<Body, FetchError> {
            self.requests.lock().unwrap().push(request.clone());
            let key = Self::key(&request);
            match self.routes.get(&key) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(status)) => Err(FetchError::Status { url: key, status: *status }),
                None => match self.responder.as_ref().and_then(|r| r(&request)) {
                    Some(result) => result,
                    None => Err(FetchError::Status { url: key, status: 404 }),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn status(code: u16) -> FetchError {
        FetchError::Status { url: "https://x.az".to_string(), status: code }
    }

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(800));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!status(403).is_retryable());
    }

    #[test]
    fn test_decode_json_body() {
        let body = decode_body("u", Some("application/json; charset=utf-8"), br#"{"a":1}"#).unwrap();
        assert_eq!(body, Body::Json(serde_json::json!({"a": 1})));

        let err = decode_body("u", Some("application/json"), b"<html>").unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn test_decode_text_falls_back_to_latin1() {
        assert_eq!(decode_text("Bakı".as_bytes()), "Bakı");
        // 0xE9 alone is invalid UTF-8, é in ISO-8859-1
        assert_eq!(decode_text(&[b'c', b'a', b'f', 0xE9]), "café");
        let body = decode_body("u", Some("text/html"), b"<p>hi</p>").unwrap();
        assert_eq!(body, Body::Text("<p>hi</p>".to_string()));
    }

    #[test]
    fn test_decode_text_honours_declared_charset() {
        // "Привет" in windows-1251
        let cp1251 = [0xCF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2];
        let body = decode_body("u", Some("text/html; charset=windows-1251"), &cp1251).unwrap();
        assert_eq!(body, Body::Text("Привет".to_string()));

        let quoted = decode_body("u", Some("text/html; charset=\"utf-8\""), "Bakı".as_bytes()).unwrap();
        assert_eq!(quoted, Body::Text("Bakı".to_string()));

        // unknown label falls back to the UTF-8 / Latin-1 guess
        let unknown = decode_body("u", Some("text/html; charset=x-made-up"), &[b'c', b'a', b'f', 0xE9]).unwrap();
        assert_eq!(unknown, Body::Text("café".to_string()));
    }

    #[test]
    fn test_body_into_json_from_text() {
        assert_eq!(Body::Text("[1,2]".to_string()).into_json(), Some(serde_json::json!([1, 2])));
        assert_eq!(Body::Text("nope".to_string()).into_json(), None);
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff("u", 3, Duration::from_millis(1), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err(status(502)) } else { Ok("ok") } }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_bound() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff("u", 2, Duration::from_millis(1), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(status(500)) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result.unwrap_err() {
            FetchError::Exhausted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, FetchError::Status { status: 500, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_no_retry_on_client_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff("u", 5, Duration::from_millis(1), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(status(404)) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result.unwrap_err(), FetchError::Status { status: 404, .. }));
    }

    #[test]
    fn test_request_builder() {
        let req = FetchRequest::get("https://x.az/api").query("page", "2").header("X-Requested-With", "XMLHttpRequest").insecure();
        assert_eq!(req.method, Method::Get);
        assert!(!req.verify_tls);
        assert_eq!(req.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(testing::StubFetcher::key(&req), "https://x.az/api?page=2");
    }
}
