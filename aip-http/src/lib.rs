//! JSON HTTP client for talking to inference providers.
//!
//! - Per-request options: headers, [`Auth`], query params, timeout, [`RetryPolicy`]
//! - Retry policies: exponential backoff on 429/5xx (honouring `Retry-After`), or a
//!   fixed delay on a chosen set of statuses, e.g. 503 while a hosted model loads
//! - Never logs secret values; raw body logging via `AIP_HTTP_RAW=1`
//!
//! ```no_run
//! # async fn demo() -> Result<(), aip_http::HttpError> {
//! use aip_http::{HttpClient, RequestOpts, RetryPolicy};
//! use std::time::Duration;
//!
//! let client = HttpClient::new("https://api.example.com")?
//!     .with_retry_policy(RetryPolicy::fixed_on_503(3, Duration::from_secs(5)));
//! let got: serde_json::Value = client.get_json("v1/items", RequestOpts::default()).await?;
//! # Ok(()) }
//! ```

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

const RAW_ENV: &str = "AIP_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const ERROR_BODY_MAX: usize = 2000;
const LOG_SNIPPET_MAX: usize = 500;

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    /// Non-success status after the retry budget was spent. `body` is the
    /// response text (truncated), `message` the best-effort extracted error.
    #[error("server returned error {status}: {message}")]
    Api {
        status: StatusCode,
        message: String,
        body: String,
    },
}

impl HttpError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// How long to wait between attempts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Backoff {
    /// `base * 2^(attempt-1)`; a numeric `Retry-After` header takes precedence.
    Exponential { base: Duration },
    /// The same delay before every retry.
    Fixed(Duration),
}

/// Which response statuses are worth another attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryOn {
    RateLimitAndServerErrors,
    Statuses(Vec<StatusCode>),
}

/// Retry budget and schedule for one request.
///
/// ```
/// use aip_http::{RetryPolicy, Backoff};
/// use reqwest::StatusCode;
/// use std::time::Duration;
///
/// let hf = RetryPolicy::fixed_on_503(3, Duration::from_secs(5));
/// assert!(hf.should_retry(StatusCode::SERVICE_UNAVAILABLE));
/// assert!(!hf.should_retry(StatusCode::BAD_GATEWAY));
/// assert_eq!(hf.delay_for(1, None, None), Duration::from_secs(5));
/// assert_eq!(hf.delay_for(3, None, None), Duration::from_secs(5));
/// assert_eq!(hf.backoff, Backoff::Fixed(Duration::from_secs(5)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub backoff: Backoff,
    pub retry_on: RetryOn,
}

impl RetryPolicy {
    pub fn exponential(max_retries: usize) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(200),
            },
            retry_on: RetryOn::RateLimitAndServerErrors,
        }
    }

    /// Fixed delay, retrying only `503 Service Unavailable`.
    pub fn fixed_on_503(max_retries: usize, delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed(delay),
            retry_on: RetryOn::Statuses(vec![StatusCode::SERVICE_UNAVAILABLE]),
        }
    }

    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Backoff::Fixed(Duration::ZERO),
            retry_on: RetryOn::Statuses(Vec::new()),
        }
    }

    pub fn should_retry(&self, status: StatusCode) -> bool {
        match &self.retry_on {
            RetryOn::RateLimitAndServerErrors => {
                status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            RetryOn::Statuses(list) => list.contains(&status),
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(
        &self,
        attempt: usize,
        status: Option<StatusCode>,
        headers: Option<&HeaderMap>,
    ) -> Duration {
        match &self.backoff {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential { base } => {
                if let Some(secs) = headers.and_then(retry_after_secs) {
                    return Duration::from_secs(secs);
                }
                let shift = attempt.saturating_sub(1).min(16) as u32;
                let exp = base.saturating_mul(1u32 << shift);
                if status == Some(StatusCode::TOO_MANY_REQUESTS) {
                    exp.max(Duration::from_millis(1100))
                } else {
                    exp
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(2)
    }
}

/// Authentication strategies supported by the client.
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Authorization: Bearer <token>
    Bearer(&'a str),
    Header {
        name: HeaderName,
        value: HeaderValue,
    },
    None,
}

/// Per-request tuning knobs.
///
/// ```
/// use aip_http::{Auth, RequestOpts, RetryPolicy};
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retry: Some(RetryPolicy::none()),
///     auth: Some(Auth::Bearer("token")),
///     ..Default::default()
/// };
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(!opts.allow_absolute);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retry: Option<RetryPolicy>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
    /// If true and `path` is an absolute URL, use it as-is.
    pub allow_absolute: bool,
}

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub retry: RetryPolicy,
}

impl HttpClient {
    /// Construct a client anchored to a base URL. A trailing `/` is added so
    /// relative paths extend the base instead of replacing its last segment.
    ///
    /// ```
    /// use aip_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.groq.com/openai/v1")?;
    /// assert_eq!(client.base_url().as_str(), "https://api.groq.com/openai/v1/");
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.retry.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let normalized = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        let base = Url::parse(&normalized).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// POST JSON with optional Bearer auth.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let opts = RequestOpts {
            auth: bearer.map(Auth::Bearer),
            ..Default::default()
        };
        self.request_json(Method::POST, path, Some(body), opts).await
    }

    pub async fn post_json_opts<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_json(Method::POST, path, Some(body), opts)
            .await
    }

    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.request_json::<(), T>(Method::GET, path, None, opts)
            .await
    }

    fn resolve(&self, path: &str, allow_absolute: bool) -> Result<Url, HttpError> {
        if allow_absolute {
            if let Ok(abs) = Url::parse(path) {
                return Ok(abs);
            }
        }
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| HttpError::Url(e.to_string()))
    }

    async fn request_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.resolve(path, opts.allow_absolute)?;
        let policy = opts.retry.clone().unwrap_or_else(|| self.retry.clone());
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let body_bytes = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| HttpError::Build(format!("body serialization failed: {e}")))?;
        let bearer = match &opts.auth {
            Some(Auth::Bearer(tok)) => Some(sanitize_api_key(tok)?),
            _ => None,
        };
        let auth_kind = match &opts.auth {
            Some(Auth::Bearer(_)) => "bearer",
            Some(Auth::Header { .. }) => "header",
            Some(Auth::None) | None => "none",
        };
        let req_id = format!("r{}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed));

        let mut attempt = 0usize;
        loop {
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout);
            if let Some(q) = &opts.query {
                let pairs: Vec<(&str, &str)> = q.iter().map(|(k, v)| (*k, v.as_ref())).collect();
                rb = rb.query(&pairs);
            }
            if let Some(bytes) = &body_bytes {
                rb = rb
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(bytes.clone());
            }
            if let Some(hdrs) = &opts.headers {
                rb = rb.headers(hdrs.clone());
            }
            match (&opts.auth, &bearer) {
                (Some(Auth::Header { name, value }), _) => rb = rb.header(name, value),
                (_, Some(tok)) => rb = rb.bearer_auth(tok),
                _ => {}
            }

            tracing::debug!(
                req_id = %req_id,
                attempt = attempt + 1,
                max_retries = policy.max_retries,
                method = %method,
                host_path = %format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
                timeout_ms = timeout.as_millis() as u64,
                auth_kind,
                has_body = body_bytes.is_some(),
                "http.request.start"
            );
            if raw_enabled() {
                if let Some(bytes) = &body_bytes {
                    tracing::debug!(
                        target: "http.raw",
                        %req_id,
                        body = %truncate_chars(&String::from_utf8_lossy(bytes), RAW_MAX_BODY),
                        "request"
                    );
                }
            }

            let started = Instant::now();
            let sent = rb.send().await;
            let resp = match sent {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt < policy.max_retries {
                        attempt += 1;
                        let delay = policy.delay_for(attempt, None, None);
                        tracing::warn!(
                            req_id = %req_id,
                            attempt,
                            backoff_ms = delay.as_millis() as u64,
                            error = %err,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(req_id = %req_id, attempt, error = %err, "http.network_error");
                    return Err(HttpError::Network(err.to_string()));
                }
            };

            let status = resp.status();
            let headers = resp.headers().clone();
            let bytes = match resp.bytes().await {
                Ok(bytes) => bytes,
                Err(err) => {
                    if attempt < policy.max_retries {
                        attempt += 1;
                        let delay = policy.delay_for(attempt, None, None);
                        tracing::warn!(
                            req_id = %req_id,
                            attempt,
                            backoff_ms = delay.as_millis() as u64,
                            error = %err,
                            "http.retrying.body"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    return Err(HttpError::Network(err.to_string()));
                }
            };
            let text = String::from_utf8_lossy(&bytes);
            let snippet = truncate_chars(&text, LOG_SNIPPET_MAX);

            tracing::debug!(
                req_id = %req_id,
                %status,
                duration_ms = started.elapsed().as_millis() as u64,
                body_len = bytes.len(),
                "http.response"
            );
            if raw_enabled() {
                tracing::debug!(
                    target: "http.raw",
                    %req_id,
                    %status,
                    body = %truncate_chars(&text, RAW_MAX_BODY),
                    "response"
                );
            }

            if status.is_success() {
                return serde_json::from_slice::<T>(&bytes).map_err(|e| {
                    tracing::warn!(
                        req_id = %req_id,
                        serde_err = %e,
                        body_snippet = %snippet,
                        "http.response.decode_error"
                    );
                    HttpError::Decode(e.to_string(), snippet)
                });
            }

            let message = extract_error_message(&bytes);
            if policy.should_retry(status) && attempt < policy.max_retries {
                attempt += 1;
                let delay = policy.delay_for(attempt, Some(status), Some(&headers));
                tracing::warn!(
                    req_id = %req_id,
                    %status,
                    attempt,
                    max_retries = policy.max_retries,
                    backoff_ms = delay.as_millis() as u64,
                    message = %message,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id = %req_id,
                %status,
                message = %message,
                body_snippet = %snippet,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                body: truncate_chars(&text, ERROR_BODY_MAX),
            });
        }
    }
}

/// Pull a readable message out of the error bodies providers send:
/// `{"error":{"message":..}}` (OpenAI/Groq), `{"error":".."}` (Hugging Face,
/// Ollama), `{"message":..}` / `{"detail":..}`.
fn extract_error_message(body: &[u8]) -> String {
    if let Ok(val) = serde_json::from_slice::<serde_json::Value>(body) {
        let nested = val
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str());
        let flat = ["error", "message", "detail"]
            .iter()
            .find_map(|k| val.get(*k).and_then(|v| v.as_str()));
        if let Some(msg) = nested.or(flat).filter(|m| !m.is_empty()) {
            return msg.to_string();
        }
    }
    truncate_chars(&String::from_utf8_lossy(body), LOG_SNIPPET_MAX)
}

fn retry_after_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

fn sanitize_api_key(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if !s.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "API key contains control characters".into(),
        ));
    }
    HeaderValue::from_str(&format!("Bearer {s}"))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(s)
}
