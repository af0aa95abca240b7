//! Minimal HTTP client with safe logging, retries, and flexible auth.
//!
//! - Request options: headers, bearer auth, timeout, retries
//! - JSON and raw-byte request bodies, JSON and raw-byte responses
//! - Never logs secret values; only the auth kind is recorded
//! - Retries 429/5xx with exponential backoff and `Retry-After` support
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), skylift_http::HttpError> {
//! let client = skylift_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .post_json_opts(
//!         "xrpc/com.example.echo",
//!         &serde_json::json!({"ping": true}),
//!         skylift_http::RequestOpts::default(),
//!     )
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Callers that run their own rate-limit policy (the import loop does) pass
//! `retries: Some(0)` and inspect [`HttpError::is_rate_limited`] instead of
//! letting the client back off on their behalf.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

// ==============================
// Errors
// ==============================

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
    #[error("response body exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        /// Machine-readable error code when the server sent one (`{"error": "..."}`).
        code: Option<String>,
        message: String,
        request_id: String,
        retry_after_secs: Option<u64>,
    },
}

impl HttpError {
    /// True for a final HTTP 429.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, HttpError::Api { status, .. } if *status == StatusCode::TOO_MANY_REQUESTS)
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            HttpError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

// ==============================
// Auth & Request Options
// ==============================

/// Authentication strategies supported by the HTTP client helpers.
///
/// ```
/// use skylift_http::Auth;
///
/// let bearer = Auth::Bearer("token");
/// match bearer {
///     Auth::Bearer(value) => assert_eq!(value, "token"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Authorization: Bearer <token>
    Bearer(&'a str),
    None,
}

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use skylift_http::{Auth, RequestOpts};
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(0),
///     auth: Some(Auth::Bearer("jwt")),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(!opts.allow_absolute);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    /// If true and `path` is an absolute URL, use it as-is (ignore base).
    pub allow_absolute: bool,
    /// Fail with [`HttpError::TooLarge`] instead of buffering a bigger body.
    pub max_body_bytes: Option<usize>,
}

enum Body<'b> {
    Empty,
    Json(Vec<u8>),
    Raw { bytes: &'b [u8], content_type: &'b str },
}

impl Body<'_> {
    fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```no_run
    /// use skylift_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://bsky.social")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(30));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("skylift/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(30),
            max_retries: 2,
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// POST JSON with per-request options.
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
        let encoded = serde_json::to_vec(body).map_err(|e| HttpError::Build(e.to_string()))?;
        let (bytes, req_id) = self
            .send(Method::POST, path, Body::Json(encoded), opts)
            .await?;
        decode_json(&bytes, &req_id)
    }

    /// POST an opaque payload with an explicit content type, decoding a JSON reply.
    pub async fn post_bytes<T>(
        &self,
        path: &str,
        payload: &[u8],
        content_type: &str,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let body = Body::Raw {
            bytes: payload,
            content_type,
        };
        let (bytes, req_id) = self.send(Method::POST, path, body, opts).await?;
        decode_json(&bytes, &req_id)
    }

    /// GET a resource as raw bytes.
    pub async fn get_bytes(&self, path: &str, opts: RequestOpts<'_>) -> Result<Vec<u8>, HttpError> {
        let (bytes, _) = self.send(Method::GET, path, Body::Empty, opts).await?;
        Ok(bytes)
    }

    fn resolve(&self, path: &str, allow_absolute: bool) -> Result<Url, HttpError> {
        if allow_absolute {
            if let Ok(abs) = Url::parse(path) {
                return Ok(abs);
            }
        }
        self.base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))
    }

    // ==============================
    // Core request implementation
    // ==============================

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Body<'_>,
        opts: RequestOpts<'_>,
    ) -> Result<(Vec<u8>, String), HttpError> {
        let url = self.resolve(path, opts.allow_absolute)?;

        let mut attempt = 0usize;
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);

        let auth_header = match &opts.auth {
            Some(Auth::Bearer(tok)) => {
                let tok = sanitize_token(tok)?;
                Some((
                    reqwest::header::AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {tok}"))
                        .map_err(|e| HttpError::Build(e.to_string()))?,
                ))
            }
            Some(Auth::None) | None => None,
        };
        let auth_kind = match &opts.auth {
            Some(Auth::Bearer(_)) => "bearer",
            Some(Auth::None) | None => "none",
        };

        loop {
            // ----- Build request -----
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout);

            rb = match &body {
                Body::Empty => rb,
                Body::Json(bytes) => rb
                    .header(CONTENT_TYPE, "application/json")
                    .body(bytes.clone()),
                Body::Raw {
                    bytes,
                    content_type,
                } => rb.header(CONTENT_TYPE, *content_type).body(bytes.to_vec()),
            };

            if let Some(hdrs) = &opts.headers {
                rb = rb.headers(hdrs.clone());
            }
            if let Some((name, value)) = &auth_header {
                rb = rb.header(name, value);
            }

            let req_id = format!(
                "r{:x}",
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_nanos()
            );

            tracing::debug!(
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries,
                method=%method,
                host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
                timeout_ms=timeout.as_millis() as u64,
                auth_kind,
                has_body = !body.is_empty(),
                "http.request.start"
            );

            // ----- Send -----
            let t0 = std::time::Instant::now();
            let outcome = match rb.send().await {
                Ok(mut resp) => {
                    let status = resp.status();
                    let headers = resp.headers().clone();
                    read_body(&mut resp, opts.max_body_bytes)
                        .await
                        .map(|b| (status, headers, b))
                }
                Err(err) => Err(err),
            };
            let (status, headers, bytes) = match outcome {
                Ok(parts) => parts,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(req_id=%req_id, attempt, message=%message, "http.network_error");
                    return Err(HttpError::Network(message));
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;
            let Some(bytes) = bytes else {
                let limit = opts.max_body_bytes.unwrap_or_default();
                tracing::warn!(req_id=%req_id, %status, limit, "http.response.too_large");
                return Err(HttpError::TooLarge { limit });
            };

            let request_id = headers
                .get("x-request-id")
                .or_else(|| headers.get("x-correlation-id"))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            let remaining = headers
                .get("ratelimit-remaining")
                .or_else(|| headers.get("x-rate-limit-remaining"))
                .and_then(|v| v.to_str().ok());

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=dur_ms,
                body_len=bytes.len(),
                x_request_id=%request_id,
                rate_limit.remaining=?remaining,
                "http.response.headers"
            );

            if status.is_success() {
                return Ok((bytes, req_id));
            }

            // ----- Non-success: maybe retry -----
            let (code, message) = extract_error(&bytes);
            let retry_after_secs = retry_after_delay_secs(&headers);
            let is_429 = status == StatusCode::TOO_MANY_REQUESTS;

            if (is_429 || status.is_server_error()) && attempt < max_retries {
                attempt += 1;
                let delay = match retry_after_secs {
                    Some(secs) => Duration::from_secs(secs),
                    None if is_429 => backoff(attempt).max(Duration::from_millis(1100)),
                    None => backoff(attempt),
                };
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    message=%message,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id=%req_id,
                %status,
                code=?code,
                message=%message,
                x_request_id=%request_id,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                code,
                message,
                request_id,
                retry_after_secs,
            });
        }
    }
}

// ==============================
// Helpers
// ==============================

fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << (attempt.saturating_sub(1)).min(16)))
}

/// Buffer the body. `None` once it is known to exceed `limit`.
async fn read_body(
    resp: &mut reqwest::Response,
    limit: Option<usize>,
) -> Result<Option<Vec<u8>>, reqwest::Error> {
    let too_big = |len: u64| limit.is_some_and(|l| len > l as u64);
    if resp.content_length().is_some_and(too_big) {
        return Ok(None);
    }
    let mut body = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        body.extend_from_slice(&chunk);
        if too_big(body.len() as u64) {
            return Ok(None);
        }
    }
    Ok(Some(body))
}

fn decode_json<T: DeserializeOwned>(bytes: &[u8], req_id: &str) -> Result<T, HttpError> {
    serde_json::from_slice::<T>(bytes).map_err(|e| {
        let snippet = snip_body(bytes);
        tracing::warn!(
            req_id=%req_id,
            serde_err=%e,
            body_snippet=%snippet,
            "http.response.decode_error"
        );
        HttpError::Decode(e.to_string(), snippet)
    })
}

/// Pull `(code, message)` out of the common JSON error envelopes.
///
/// XRPC services reply `{"error": "ExpiredToken", "message": "..."}`; other
/// APIs use `{"message": ...}` or `{"detail": ...}`. Anything else falls back
/// to a body snippet.
fn extract_error(body: &[u8]) -> (Option<String>, String) {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return (None, snip_body(body));
    };
    let field = |name: &str| {
        value
            .get(name)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let code = field("error");
    let message = field("message")
        .or_else(|| field("detail"))
        .or_else(|| code.clone())
        .unwrap_or_else(|| snip_body(body));
    (code, message)
}

fn retry_after_delay_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        snip.truncate(floor_char_boundary(&snip, 500));
        snip.push_str("...");
    }
    snip
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn sanitize_token(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if !s.is_ascii() {
        return Err(HttpError::Build("token contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build("token contains control characters".into()));
    }
    Ok(s)
}
