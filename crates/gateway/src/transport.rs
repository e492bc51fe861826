//! Outbound HTTP transport.
//!
//! The transport itself is an injected capability behind [`FetchTransport`];
//! [`dispatch`] is the wrapper the gateway calls. It applies the proxy
//! rewrite and converts every transport failure into a synthetic `502`
//! envelope, so the caller always receives a response to serialize — a
//! failed fetch is data, not an error path.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use thiserror::Error;
use tracing::warn;

use vfetch_http::protocol::{OutboundRequest, ResponseEnvelope, ResponseHead};

/// Characters escaped in the proxied-URL parameter: everything outside the
/// `encodeURIComponent` unreserved alphabet.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A settled transport result.
///
/// Non-2xx statuses are still successes; only transport-level failures (DNS,
/// connect, TLS, proxy rejection) surface as [`FetchError`].
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub reason: String,
    pub headers: HeaderMap,
    pub redirected: bool,
    pub final_url: String,
    pub body: Bytes,
}

/// Capability issuing one outbound HTTP request and collecting the full
/// response body.
#[async_trait]
pub trait FetchTransport: Send + Sync {
    /// Issues `request` against `url`, which is already proxy-rewritten when
    /// a proxy is configured.
    async fn issue(&self, url: &str, request: &OutboundRequest) -> Result<FetchResponse, FetchError>;
}

/// Failure of the transport leg itself.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid request method: {method:?}")]
    InvalidMethod { method: String },

    #[error("{source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    /// Free-form failure for transports not backed by `reqwest`.
    #[error("{reason}")]
    Other { reason: String },
}

/// `reqwest`-backed default transport.
///
/// Follows redirects with the client's default policy; the final resolved
/// URL is reported back through [`FetchResponse`].
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FetchTransport for HttpClient {
    async fn issue(&self, url: &str, request: &OutboundRequest) -> Result<FetchResponse, FetchError> {
        let method = Method::from_bytes(request.method().as_bytes())
            .map_err(|_e| FetchError::InvalidMethod { method: request.method().to_owned() })?;

        let mut builder = self.client.request(method, url).headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let final_url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(FetchResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
            // reqwest exposes no redirect flag; a changed final url is the
            // closest observable signal
            redirected: final_url != url,
            final_url,
            body,
        })
    }
}

/// Issues `request` through `transport`, never failing.
///
/// Applies the proxy rewrite when a prefix is configured, then converts any
/// transport error into a synthetic `502 Fetch Error` envelope carrying the
/// dispatched URL and the failure detail in a plain-text body.
pub async fn dispatch(
    transport: &dyn FetchTransport,
    proxy_url: Option<&str>,
    request: &OutboundRequest,
) -> ResponseEnvelope {
    let url = match proxy_url {
        Some(prefix) => format!("{prefix}{}", utf8_percent_encode(request.url().as_str(), URL_COMPONENT)),
        None => request.url().as_str().to_owned(),
    };

    match transport.issue(&url, request).await {
        Ok(response) => response.into(),
        Err(e) => {
            warn!(%url, error = %e, "fetch failed");
            fetch_error_envelope(&url, &e)
        }
    }
}

impl From<FetchResponse> for ResponseEnvelope {
    fn from(response: FetchResponse) -> Self {
        let FetchResponse { status, reason, headers, redirected, final_url, body } = response;
        ResponseEnvelope::new(ResponseHead::new(status, reason, headers, redirected, final_url), body)
    }
}

/// Builds the synthetic response standing in for a failed fetch.
fn fetch_error_envelope(url: &str, error: &FetchError) -> ResponseEnvelope {
    let mut headers = HeaderMap::new();
    headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    let body = format!("Fetch {url} failed:\n\n{error}");
    ResponseEnvelope::new(ResponseHead::new(502, "Fetch Error", headers, false, url), Bytes::from(body))
}
