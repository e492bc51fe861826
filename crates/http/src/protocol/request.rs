//! Outbound request construction.
//!
//! This module turns a reassembled guest request into the canonical request
//! handed to the HTTP transport: an absolute target URL, a multi-valued
//! header collection and the optional body bytes. Target resolution follows
//! the proxy convention: a guest sending an absolute `http`/`https` target is
//! treated as an explicit proxy client, everything else is an origin-relative
//! path whose authority comes from the `Host` header.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;
use url::Url;

use crate::protocol::{Header, ParseError};

/// Placeholder authority for origin-relative targets, overwritten by the
/// `Host` header when one is present.
const PLACEHOLDER_AUTHORITY: &str = "host";

/// The parsed first line of a guest request.
///
/// The protocol-version token is accepted but ignored: the gateway always
/// answers in HTTP/1.1 and never negotiates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    method: String,
    target: String,
}

impl RequestLine {
    /// Splits a raw request line into its method and target tokens.
    ///
    /// Lines with fewer than two tokens are rejected: without a target there
    /// is no request to forward.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut tokens = line.split_ascii_whitespace();
        let (Some(method), Some(target)) = (tokens.next(), tokens.next()) else {
            return Err(ParseError::malformed_request_line(line));
        };
        Ok(Self { method: method.to_owned(), target: target.to_owned() })
    }

    /// Returns the method token as it appeared on the wire.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the raw request target.
    pub fn target(&self) -> &str {
        &self.target
    }
}

/// A fully reassembled request: request line, validated headers, and the
/// residual body bytes that followed the header terminator.
#[derive(Debug)]
pub struct RequestParts {
    pub line: RequestLine,
    pub headers: Vec<Header>,
    pub body: Bytes,
}

/// The canonical outbound request handed to the HTTP transport.
///
/// Constructed once per guest request and discarded after dispatch.
#[derive(Debug)]
pub struct OutboundRequest {
    method: String,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl OutboundRequest {
    /// Builds the outbound request from reassembled parts.
    ///
    /// Target resolution:
    /// - an absolute `http`/`https` target is used directly (explicit proxy
    ///   request) and the `Host` header cannot override it,
    /// - any other target is an origin-relative path whose authority is
    ///   resolved from the last `Host` header.
    ///
    /// With `upgrade_insecure` set, a resolved `http` URL is rewritten to
    /// `https` before dispatch. Every header except `Host` is copied
    /// verbatim, duplicates preserved. The body attaches only to `PUT` and
    /// `POST` requests; other methods drop it even when present.
    pub fn build(parts: RequestParts, upgrade_insecure: bool) -> Result<Self, ParseError> {
        let RequestParts { line, headers, body } = parts;

        let absolute = line.target.starts_with("http:") || line.target.starts_with("https:");
        let mut url = if absolute {
            Url::parse(&line.target).map_err(|_e| ParseError::invalid_target(&line.target))?
        } else {
            Url::parse(&format!("http://{PLACEHOLDER_AUTHORITY}{}", line.target))
                .map_err(|_e| ParseError::invalid_target(&line.target))?
        };

        let mut out_headers = HeaderMap::with_capacity(headers.len());
        let mut authority = None;
        for header in &headers {
            if header.is_host() {
                authority = Some(header.value());
                continue;
            }
            // Validated header lines are always legal http tokens: keys are
            // word characters and hyphens, values printable ASCII.
            let name = HeaderName::from_bytes(header.name().as_bytes()).unwrap();
            let value = HeaderValue::from_str(header.value()).unwrap();
            out_headers.append(name, value);
        }

        if !absolute && let Some(authority) = authority {
            apply_authority(&mut url, authority);
        }

        if upgrade_insecure && url.scheme() == "http" {
            let _ = url.set_scheme("https");
        }

        let body = if line.method.eq_ignore_ascii_case("put") || line.method.eq_ignore_ascii_case("post") {
            Some(body)
        } else {
            None
        };

        Ok(Self { method: line.method, url, headers: out_headers, body })
    }

    /// Returns the method token, forwarded verbatim to the transport.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the resolved absolute target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the outbound header collection.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the request body, present only for `PUT` and `POST`.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

/// Overwrites the authority of `url` with a raw `Host` header value such as
/// `example.com` or `example.com:8080`.
///
/// An unparsable value leaves the placeholder authority in place, matching
/// the lenient authority setter this replaces.
fn apply_authority(url: &mut Url, raw: &str) {
    match Url::parse(&format!("http://{raw}/")) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => {
                // set_host/set_port cannot fail on an http url with an
                // already-validated host
                let _ = url.set_host(Some(host));
                let _ = url.set_port(parsed.port());
            }
            None => warn!(host = raw, "host header has no host component, keeping placeholder"),
        },
        Err(_e) => warn!(host = raw, "ignoring unparsable host header"),
    }
}
