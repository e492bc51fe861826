//! Response envelope types.
//!
//! A settled transport result travels back toward the guest as a
//! [`ResponseEnvelope`]: the head carries everything the serializer needs
//! except the body bytes, so the two can be written to the connection as
//! separate raw writes with a length that always matches.

use bytes::Bytes;
use http::HeaderMap;

/// The header portion of a gateway response.
///
/// The status text is carried verbatim rather than derived from the code:
/// synthetic responses use non-canonical phrases such as `Fetch Error`.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    status: u16,
    reason: String,
    headers: HeaderMap,
    redirected: bool,
    final_url: String,
}

impl ResponseHead {
    pub fn new(
        status: u16,
        reason: impl Into<String>,
        headers: HeaderMap,
        redirected: bool,
        final_url: impl Into<String>,
    ) -> Self {
        Self { status, reason: reason.into(), headers, redirected, final_url: final_url.into() }
    }

    /// Returns the numeric status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the status text for the status line.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns the response headers as received from the transport.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether the transport followed a redirect while resolving the request.
    pub fn redirected(&self) -> bool {
        self.redirected
    }

    /// The URL the transport finally resolved, after any redirects.
    pub fn final_url(&self) -> &str {
        &self.final_url
    }
}

/// A settled response: head plus the full body collected by the transport.
///
/// Constructed once per reply and consumed by the serializer.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    head: ResponseHead,
    body: Bytes,
}

impl ResponseEnvelope {
    pub fn new(head: ResponseHead, body: Bytes) -> Self {
        Self { head, body }
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Splits the envelope for serialization: the head is encoded as one
    /// text block, the body follows as a raw write.
    pub fn into_parts(self) -> (ResponseHead, Bytes) {
        (self.head, self.body)
    }
}
