//! Guest request reassembly.
//!
//! Bytes arrive from the emulated TCP stream in arbitrary segment sizes, so
//! the decoder runs one step per data-arrival event over the connection's
//! accumulation buffer. The four-byte header terminator is searched on every
//! step and never assumed to align with a delivery boundary.

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{Header, ParseError, RequestLine, RequestParts, parse_header_line};

/// Four-byte sequence terminating an HTTP/1.x header block.
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Maximum size in bytes the accumulated head may reach before the request
/// is rejected.
const MAX_HEAD_BYTES: usize = 8 * 1024;

/// Decoder that reassembles one HTTP/1.x request from an emulated TCP
/// stream, implementing the [`Decoder`] trait.
///
/// `decode` is a pure step function over the buffer: it either asks for more
/// data, yields the complete [`RequestParts`], or rejects the request. When
/// the terminator is found, everything before it is parsed as the request
/// line and header lines, everything after it becomes the request body, and
/// the buffer is left empty. One decoder handles at most one request; the
/// gateway never reuses a connection for a second one.
#[derive(Debug, Default)]
pub struct RequestDecoder;

impl RequestDecoder {
    /// Creates a new `RequestDecoder` instance.
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for RequestDecoder {
    type Item = RequestParts;
    type Error = ParseError;

    /// Attempts to reassemble a request from the accumulated bytes.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(parts))` once the header terminator is present and every
    ///   header line validated
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` if the head is oversized, not decodable as text,
    ///   or any line fails validation
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(offset) = find_terminator(src) else {
            ensure!(src.len() <= MAX_HEAD_BYTES, ParseError::too_large_head(src.len(), MAX_HEAD_BYTES));
            return Ok(None);
        };
        ensure!(offset <= MAX_HEAD_BYTES, ParseError::too_large_head(offset, MAX_HEAD_BYTES));

        let head = src.split_to(offset + HEADER_TERMINATOR.len());
        let body = src.split().freeze();
        trace!(head_bytes = offset, body_bytes = body.len(), "request head complete");

        let head = std::str::from_utf8(&head[..offset]).map_err(|_e| ParseError::InvalidEncoding)?;

        let mut lines = head.split("\r\n");
        let line = RequestLine::parse(lines.next().unwrap_or_default())?;
        let headers = lines.map(parse_header_line).collect::<Result<Vec<Header>, _>>()?;

        Ok(Some(RequestParts { line, headers, body }))
    }
}

/// Returns the offset of the first header terminator, if present.
fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len()).position(|window| window == HEADER_TERMINATOR)
}
