//! The HTTP/1.x wire subset spoken by the vfetch gateway
//!
//! This crate provides the framing layer for a gateway that translates raw
//! TCP byte streams coming out of an emulated network interface into host-side
//! HTTP requests. It deliberately implements a narrow subset of HTTP/1.x:
//! one request per connection, full-body responses with a precomputed length,
//! and a header grammar that is stricter than the RFC token rules because the
//! bytes originate from an untrusted guest.
//!
//! # Features
//!
//! - Incremental request reassembly, independent of TCP segment boundaries
//! - Strict per-line header validation with early rejection
//! - Outbound request construction with proxy-style absolute targets,
//!   `Host` authority resolution and optional scheme upgrade
//! - Response head serialization with hop-by-hop header filtering and
//!   fetch diagnostic headers
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use tokio_util::codec::Decoder;
//! use vfetch_http::codec::RequestDecoder;
//! use vfetch_http::protocol::OutboundRequest;
//!
//! let mut buffer = BytesMut::from(&b"GET /foo HTTP/1.1\r\nHost: example.com\r\n\r\n"[..]);
//!
//! let mut decoder = RequestDecoder::new();
//! let parts = decoder.decode(&mut buffer).unwrap().unwrap();
//!
//! let request = OutboundRequest::build(parts, false).unwrap();
//! assert_eq!(request.url().as_str(), "http://example.com/foo");
//! ```
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - [`protocol`]: parsed header, request line, outbound request and response
//!   envelope types, plus the error types
//! - [`codec`]: the [`codec::RequestDecoder`] and [`codec::ResponseEncoder`]
//!   implementing the `tokio_util` codec traits over the connection buffer
//!
//! # Design
//!
//! Reassembly is a pure step function over a `BytesMut` accumulation buffer:
//! each data-arrival event appends bytes and runs one decode step, and the
//! four-byte header terminator is searched on every step rather than assumed
//! to align with a delivery boundary. Whatever follows the terminator at that
//! moment is the request body; the buffer is left empty and the connection is
//! never reused for a second request.
//!
//! # Limitations
//!
//! - No chunked transfer encoding, on either side
//! - No persistent or pipelined connections
//! - Maximum header block size: 8KB

pub mod codec;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
