//! Protocol types for the gateway's HTTP/1.x subset.
//!
//! This module defines the data that flows through one request cycle:
//!
//! - [`Header`] and [`parse_header_line`]: strict per-line header validation
//! - [`RequestLine`] and [`RequestParts`]: the reassembled guest request
//! - [`OutboundRequest`]: the canonical request handed to the transport
//! - [`ResponseHead`] and [`ResponseEnvelope`]: the settled reply
//! - [`ParseError`] and [`SendError`]: the error types for each direction

mod error;
mod header;
mod request;
mod response;

pub use error::{ParseError, SendError};
pub use header::{Header, parse_header_line};
pub use request::{OutboundRequest, RequestLine, RequestParts};
pub use response::{ResponseEnvelope, ResponseHead};
