use std::io;
use thiserror::Error;

/// Errors raised while reassembling and validating a guest request.
///
/// Every variant is local to a single request: the gateway answers with a
/// minimal `400 Bad Request` and retires the connection, and nothing is ever
/// forwarded to the transport.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header block too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHead { current_size: usize, max_size: usize },

    #[error("header line has no colon separator: {line:?}")]
    MalformedHeader { line: String },

    #[error("header key is empty: {line:?}")]
    EmptyHeaderKey { line: String },

    #[error("header value is empty: {line:?}")]
    EmptyHeaderValue { line: String },

    #[error("header key contains forbidden characters: {line:?}")]
    ForbiddenHeaderKey { line: String },

    #[error("header value contains forbidden characters: {line:?}")]
    ForbiddenHeaderValue { line: String },

    #[error("malformed request line: {line:?}")]
    MalformedRequestLine { line: String },

    #[error("invalid request target: {target:?}")]
    InvalidTarget { target: String },

    #[error("request head is not valid utf-8")]
    InvalidEncoding,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_head(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHead { current_size, max_size }
    }

    pub fn malformed_header(line: impl Into<String>) -> Self {
        Self::MalformedHeader { line: line.into() }
    }

    pub fn empty_header_key(line: impl Into<String>) -> Self {
        Self::EmptyHeaderKey { line: line.into() }
    }

    pub fn empty_header_value(line: impl Into<String>) -> Self {
        Self::EmptyHeaderValue { line: line.into() }
    }

    pub fn forbidden_header_key(line: impl Into<String>) -> Self {
        Self::ForbiddenHeaderKey { line: line.into() }
    }

    pub fn forbidden_header_value(line: impl Into<String>) -> Self {
        Self::ForbiddenHeaderValue { line: line.into() }
    }

    pub fn malformed_request_line(line: impl Into<String>) -> Self {
        Self::MalformedRequestLine { line: line.into() }
    }

    pub fn invalid_target(target: impl Into<String>) -> Self {
        Self::InvalidTarget { target: target.into() }
    }
}

/// Errors raised while serializing a response head.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}
