//! Response head serialization.
//!
//! The gateway re-frames every response itself: the body always travels as a
//! whole with a precomputed length, and the connection never stays open. The
//! upstream framing headers are therefore suppressed and replaced, and two
//! diagnostic headers report what the fetch actually resolved.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::protocol::{ResponseHead, SendError};

/// Initial buffer size reserved for head serialization.
const INIT_HEAD_SIZE: usize = 4 * 1024;

/// Upstream headers the gateway recomputes itself; copying them would
/// double-frame the body.
const SUPPRESSED_HEADERS: [&str; 4] = ["content-encoding", "connection", "content-length", "transfer-encoding"];

/// Encoder for the head of a gateway response, implementing the [`Encoder`]
/// trait.
///
/// Serializes, in order: the status line, the fixed `connection: Closed`
/// header, a recomputed `content-length`, the two fetch diagnostic headers,
/// and every envelope header outside the hop-by-hop set, followed by the
/// blank-line terminator. The body is not part of the item: the gateway
/// writes it to the connection as a separate raw write, passing its length
/// here so the framing always matches.
#[derive(Debug, Default)]
pub struct ResponseEncoder;

impl ResponseEncoder {
    /// Creates a new `ResponseEncoder` instance.
    pub fn new() -> Self {
        Self
    }
}

impl Encoder<(ResponseHead, usize)> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, usize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (head, body_len) = item;

        dst.reserve(INIT_HEAD_SIZE);
        write!(FastWrite(dst), "HTTP/1.1 {} {}\r\n", head.status(), head.reason())?;
        dst.put_slice(b"connection: Closed\r\n");
        write!(FastWrite(dst), "content-length: {body_len}\r\n")?;
        write!(FastWrite(dst), "x-was-fetch-redirected: {}\r\n", head.redirected())?;
        write!(FastWrite(dst), "x-fetch-resp-url: {}\r\n", head.final_url())?;

        for (name, value) in head.headers() {
            if SUPPRESSED_HEADERS.contains(&name.as_str()) {
                continue;
            }
            dst.put_slice(name.as_str().as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Fast writer implementation for writing to BytesMut.
///
/// Avoids bounds checking on the formatted writes, since enough space has
/// already been reserved.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
