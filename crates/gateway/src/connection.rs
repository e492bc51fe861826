//! Guest-side connection handle and per-connection record.
//!
//! The TCP state machine lives outside this crate: handshakes, sequence
//! numbers and segmentation all belong to the emulated network stack. The
//! gateway sees a connection only as a [`GuestTcp`] handle it can accept and
//! write response bytes to, plus the per-tuple record it owns itself.

use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use vfetch_http::codec::RequestDecoder;

/// Write target for response bytes, backed by the emulated TCP connection.
///
/// Implementations own the handshake and segmentation; the gateway only ever
/// accepts the pending connection and writes raw response bytes.
pub trait GuestTcp: Send + Sync {
    /// Completes the accept of the pending handshake.
    fn accept(&self);

    /// Writes raw bytes onto the stream toward the guest.
    ///
    /// Returns [`SinkClosed`] when the connection was torn down first; the
    /// gateway tolerates that as a no-op.
    fn write(&self, bytes: Bytes) -> Result<(), SinkClosed>;
}

/// The connection disappeared underneath a late write.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("connection sink is closed")]
pub struct SinkClosed;

/// Lifecycle of one gateway-bound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Accumulating bytes; header terminator not yet seen.
    AwaitingRequest,
    /// Request handed to the transport; further inbound bytes are ignored.
    Dispatched,
    /// Response written, or the request rejected with a 400.
    Responded,
    /// Torn down by the TCP state machine.
    Closed,
}

/// Per-connection state owned by the connection table.
///
/// The accumulation buffer is mutated only by data-arrival events for its
/// own tuple; nothing is shared across connections.
pub(crate) struct ConnRecord {
    pub(crate) state: ConnState,
    pub(crate) buffer: BytesMut,
    pub(crate) decoder: RequestDecoder,
    pub(crate) sink: Arc<dyn GuestTcp>,
}

impl ConnRecord {
    pub(crate) fn new(sink: Arc<dyn GuestTcp>) -> Self {
        Self { state: ConnState::AwaitingRequest, buffer: BytesMut::new(), decoder: RequestDecoder::new(), sink }
    }
}

impl fmt::Debug for ConnRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnRecord")
            .field("state", &self.state)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}
