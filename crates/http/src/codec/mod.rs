//! Codec layer for the gateway's HTTP/1.x subset.
//!
//! The two halves mirror the direction of travel:
//!
//! - [`RequestDecoder`]: reassembles one guest request from the connection's
//!   accumulation buffer, one decode step per data-arrival event
//! - [`ResponseEncoder`]: serializes a response head into the single text
//!   block written back onto the connection
//!
//! Both implement the `tokio_util` codec traits so the step functions stay
//! independently testable against raw buffers.

mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
