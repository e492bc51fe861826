//! HTTP-over-emulated-TCP translation gateway
//!
//! This crate sits between an emulated network interface carrying raw TCP
//! byte streams and a host-provided HTTP client capability. Guest TCP
//! connections to port 80 are claimed by the gateway, reassembled into one
//! HTTP/1.x request each, issued through an injected [`FetchTransport`], and
//! answered by re-framing the settled response back into the byte stream the
//! guest is reading from.
//!
//! # Features
//!
//! - Port-based connection claiming: destination port 80 is taken
//!   unconditionally, everything else is declined for other handlers
//! - Per-tuple connection table safe under concurrent arrival and teardown
//! - One request per connection, dispatched on its own task so a slow fetch
//!   never stalls other connections
//! - Proxy-prefix rewriting and optional `http`→`https` target upgrade
//! - Every failure resolves to a response: malformed input to a minimal
//!   `400`, transport failures to a synthetic `502` carrying the failure
//!   detail
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use vfetch_gateway::{FetchGateway, FlowKey, GatewayConfig, GuestTcp, SinkClosed};
//!
//! /// Minimal guest-side connection handle; a real embedding wires this to
//! /// the emulated TCP state machine.
//! struct LoopbackConn;
//!
//! impl GuestTcp for LoopbackConn {
//!     fn accept(&self) {}
//!
//!     fn write(&self, bytes: Bytes) -> Result<(), SinkClosed> {
//!         println!("{} response bytes toward the guest", bytes.len());
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = tracing_subscriber::FmtSubscriber::builder()
//!         .with_max_level(tracing::Level::DEBUG)
//!         .finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     let gateway = FetchGateway::new(GatewayConfig::default());
//!
//!     let key = FlowKey {
//!         src_ip: "192.168.86.100".parse().unwrap(),
//!         src_port: 49152,
//!         dst_ip: "93.184.216.34".parse().unwrap(),
//!         dst_port: 80,
//!     };
//!
//!     assert!(gateway.on_tcp_connection(key, Arc::new(LoopbackConn)));
//!     gateway.on_tcp_data(key, b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
//! }
//! ```
//!
//! # Architecture
//!
//! - [`gateway`]: the [`FetchGateway`] dispatcher driven by connection,
//!   data-arrival and teardown events
//! - [`table`]: the tuple-keyed connection table
//! - [`connection`]: the [`GuestTcp`] collaborator trait and per-connection
//!   record
//! - [`transport`]: the [`FetchTransport`] capability, the `reqwest`-backed
//!   [`HttpClient`], and the never-failing dispatch wrapper
//! - [`config`]: immutable per-instance configuration
//!
//! Framing itself — reassembly, header validation, request construction and
//! response serialization — lives in the `vfetch-http` crate.

pub mod config;
pub mod connection;
pub mod gateway;
pub mod table;
pub mod transport;

pub use config::GatewayConfig;
pub use connection::{ConnState, GuestTcp, SinkClosed};
pub use gateway::FetchGateway;
pub use table::FlowKey;
pub use transport::{FetchError, FetchResponse, FetchTransport, HttpClient};
