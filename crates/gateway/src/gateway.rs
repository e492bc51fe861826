//! Connection dispatch: the port-80 accept hook, per-tuple data routing,
//! and the request/response cycle.
//!
//! The gateway is driven entirely by events from the emulated TCP stack:
//! a connection attempt, data arrivals, and teardown. Data arrivals return
//! immediately — once a request is fully reassembled it is dispatched on its
//! own task, so one slow fetch never stalls other connections.

use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, error, trace, warn};

use vfetch_http::codec::ResponseEncoder;
use vfetch_http::protocol::{OutboundRequest, RequestParts};

use crate::config::GatewayConfig;
use crate::connection::{ConnRecord, ConnState, GuestTcp};
use crate::table::{ConnTable, FlowKey};
use crate::transport::{self, FetchTransport, HttpClient};

/// Destination port the gateway claims.
const HTTP_PORT: u16 = 80;

/// Byte-exact minimal response for malformed requests.
const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0";

/// HTTP-over-emulated-TCP translation gateway.
///
/// Claims guest TCP connections to port 80, reassembles one HTTP/1.x request
/// per connection, issues it through the configured [`FetchTransport`], and
/// writes the re-framed response back onto the connection. Cloning is cheap
/// and shares the connection table.
#[derive(Clone)]
pub struct FetchGateway {
    config: Arc<GatewayConfig>,
    transport: Arc<dyn FetchTransport>,
    table: Arc<ConnTable>,
}

impl FetchGateway {
    /// Creates a gateway backed by the default `reqwest` transport.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_transport(config, Arc::new(HttpClient::new()))
    }

    /// Creates a gateway with an injected transport capability.
    pub fn with_transport(config: GatewayConfig, transport: Arc<dyn FetchTransport>) -> Self {
        Self { config: Arc::new(config), transport, table: Arc::new(ConnTable::new()) }
    }

    /// Returns the gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Number of connections currently tracked.
    pub fn active_connections(&self) -> usize {
        self.table.len()
    }

    /// Connection-acceptance hook.
    ///
    /// Claims the connection when the destination port is 80: accepts the
    /// pending handshake, registers a record for the tuple and returns true.
    /// Any other port is declined so another protocol handler may claim it.
    pub fn on_tcp_connection(&self, key: FlowKey, conn: Arc<dyn GuestTcp>) -> bool {
        if key.dst_port != HTTP_PORT {
            return false;
        }
        conn.accept();
        self.table.insert(key, ConnRecord::new(conn));
        debug!(%key, "accepted guest http connection");
        true
    }

    /// Data-arrival event for `key`.
    ///
    /// Returns immediately. Bytes for unknown tuples or already-dispatched
    /// requests are ignored; when the header terminator is found, the
    /// request is dispatched on its own task and no further bytes are
    /// accepted for this connection.
    pub fn on_tcp_data(&self, key: FlowKey, data: &[u8]) {
        let Some(mut guard) = self.table.get_mut(&key) else {
            trace!(%key, len = data.len(), "bytes for unknown connection, ignoring");
            return;
        };
        if guard.state != ConnState::AwaitingRequest {
            trace!(%key, len = data.len(), state = ?guard.state, "request already dispatched, ignoring bytes");
            return;
        }

        let decoded = {
            let record = &mut *guard;
            record.buffer.extend_from_slice(data);
            record.decoder.decode(&mut record.buffer)
        };

        match decoded {
            Ok(None) => {}
            Ok(Some(parts)) => {
                guard.state = ConnState::Dispatched;
                let sink = Arc::clone(&guard.sink);
                drop(guard);

                let gateway = self.clone();
                tokio::spawn(async move {
                    gateway.handle_request(key, parts, sink).await;
                });
            }
            Err(e) => {
                warn!(%key, error = %e, "rejecting malformed request");
                let sink = Arc::clone(&guard.sink);
                drop(guard);
                self.reject_bad_request(key, sink.as_ref());
            }
        }
    }

    /// Teardown signal from the TCP state machine: forget the tuple.
    ///
    /// A response task still in flight will find the sink closed and the
    /// tuple gone; both are tolerated.
    pub fn on_tcp_teardown(&self, key: FlowKey) {
        if let Some(mut record) = self.table.remove(&key) {
            record.state = ConnState::Closed;
            debug!(%key, state = ?record.state, "connection torn down");
        }
    }

    /// Runs one request through build → fetch → serialize → write.
    async fn handle_request(&self, key: FlowKey, parts: RequestParts, sink: Arc<dyn GuestTcp>) {
        let envelope = match OutboundRequest::build(parts, self.config.upgrade_insecure) {
            Ok(request) => {
                debug!(%key, url = %request.url(), "http dispatch");
                transport::dispatch(self.transport.as_ref(), self.config.proxy_url.as_deref(), &request).await
            }
            Err(e) => {
                warn!(%key, error = %e, "rejecting malformed request");
                self.reject_bad_request(key, sink.as_ref());
                return;
            }
        };

        let (head, body) = envelope.into_parts();
        let mut head_bytes = BytesMut::new();
        let mut encoder = ResponseEncoder::new();
        if let Err(e) = encoder.encode((head, body.len()), &mut head_bytes) {
            error!(%key, error = %e, "failed to serialize response head");
            self.table.remove(&key);
            return;
        }

        if sink.write(head_bytes.freeze()).is_err() || sink.write(body).is_err() {
            debug!(%key, "connection closed before response write");
        }
        self.retire(key);
    }

    /// Writes the minimal 400 and retires the record; malformed input never
    /// reaches the transport.
    fn reject_bad_request(&self, key: FlowKey, sink: &dyn GuestTcp) {
        if sink.write(Bytes::from_static(BAD_REQUEST)).is_err() {
            debug!(%key, "connection closed before error response");
        }
        self.retire(key);
    }

    /// Removes the record after one response cycle; the tuple is free for
    /// reuse by a new connection.
    fn retire(&self, key: FlowKey) {
        if let Some(mut record) = self.table.remove(&key) {
            record.state = ConnState::Responded;
            trace!(%key, state = ?record.state, "request cycle complete");
        }
    }
}

impl fmt::Debug for FetchGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchGateway")
            .field("config", &self.config)
            .field("active_connections", &self.table.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use http::HeaderMap;

    use crate::connection::SinkClosed;
    use crate::transport::{FetchError, FetchResponse};

    /// Records every issued request; settles with a canned response, a
    /// failure, or after an artificial delay.
    struct StubTransport {
        seen: Mutex<Vec<(String, String, Option<Bytes>)>>,
        fail: bool,
        delay: Option<Duration>,
    }

    impl StubTransport {
        fn ok() -> Arc<Self> {
            Arc::new(Self { seen: Mutex::new(Vec::new()), fail: false, delay: None })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { seen: Mutex::new(Vec::new()), fail: true, delay: None })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self { seen: Mutex::new(Vec::new()), fail: false, delay: Some(delay) })
        }

        fn requests(&self) -> Vec<(String, String, Option<Bytes>)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FetchTransport for StubTransport {
        async fn issue(&self, url: &str, request: &OutboundRequest) -> Result<FetchResponse, FetchError> {
            self.seen.lock().unwrap().push((
                url.to_owned(),
                request.method().to_owned(),
                request.body().cloned(),
            ));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(FetchError::Other { reason: "name resolution failed".to_owned() });
            }
            let mut headers = HeaderMap::new();
            headers.insert("content-type", "text/html".parse().unwrap());
            headers.insert("content-encoding", "gzip".parse().unwrap());
            Ok(FetchResponse {
                status: 200,
                reason: "OK".to_owned(),
                headers,
                redirected: false,
                final_url: url.to_owned(),
                body: Bytes::from_static(b"hello"),
            })
        }
    }

    /// Guest-side sink capturing response writes.
    #[derive(Default)]
    struct RecordingSink {
        accepted: AtomicBool,
        closed: AtomicBool,
        writes: Mutex<Vec<Bytes>>,
    }

    impl RecordingSink {
        fn write_count(&self) -> usize {
            self.writes.lock().unwrap().len()
        }

        fn written(&self) -> Vec<u8> {
            self.writes.lock().unwrap().iter().flat_map(|chunk| chunk.iter().copied()).collect()
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    impl GuestTcp for RecordingSink {
        fn accept(&self) {
            self.accepted.store(true, Ordering::SeqCst);
        }

        fn write(&self, bytes: Bytes) -> Result<(), SinkClosed> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(SinkClosed);
            }
            self.writes.lock().unwrap().push(bytes);
            Ok(())
        }
    }

    fn key(dst_port: u16) -> FlowKey {
        FlowKey {
            src_ip: Ipv4Addr::new(192, 168, 86, 100),
            src_port: 49152,
            dst_ip: Ipv4Addr::new(93, 184, 216, 34),
            dst_port,
        }
    }

    async fn wait_for(condition: impl Fn() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn claims_port_80_and_declines_others() {
        let gateway = FetchGateway::with_transport(GatewayConfig::default(), StubTransport::ok());
        let sink = Arc::new(RecordingSink::default());

        assert!(!gateway.on_tcp_connection(key(443), sink.clone()));
        assert!(!sink.accepted.load(Ordering::SeqCst));
        assert_eq!(gateway.active_connections(), 0);

        assert!(gateway.on_tcp_connection(key(80), sink.clone()));
        assert!(sink.accepted.load(Ordering::SeqCst));
        assert_eq!(gateway.active_connections(), 1);
    }

    #[tokio::test]
    async fn full_request_cycle_over_split_segments() {
        let transport = StubTransport::ok();
        let gateway = FetchGateway::with_transport(GatewayConfig::default(), transport.clone());
        let sink = Arc::new(RecordingSink::default());

        gateway.on_tcp_connection(key(80), sink.clone());
        gateway.on_tcp_data(key(80), b"GET /fo");
        gateway.on_tcp_data(key(80), b"o HTTP/1.1\r\nHost: example.com\r\n\r");
        gateway.on_tcp_data(key(80), b"\n");

        wait_for(|| sink.write_count() >= 2).await;

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "http://example.com/foo");
        assert_eq!(requests[0].1, "GET");
        assert!(requests[0].2.is_none());

        let response = String::from_utf8(sink.written()).unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("connection: Closed\r\n"));
        assert!(response.contains("content-length: 5\r\n"));
        assert!(response.contains("content-type: text/html\r\n"));
        // upstream framing is recomputed, never copied
        assert!(!response.contains("gzip"));
        assert!(response.ends_with("\r\n\r\nhello"));

        wait_for(|| gateway.active_connections() == 0).await;
    }

    #[tokio::test]
    async fn post_attaches_residual_body_bytes() {
        let transport = StubTransport::ok();
        let gateway = FetchGateway::with_transport(GatewayConfig::default(), transport.clone());
        let sink = Arc::new(RecordingSink::default());

        gateway.on_tcp_connection(key(80), sink.clone());
        gateway.on_tcp_data(key(80), b"POST /submit HTTP/1.1\r\nHost: example.com\r\n\r\nping");

        wait_for(|| sink.write_count() >= 2).await;

        let requests = transport.requests();
        assert_eq!(requests[0].1, "POST");
        assert_eq!(requests[0].2.as_deref(), Some(&b"ping"[..]));
    }

    #[tokio::test]
    async fn get_drops_residual_body_bytes() {
        let transport = StubTransport::ok();
        let gateway = FetchGateway::with_transport(GatewayConfig::default(), transport.clone());
        let sink = Arc::new(RecordingSink::default());

        gateway.on_tcp_connection(key(80), sink.clone());
        gateway.on_tcp_data(key(80), b"GET /page HTTP/1.1\r\nHost: example.com\r\n\r\nstray");

        wait_for(|| sink.write_count() >= 2).await;
        assert!(transport.requests()[0].2.is_none());
    }

    #[tokio::test]
    async fn absolute_target_ignores_host_header() {
        let transport = StubTransport::ok();
        let gateway = FetchGateway::with_transport(GatewayConfig::default(), transport.clone());
        let sink = Arc::new(RecordingSink::default());

        gateway.on_tcp_connection(key(80), sink.clone());
        gateway.on_tcp_data(key(80), b"GET https://a.b/c HTTP/1.1\r\nHost: ignored\r\n\r\n");

        wait_for(|| sink.write_count() >= 2).await;
        assert_eq!(transport.requests()[0].0, "https://a.b/c");
    }

    #[tokio::test]
    async fn upgrade_insecure_rewrites_the_dispatched_scheme() {
        let transport = StubTransport::ok();
        let config = GatewayConfig { upgrade_insecure: true, ..GatewayConfig::default() };
        let gateway = FetchGateway::with_transport(config, transport.clone());
        let sink = Arc::new(RecordingSink::default());

        gateway.on_tcp_connection(key(80), sink.clone());
        gateway.on_tcp_data(key(80), b"GET /foo HTTP/1.1\r\nHost: example.com\r\n\r\n");

        wait_for(|| sink.write_count() >= 2).await;
        assert_eq!(transport.requests()[0].0, "https://example.com/foo");
    }

    #[tokio::test]
    async fn proxy_prefix_rewrites_the_dispatched_url() {
        let transport = StubTransport::ok();
        let config =
            GatewayConfig { proxy_url: Some("https://corsproxy.example/?".to_owned()), ..GatewayConfig::default() };
        let gateway = FetchGateway::with_transport(config, transport.clone());
        let sink = Arc::new(RecordingSink::default());

        gateway.on_tcp_connection(key(80), sink.clone());
        gateway.on_tcp_data(key(80), b"GET /a?b=c HTTP/1.1\r\nHost: example.com\r\n\r\n");

        wait_for(|| sink.write_count() >= 2).await;
        assert_eq!(transport.requests()[0].0, "https://corsproxy.example/?http%3A%2F%2Fexample.com%2Fa%3Fb%3Dc");
    }

    #[tokio::test]
    async fn malformed_header_answers_with_the_minimal_400() {
        let transport = StubTransport::ok();
        let gateway = FetchGateway::with_transport(GatewayConfig::default(), transport.clone());
        let sink = Arc::new(RecordingSink::default());

        gateway.on_tcp_connection(key(80), sink.clone());
        gateway.on_tcp_data(key(80), b"GET / HTTP/1.1\r\nBad Header: x\r\n\r\n");

        // the rejection happens synchronously on the arrival event
        assert_eq!(sink.write_count(), 1);
        assert_eq!(sink.written(), b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0");
        assert!(transport.requests().is_empty());
        assert_eq!(gateway.active_connections(), 0);
    }

    #[tokio::test]
    async fn transport_failure_answers_with_a_502() {
        let transport = StubTransport::failing();
        let gateway = FetchGateway::with_transport(GatewayConfig::default(), transport.clone());
        let sink = Arc::new(RecordingSink::default());

        gateway.on_tcp_connection(key(80), sink.clone());
        gateway.on_tcp_data(key(80), b"GET /x HTTP/1.1\r\nHost: unreachable.example\r\n\r\n");

        wait_for(|| sink.write_count() >= 2).await;

        let response = String::from_utf8(sink.written()).unwrap();
        assert!(response.starts_with("HTTP/1.1 502 Fetch Error\r\n"));
        assert!(response.contains("content-type: text/plain\r\n"));
        assert!(response.contains("http://unreachable.example/x"));
        assert!(response.contains("name resolution failed"));
    }

    #[tokio::test]
    async fn no_pipelining_after_a_completed_cycle() {
        let transport = StubTransport::ok();
        let gateway = FetchGateway::with_transport(GatewayConfig::default(), transport.clone());
        let sink = Arc::new(RecordingSink::default());

        gateway.on_tcp_connection(key(80), sink.clone());
        gateway.on_tcp_data(key(80), b"GET /one HTTP/1.1\r\nHost: example.com\r\n\r\n");
        wait_for(|| gateway.active_connections() == 0).await;

        let writes_after_first = sink.write_count();
        gateway.on_tcp_data(key(80), b"GET /two HTTP/1.1\r\nHost: example.com\r\n\r\n");
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(transport.requests().len(), 1);
        assert_eq!(sink.write_count(), writes_after_first);
    }

    #[tokio::test]
    async fn dispatched_connection_ignores_further_bytes() {
        let transport = StubTransport::slow(Duration::from_millis(50));
        let gateway = FetchGateway::with_transport(GatewayConfig::default(), transport.clone());
        let sink = Arc::new(RecordingSink::default());

        gateway.on_tcp_connection(key(80), sink.clone());
        gateway.on_tcp_data(key(80), b"GET /one HTTP/1.1\r\nHost: example.com\r\n\r\n");
        wait_for(|| !transport.requests().is_empty()).await;

        // still in flight; a second request on the same tuple must not start
        gateway.on_tcp_data(key(80), b"GET /two HTTP/1.1\r\nHost: example.com\r\n\r\n");
        wait_for(|| sink.write_count() >= 2).await;

        assert_eq!(transport.requests().len(), 1);
        assert_eq!(transport.requests()[0].0, "http://example.com/one");
    }

    #[tokio::test]
    async fn teardown_before_settle_tolerates_the_late_write() {
        let transport = StubTransport::slow(Duration::from_millis(200));
        let gateway = FetchGateway::with_transport(GatewayConfig::default(), transport.clone());
        let sink = Arc::new(RecordingSink::default());

        gateway.on_tcp_connection(key(80), sink.clone());
        gateway.on_tcp_data(key(80), b"GET /slow HTTP/1.1\r\nHost: example.com\r\n\r\n");
        wait_for(|| !transport.requests().is_empty()).await;

        gateway.on_tcp_teardown(key(80));
        sink.close();
        assert_eq!(gateway.active_connections(), 0);

        // the transport still settles and the write lands on a closed sink
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(sink.write_count(), 0);
    }

    #[tokio::test]
    async fn connections_dispatch_independently() {
        let transport = StubTransport::slow(Duration::from_millis(40));
        let gateway = FetchGateway::with_transport(GatewayConfig::default(), transport.clone());

        let slow_sink = Arc::new(RecordingSink::default());
        let slow_key = key(80);
        gateway.on_tcp_connection(slow_key, slow_sink.clone());
        gateway.on_tcp_data(slow_key, b"GET /slow HTTP/1.1\r\nHost: example.com\r\n\r\n");

        // a second connection on a different tuple keeps accepting data
        let other_key = FlowKey { src_port: 49153, ..slow_key };
        let other_sink = Arc::new(RecordingSink::default());
        gateway.on_tcp_connection(other_key, other_sink.clone());
        gateway.on_tcp_data(other_key, b"GET /other HTTP/1.1\r\nHost: example.com\r\n\r\n");

        wait_for(|| slow_sink.write_count() >= 2 && other_sink.write_count() >= 2).await;
        assert_eq!(transport.requests().len(), 2);
    }
}
