//! Common test helpers for RemoteCC tests
//!
//! This crate provides:
//! - Condition-based waiting (no hardcoded sleeps)
//! - A recording output sink for asserting exact frame sequences
//! - Mock transport senders for driving the arbiter without sockets
//! - A test server and client with proper cleanup on drop

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use remotecc_core::{ClientMessage, ControlMessage, MidiFrame, ServerMessage};
use remotecc_output::{OutputError, OutputSink};
use remotecc_router::{Arbiter, Connection, Server, ServerConfig};
use remotecc_transport::{
    Transport, TransportError, TransportEvent, TransportReceiver, TransportSender,
    WebSocketReceiver, WebSocketSender, WebSocketTransport,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Port Allocation
// ============================================================================

/// Find an available TCP port for testing
pub async fn find_available_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based
pub async fn wait_for<F, Fut>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Wait for a synchronous predicate
pub async fn wait_until<F>(check: F, max_wait: Duration) -> bool
where
    F: Fn() -> bool,
{
    let check = &check;
    wait_for(move || async move { check() }, DEFAULT_CHECK_INTERVAL, max_wait).await
}

// ============================================================================
// Recording Sink
// ============================================================================

/// Output sink that records every frame it accepts.
///
/// Clones share the same log, so a test can keep one handle while the
/// arbiter owns another.
#[derive(Clone)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<[u8; 3]>>>,
    open: Arc<AtomicBool>,
    failing: Arc<AtomicBool>,
    device_failures: Arc<AtomicU64>,
    ports: Vec<String>,
}

impl RecordingSink {
    /// A sink with one open port named "Test Port"
    pub fn new() -> Self {
        Self {
            frames: Arc::new(Mutex::new(Vec::new())),
            open: Arc::new(AtomicBool::new(true)),
            failing: Arc::new(AtomicBool::new(false)),
            device_failures: Arc::new(AtomicU64::new(0)),
            ports: vec!["Test Port".to_string()],
        }
    }

    /// A sink with no open port
    pub fn closed() -> Self {
        let sink = Self::new();
        sink.open.store(false, Ordering::SeqCst);
        sink
    }

    /// Make every subsequent send fail with a write error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Report `n` writes as rejected by the device after they were accepted
    pub fn reject_on_device(&self, n: u64) {
        self.device_failures.fetch_add(n, Ordering::SeqCst);
    }

    /// Every accepted frame, as raw bytes
    pub fn frames(&self) -> Vec<[u8; 3]> {
        self.frames.lock().clone()
    }

    /// Every accepted frame, decoded
    pub fn decoded(&self) -> Vec<MidiFrame> {
        self.frames()
            .iter()
            .map(|bytes| MidiFrame::from_bytes(bytes).unwrap())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn clear(&self) {
        self.frames.lock().clear();
    }

    /// Wait until at least `n` frames were recorded
    pub async fn wait_for_count(&self, n: usize, max_wait: Duration) -> bool {
        wait_until(|| self.count() >= n, max_wait).await
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for RecordingSink {
    fn open(&mut self, port_index: usize) -> remotecc_output::Result<()> {
        if port_index >= self.ports.len() {
            return Err(OutputError::PortNotFound(port_index));
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn send(&mut self, bytes: &[u8]) -> remotecc_output::Result<()> {
        if !self.is_open() {
            return Err(OutputError::SinkUnavailable);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(OutputError::SinkWriteFailure("injected failure".into()));
        }
        let frame: [u8; 3] = bytes
            .try_into()
            .map_err(|_| OutputError::SinkWriteFailure(format!("bad frame {:?}", bytes)))?;
        self.frames.lock().push(frame);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn port_name(&self) -> Option<String> {
        if self.is_open() {
            self.ports.first().cloned()
        } else {
            None
        }
    }

    fn available_ports(&self) -> Vec<String> {
        self.ports.clone()
    }

    fn take_write_failures(&mut self) -> u64 {
        self.device_failures.swap(0, Ordering::SeqCst)
    }
}

// ============================================================================
// Mock Transport
// ============================================================================

/// Transport sender that records outgoing text frames
#[derive(Default)]
pub struct MockSender {
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MockSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every text frame sent so far, decoded
    pub fn messages(&self) -> Vec<ServerMessage> {
        self.sent
            .lock()
            .iter()
            .map(|text| ServerMessage::parse(text).unwrap())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportSender for MockSender {
    async fn send(&self, text: String) -> remotecc_transport::Result<()> {
        if self.is_closed() {
            return Err(TransportError::NotConnected);
        }
        self.sent.lock().push(text);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.is_closed()
    }

    async fn close(&self) -> remotecc_transport::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Build a connection from `addr` backed by a [`MockSender`]
pub fn test_connection(addr: &str) -> (Arc<Connection>, Arc<MockSender>) {
    let sender = Arc::new(MockSender::new());
    let addr: SocketAddr = addr.parse().unwrap();
    let connection = Arc::new(Connection::new(sender.clone(), addr));
    (connection, sender)
}

// ============================================================================
// Test Server - RAII wrapper with proper cleanup
// ============================================================================

/// A WebSocket server on a free local port, stopped on drop
pub struct TestServer {
    port: u16,
    server: Arc<Server>,
    sink: RecordingSink,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Start a test server with default configuration
    pub async fn start() -> Self {
        Self::start_with_config(ServerConfig::default()).await
    }

    /// Start a test server with custom configuration. `listen` is replaced
    /// with a free local port.
    pub async fn start_with_config(mut config: ServerConfig) -> Self {
        let port = find_available_port().await;
        let addr = format!("127.0.0.1:{}", port);
        config.listen = addr.clone();

        let sink = RecordingSink::new();
        let server = Arc::new(Server::new(config, Box::new(sink.clone())));

        let serving = Arc::clone(&server);
        let handle = tokio::spawn(async move {
            let _ = serving.serve_websocket(&addr).await;
        });

        let _ = wait_for(
            || async move {
                tokio::net::TcpStream::connect(format!("127.0.0.1:{}", port))
                    .await
                    .is_ok()
            },
            DEFAULT_CHECK_INTERVAL,
            DEFAULT_TIMEOUT,
        )
        .await;

        Self {
            port,
            server,
            sink,
            handle: Some(handle),
        }
    }

    /// WebSocket URL for this server
    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn arbiter(&self) -> &Arc<Arbiter> {
        self.server.arbiter()
    }

    /// Handle on the frames written to the output
    pub fn sink(&self) -> &RecordingSink {
        &self.sink
    }

    /// Connect a client and consume its initial status message
    pub async fn connect_client(&self) -> TestClient {
        let mut client = TestClient::connect(&self.url()).await;
        match client.recv().await {
            Some(ServerMessage::Status { .. }) => {}
            other => panic!("expected initial status, got {:?}", other),
        }
        client
    }

    /// Wait until the server has `n` open connections
    pub async fn wait_for_connections(&self, n: usize) -> bool {
        wait_until(|| self.server.connection_count() == n, DEFAULT_TIMEOUT).await
    }

    /// Stop the server explicitly (also happens on drop)
    pub fn stop(&mut self) {
        self.server.stop();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Test Client
// ============================================================================

/// Minimal controller device speaking the JSON protocol
pub struct TestClient {
    sender: WebSocketSender,
    receiver: WebSocketReceiver,
}

impl TestClient {
    pub async fn connect(url: &str) -> Self {
        let (sender, receiver) = WebSocketTransport::connect(url).await.unwrap();
        Self { sender, receiver }
    }

    /// Send a raw text frame
    pub async fn send_text(&self, text: &str) {
        self.sender.send(text.to_string()).await.unwrap();
    }

    /// Send a raw binary frame
    pub async fn send_binary(&self, data: &[u8]) {
        self.sender
            .send_binary(Bytes::copy_from_slice(data))
            .await
            .unwrap();
    }

    pub async fn send(&self, message: &ClientMessage) {
        self.send_text(&message.encode().unwrap()).await;
    }

    pub async fn send_control(&self, pitchbend: f64, modulation: f64) {
        self.send(&ClientMessage::Control(ControlMessage::new(pitchbend, modulation)))
            .await;
    }

    pub async fn ping(&self) {
        self.send(&ClientMessage::Ping).await;
    }

    /// Next server message, or `None` on close or timeout
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.recv_timeout(DEFAULT_TIMEOUT).await
    }

    pub async fn recv_timeout(&mut self, max_wait: Duration) -> Option<ServerMessage> {
        let deadline = Instant::now() + max_wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, self.receiver.recv()).await {
                Ok(Some(TransportEvent::Text(text))) => return ServerMessage::parse(&text).ok(),
                Ok(Some(TransportEvent::Disconnected { .. })) | Ok(None) | Err(_) => return None,
                Ok(Some(_)) => continue,
            }
        }
    }

    /// Wait until the server closes this connection, skipping any messages
    pub async fn wait_closed(&mut self, max_wait: Duration) -> bool {
        let deadline = Instant::now() + max_wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, self.receiver.recv()).await {
                Ok(Some(TransportEvent::Disconnected { .. })) | Ok(None) => return true,
                Ok(Some(_)) => continue,
                Err(_) => return false,
            }
        }
    }

    pub async fn close(&self) {
        let _ = self.sender.close().await;
    }
}
