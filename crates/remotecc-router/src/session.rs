//! Per-connection session loop

use remotecc_core::{ClientMessage, ServerMessage, SUPERSEDED_REASON};
use remotecc_transport::{TransportEvent, TransportReceiver};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::arbiter::{Arbiter, ControlOutcome};
use crate::connection::Connection;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Drives one connection from accept to close.
///
/// Exactly one session exists per connection; frames are handled in the
/// order they were received.
pub struct Session {
    connection: Arc<Connection>,
    arbiter: Arc<Arbiter>,
    disconnect_timeout: Duration,
    state: SessionState,
}

impl Session {
    pub fn new(connection: Arc<Connection>, arbiter: Arc<Arbiter>, disconnect_timeout: Duration) -> Self {
        Self {
            connection,
            arbiter,
            disconnect_timeout,
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Run until the peer goes away or the connection is closed locally
    pub async fn run<R: TransportReceiver>(mut self, mut receiver: R) -> SessionState {
        self.arbiter.connect(self.connection.clone());
        self.state = SessionState::Open;

        let status = ServerMessage::Status {
            data: self.arbiter.status(),
        };
        if let Err(e) = self.connection.send_message(&status).await {
            debug!("Failed to send status to {}: {}", self.connection.label(), e);
        }

        loop {
            let event = tokio::select! {
                _ = self.connection.closed() => break,
                event = receiver.recv() => event,
            };

            match event {
                Some(TransportEvent::Text(text)) => self.handle_text(&text).await,
                Some(TransportEvent::Binary(data)) => {
                    if self.arbiter.diagnostics().enabled() {
                        warn!(
                            "Ignoring {}-byte binary frame from {}",
                            data.len(),
                            self.connection.label()
                        );
                    }
                }
                Some(TransportEvent::Connected) => {}
                Some(TransportEvent::Error(e)) => {
                    debug!("Transport error from {}: {}", self.connection.label(), e);
                }
                Some(TransportEvent::Disconnected { reason }) => {
                    debug!("Client {} disconnected: {:?}", self.connection.label(), reason);
                    break;
                }
                None => break,
            }
        }

        self.state = SessionState::Closing;
        self.arbiter.disconnect(&self.connection);
        if !self.connection.is_superseded() {
            self.connection.close().await;
        }
        self.state = SessionState::Closed;
        self.state
    }

    async fn handle_text(&self, text: &str) {
        match ClientMessage::parse(text) {
            Ok(ClientMessage::Control(control)) => {
                match self.arbiter.control(&self.connection, &control) {
                    ControlOutcome::Elected {
                        evicted: Some(previous),
                    } => {
                        spawn_eviction(previous, self.disconnect_timeout);
                    }
                    ControlOutcome::Rejected(reason) => {
                        debug!(
                            "Control from {} rejected: {:?}",
                            self.connection.label(),
                            reason
                        );
                    }
                    _ => {}
                }
            }
            Ok(ClientMessage::Ping) => {
                if let Err(e) = self.connection.send_message(&ServerMessage::Pong).await {
                    debug!("Failed to send pong to {}: {}", self.connection.label(), e);
                }
            }
            Ok(ClientMessage::Unknown) => {
                if self.arbiter.diagnostics().enabled() {
                    warn!("Unknown message type from {}: {}", self.connection.label(), text);
                }
            }
            Err(e) => {
                if self.arbiter.diagnostics().enabled() {
                    warn!("{} from {}: {}", e, self.connection.label(), text);
                }
            }
        }
    }
}

/// Notify an evicted connection and close it.
///
/// The notice is best effort and bounded by `timeout`; the close happens
/// regardless of whether the notice was delivered.
pub fn spawn_eviction(connection: Arc<Connection>, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let notice = ServerMessage::Disconnect {
            reason: SUPERSEDED_REASON.to_string(),
        };

        match tokio::time::timeout(timeout, connection.send_message(&notice)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Disconnect notice to {} failed: {}", connection.label(), e),
            Err(_) => debug!("Disconnect notice to {} timed out", connection.label()),
        }

        connection.close().await;
    })
}
