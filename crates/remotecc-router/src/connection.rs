//! Connection handles

use remotecc_core::ServerMessage;
use remotecc_transport::TransportSender;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{Result, RouterError};

/// Connection identifier
pub type ConnectionId = Uuid;

/// One connected controller device.
///
/// Owned by its session loop; the registry only holds shared references.
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Peer address; the IP part is the origin identity
    pub addr: SocketAddr,
    /// Connection creation time
    pub created_at: Instant,
    sender: Arc<dyn TransportSender>,
    close_tx: watch::Sender<bool>,
    superseded: AtomicBool,
}

impl Connection {
    pub fn new(sender: Arc<dyn TransportSender>, addr: SocketAddr) -> Self {
        let (close_tx, _) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            addr,
            created_at: Instant::now(),
            sender,
            close_tx,
            superseded: AtomicBool::new(false),
        }
    }

    /// Origin identity used for arbitration
    pub fn origin(&self) -> IpAddr {
        self.addr.ip()
    }

    /// `ip:port` label used in status reports and logs
    pub fn label(&self) -> String {
        self.addr.to_string()
    }

    /// Send a message to the peer
    pub async fn send_message(&self, message: &ServerMessage) -> Result<()> {
        let text = message.encode()?;
        self.sender
            .send(text)
            .await
            .map_err(|e| RouterError::ConnectionLost(e.to_string()))
    }

    /// Signal the session loop to stop. Does not touch the transport.
    pub fn request_close(&self) {
        self.close_tx.send_replace(true);
    }

    /// Stop the session loop and close the transport
    pub async fn close(&self) {
        self.request_close();
        let _ = self.sender.close().await;
    }

    /// Whether a close has been requested
    pub fn close_requested(&self) -> bool {
        *self.close_tx.borrow()
    }

    /// Resolves once a close has been requested
    pub async fn closed(&self) {
        let mut rx = self.close_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Whether the connection can still exchange frames
    pub fn is_open(&self) -> bool {
        !self.close_requested() && self.sender.is_connected()
    }

    /// Mark as replaced by a newer device on the same origin. Permanent.
    pub(crate) fn mark_superseded(&self) {
        self.superseded.store(true, Ordering::SeqCst);
    }

    /// Whether a newer device on the same origin replaced this connection
    pub fn is_superseded(&self) -> bool {
        self.superseded.load(Ordering::SeqCst)
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("superseded", &self.is_superseded())
            .field("close_requested", &self.close_requested())
            .finish()
    }
}
