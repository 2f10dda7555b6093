//! Server accept loop
//!
//! The server is transport-agnostic: it accepts connections from any
//! `TransportServer` and runs one [`Session`] task per connection, all
//! sharing one [`Arbiter`].

use parking_lot::RwLock;
use remotecc_output::OutputSink;
use remotecc_transport::{TransportReceiver, TransportSender, TransportServer};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info};

#[cfg(feature = "websocket")]
use remotecc_transport::WebSocketServer;

use crate::{
    arbiter::Arbiter, config::ServerConfig, connection::Connection, diagnostics::Diagnostics,
    error::Result, session::Session,
};

pub struct Server {
    config: ServerConfig,
    arbiter: Arc<Arbiter>,
    running: Arc<RwLock<bool>>,
    shutdown: Arc<Notify>,
}

impl Server {
    pub fn new(config: ServerConfig, sink: Box<dyn OutputSink>) -> Self {
        let diagnostics = Diagnostics::new(config.debug, config.debug_interval());
        let arbiter = Arc::new(Arbiter::new(sink, diagnostics));
        Self::with_arbiter(config, arbiter)
    }

    /// Build a server around an existing arbiter
    pub fn with_arbiter(config: ServerConfig, arbiter: Arc<Arbiter>) -> Self {
        Self {
            config,
            arbiter,
            running: Arc::new(RwLock::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Serve using any TransportServer implementation.
    pub async fn serve_on<S>(&self, mut server: S) -> Result<()>
    where
        S: TransportServer + 'static,
        S::Sender: 'static,
        S::Receiver: 'static,
    {
        info!("Server accepting connections");
        *self.running.write() = true;

        while *self.running.read() {
            let accepted = tokio::select! {
                _ = self.shutdown.notified() => break,
                accepted = server.accept() => accepted,
            };

            match accepted {
                Ok((sender, receiver, addr)) => {
                    self.handle_connection(Arc::new(sender), receiver, addr);
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }

        info!("Server stopped accepting connections");
        Ok(())
    }

    /// Start the server on WebSocket
    #[cfg(feature = "websocket")]
    pub async fn serve_websocket(&self, addr: &str) -> Result<()> {
        let server = WebSocketServer::bind(addr).await?;
        self.serve_on(server).await
    }

    /// Start the server on the configured listen address
    #[cfg(feature = "websocket")]
    pub async fn serve(&self) -> Result<()> {
        let addr = self.config.listen.clone();
        self.serve_websocket(&addr).await
    }

    fn handle_connection(
        &self,
        sender: Arc<dyn TransportSender>,
        receiver: impl TransportReceiver + 'static,
        addr: SocketAddr,
    ) {
        let connection = Arc::new(Connection::new(sender, addr));
        let session = Session::new(
            connection,
            Arc::clone(&self.arbiter),
            self.config.disconnect_timeout(),
        );

        tokio::spawn(async move {
            session.run(receiver).await;
        });
    }

    /// Stop accepting new connections. Open sessions keep running.
    pub fn stop(&self) {
        *self.running.write() = false;
        self.shutdown.notify_one();
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    pub fn arbiter(&self) -> &Arc<Arbiter> {
        &self.arbiter
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn connection_count(&self) -> usize {
        self.arbiter.connection_count()
    }
}
