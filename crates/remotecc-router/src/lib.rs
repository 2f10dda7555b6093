//! RemoteCC Router
//!
//! The router is the arbitration hub between controller devices and the
//! MIDI output:
//! - Tracks every open connection
//! - Elects one active controller per origin (IP address)
//! - Evicts the previous controller when a new device on the same origin takes over
//! - Translates control messages into pitch-bend and modulation frames
//! - Zeroes the output on every ownership change
//!
//! All arbitration runs under a single lock in [`Arbiter`], so elections,
//! control updates and evictions happen in one global order.
//!
//! # Example
//!
//! ```no_run
//! use remotecc_output::NullSink;
//! use remotecc_router::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new(ServerConfig::default(), Box::new(NullSink));
//!     server.serve_websocket("0.0.0.0:8001").await?;
//!     Ok(())
//! }
//! ```

pub mod arbiter;
pub mod config;
pub mod connection;
pub mod diagnostics;
pub mod error;
pub mod registry;
pub mod server;
pub mod session;

pub use arbiter::{Arbiter, ControlOutcome, OutputState, RejectReason};
pub use config::ServerConfig;
pub use connection::{Connection, ConnectionId};
pub use diagnostics::{DebugThrottle, Diagnostics};
pub use error::{Result, RouterError};
pub use registry::{ClientRegistry, RegistrySnapshot, Unregistered};
pub use server::Server;
pub use session::{spawn_eviction, Session, SessionState};
