//! RemoteCC Transport Layer
//!
//! Transport-agnostic traits for accepting controller connections plus the
//! WebSocket implementation used by phone and browser clients. Frames are
//! UTF-8 text carrying one JSON object each.

pub mod error;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use error::{Result, TransportError};
pub use traits::{Transport, TransportEvent, TransportReceiver, TransportSender, TransportServer};

#[cfg(feature = "websocket")]
pub use websocket::{
    WebSocketConfig, WebSocketReceiver, WebSocketSender, WebSocketServer, WebSocketTransport,
};
