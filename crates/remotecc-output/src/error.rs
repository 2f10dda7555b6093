//! Output error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OutputError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    /// No output port is open
    #[error("no output port open")]
    SinkUnavailable,

    /// The port rejected the write
    #[error("output write failed: {0}")]
    SinkWriteFailure(String),

    /// Port index does not exist
    #[error("output port not found: {0}")]
    PortNotFound(usize),

    /// MIDI backend error (client creation, port connection)
    #[error("MIDI backend error: {0}")]
    Backend(String),
}
