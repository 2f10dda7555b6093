//! Error types for RemoteCC

use thiserror::Error;

/// Result type alias for RemoteCC core operations
pub type Result<T> = std::result::Result<T, Error>;

/// RemoteCC core error types
#[derive(Error, Debug)]
pub enum Error {
    /// Inbound frame is not valid JSON or is missing required fields
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Outbound message could not be serialized
    #[error("encode error: {0}")]
    EncodeError(String),

    /// Byte sequence is not a supported MIDI frame
    #[error("invalid MIDI frame: {0:02x?}")]
    InvalidFrame(Vec<u8>),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::MalformedMessage(e.to_string())
    }
}
