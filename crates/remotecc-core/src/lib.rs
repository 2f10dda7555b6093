//! RemoteCC Core
//!
//! Core types and encoding primitives for RemoteCC.
//!
//! This crate provides:
//! - The control codec: normalized gesture values to quantized MIDI values ([`codec`])
//! - Hardware frames for pitch-bend and modulation ([`MidiFrame`])
//! - JSON wire messages exchanged with controller devices ([`ClientMessage`], [`ServerMessage`])

pub mod codec;
pub mod error;
pub mod frame;
pub mod types;

pub use codec::{
    decode_modulation, decode_pitch_bend, encode_modulation, encode_pitch_bend,
    neutral_modulation, neutral_pitch_bend,
};
pub use error::{Error, Result};
pub use frame::{zeroing_frames, MidiFrame};
pub use types::*;

/// MIDI channel used for all output (channel 1, zero-based nibble)
pub const MIDI_CHANNEL: u8 = 0;

/// Default WebSocket port for controller connections
pub const DEFAULT_WS_PORT: u16 = 8001;

/// Reason sent to a connection replaced by a newer device on the same origin
pub const SUPERSEDED_REASON: &str = "superseded by new device on same origin";
