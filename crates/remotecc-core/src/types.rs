//! Wire message definitions
//!
//! Every frame exchanged with a controller device is a single JSON object
//! tagged by its `type` field.

use serde::{Deserialize, Serialize};

use crate::codec::{encode_modulation, encode_pitch_bend};
use crate::{MidiFrame, Result};

/// Messages sent by a controller device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Gesture values to translate and forward
    Control(ControlMessage),
    /// Keepalive, answered with `pong`
    Ping,
    /// Any other `type` value
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a text frame
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode to a text frame
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| crate::Error::EncodeError(e.to_string()))
    }
}

/// Normalized gesture values
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlMessage {
    /// Pitch-bend in `[-1.0, 1.0]`
    pub pitchbend: f64,
    /// Modulation in `[0.0, 1.0]`
    pub modulation: f64,
    /// Set by clients that stream values at a fixed rate; diagnostics only
    pub continuous: bool,
}

impl ControlMessage {
    pub fn new(pitchbend: f64, modulation: f64) -> Self {
        Self {
            pitchbend,
            modulation,
            continuous: false,
        }
    }

    /// Hardware frames for this message, in send order
    pub fn frames(&self) -> [MidiFrame; 2] {
        [
            MidiFrame::PitchBend(encode_pitch_bend(self.pitchbend)),
            MidiFrame::Modulation(encode_modulation(self.modulation)),
        ]
    }
}

/// Messages sent to a controller device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Point-in-time server status
    Status { data: StatusSnapshot },
    /// Reply to `ping`
    Pong,
    /// Sent to a connection right before the server closes it
    Disconnect { reason: String },
}

impl ServerMessage {
    /// Encode to a text frame
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| crate::Error::EncodeError(e.to_string()))
    }

    /// Parse a text frame
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Status snapshot reported to clients and to the command shell
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// An output port is open
    pub midi_connected: bool,
    /// Name of the open output port
    pub midi_port: Option<String>,
    /// Number of open connections
    pub clients_connected: usize,
    /// Active controller per origin, as `ip:port`
    pub active_clients: Vec<String>,
    /// Output ports known to the sink
    pub available_ports: Vec<String>,
}
