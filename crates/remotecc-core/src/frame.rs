//! Hardware control frames
//!
//! Frame format (channel 1):
//!
//! ```text
//! Pitch-bend:       [0xE0, lsb, msb]   value in 0..=16383, neutral 8192
//! Modulation (CC1): [0xB0, 0x01, val]  value in 0..=127,   neutral 0
//! ```

use crate::codec::{
    decode_modulation, decode_pitch_bend, join_14bit, neutral_modulation, neutral_pitch_bend,
    split_14bit, MODULATION_MAX, PITCH_BEND_MAX,
};
use crate::{Error, Result, MIDI_CHANNEL};

/// Pitch-bend status byte (before channel)
pub const STATUS_PITCH_BEND: u8 = 0xE0;

/// Control change status byte (before channel)
pub const STATUS_CONTROL_CHANGE: u8 = 0xB0;

/// Modulation wheel controller number
pub const CC_MODULATION: u8 = 0x01;

/// A single control frame sent to the output sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiFrame {
    /// 14-bit pitch-bend
    PitchBend(u16),
    /// 7-bit modulation wheel (CC1)
    Modulation(u8),
}

impl MidiFrame {
    /// Encode to the 3-byte wire representation
    pub fn to_bytes(&self) -> [u8; 3] {
        match *self {
            MidiFrame::PitchBend(value) => {
                let (lsb, msb) = split_14bit(value.min(PITCH_BEND_MAX));
                [STATUS_PITCH_BEND | MIDI_CHANNEL, lsb, msb]
            }
            MidiFrame::Modulation(value) => [
                STATUS_CONTROL_CHANGE | MIDI_CHANNEL,
                CC_MODULATION,
                value.min(MODULATION_MAX),
            ],
        }
    }

    /// Parse a 3-byte frame. Only channel-1 pitch-bend and CC1 are recognized.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [status, lsb, msb] if *status == STATUS_PITCH_BEND | MIDI_CHANNEL => {
                Ok(MidiFrame::PitchBend(join_14bit(*lsb, *msb)))
            }
            [status, CC_MODULATION, value] if *status == STATUS_CONTROL_CHANGE | MIDI_CHANNEL => {
                Ok(MidiFrame::Modulation(*value & 0x7F))
            }
            _ => Err(Error::InvalidFrame(bytes.to_vec())),
        }
    }

    /// True for the neutral value of its control
    pub fn is_neutral(&self) -> bool {
        match *self {
            MidiFrame::PitchBend(value) => value == neutral_pitch_bend(),
            MidiFrame::Modulation(value) => value == neutral_modulation(),
        }
    }

    /// Human-readable form for diagnostics
    pub fn describe(&self) -> String {
        match *self {
            MidiFrame::PitchBend(value) => {
                format!("pitch-bend {:+.3} (MIDI {})", decode_pitch_bend(value), value)
            }
            MidiFrame::Modulation(value) => {
                format!("modulation {:.3} (MIDI {}/127)", decode_modulation(value), value)
            }
        }
    }
}

/// The neutral pitch-bend and modulation pair, in send order
pub fn zeroing_frames() -> [MidiFrame; 2] {
    [
        MidiFrame::PitchBend(neutral_pitch_bend()),
        MidiFrame::Modulation(neutral_modulation()),
    ]
}
