//! Control Codec
//!
//! Converts normalized gesture values into quantized MIDI values and back.
//! Every output is derived from its input alone, so a lost or reordered
//! control message only ever affects its own sample.
//!
//! | Control | Input range | Output range | Neutral |
//! |---|---|---|---|
//! | Pitch-bend | `[-1.0, 1.0]` | `[0, 16383]` | `8192` |
//! | Modulation | `[0.0, 1.0]` | `[0, 127]` | `0` |

/// Largest 14-bit pitch-bend value
pub const PITCH_BEND_MAX: u16 = 16383;

/// Center of the pitch-bend range
pub const PITCH_BEND_CENTER: u16 = 8192;

/// Largest 7-bit controller value
pub const MODULATION_MAX: u8 = 127;

const PITCH_BEND_SCALE: f64 = 8191.5;

/// Encode a normalized pitch-bend value into the 14-bit range.
///
/// Input outside `[-1.0, 1.0]` is clamped. NaN maps to the neutral value.
pub fn encode_pitch_bend(normalized: f64) -> u16 {
    if normalized.is_nan() {
        return PITCH_BEND_CENTER;
    }
    let raw = ((normalized + 1.0) * PITCH_BEND_SCALE).round();
    raw.clamp(0.0, PITCH_BEND_MAX as f64) as u16
}

/// Encode a normalized modulation value into the 7-bit range.
///
/// Input outside `[0.0, 1.0]` is clamped. NaN maps to zero.
pub fn encode_modulation(normalized: f64) -> u8 {
    if normalized.is_nan() {
        return 0;
    }
    let raw = (normalized * MODULATION_MAX as f64).round();
    raw.clamp(0.0, MODULATION_MAX as f64) as u8
}

/// Pitch-bend value sent on every zeroing event
pub const fn neutral_pitch_bend() -> u16 {
    PITCH_BEND_CENTER
}

/// Modulation value sent on every zeroing event
pub const fn neutral_modulation() -> u8 {
    0
}

/// Decode a 14-bit pitch-bend value back into `[-1.0, 1.0]`.
pub fn decode_pitch_bend(value: u16) -> f64 {
    let value = value.min(PITCH_BEND_MAX);
    value as f64 / PITCH_BEND_SCALE - 1.0
}

/// Decode a 7-bit modulation value back into `[0.0, 1.0]`.
pub fn decode_modulation(value: u8) -> f64 {
    value.min(MODULATION_MAX) as f64 / MODULATION_MAX as f64
}

/// Split a 14-bit value into (lsb, msb) 7-bit bytes
pub fn split_14bit(value: u16) -> (u8, u8) {
    let lsb = (value & 0x7F) as u8;
    let msb = ((value >> 7) & 0x7F) as u8;
    (lsb, msb)
}

/// Join (lsb, msb) 7-bit bytes into a 14-bit value
pub fn join_14bit(lsb: u8, msb: u8) -> u16 {
    ((msb as u16 & 0x7F) << 7) | (lsb as u16 & 0x7F)
}
