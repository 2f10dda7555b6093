//! Codec tests for RemoteCC core

use remotecc_core::{
    codec, decode_modulation, decode_pitch_bend, encode_modulation, encode_pitch_bend,
    zeroing_frames, ControlMessage, MidiFrame,
};

const PITCH_STEP: f64 = 1.0 / 16383.0;

#[test]
fn test_pitch_bend_center_and_extremes() {
    assert_eq!(encode_pitch_bend(0.0), 8192);
    assert_eq!(encode_pitch_bend(1.0), 16383);
    assert_eq!(encode_pitch_bend(-1.0), 0);
}

#[test]
fn test_modulation_extremes() {
    assert_eq!(encode_modulation(0.0), 0);
    assert_eq!(encode_modulation(1.0), 127);
}

#[test]
fn test_pitch_bend_round_trip_within_one_step() {
    for i in 0..=2000 {
        let p = -1.0 + (i as f64) * 0.001;
        let recovered = decode_pitch_bend(encode_pitch_bend(p));
        assert!(
            (recovered - p).abs() <= PITCH_STEP + 1e-12,
            "p={} recovered={} diff={}",
            p,
            recovered,
            (recovered - p).abs()
        );
    }
}

#[test]
fn test_pitch_bend_monotonic() {
    let mut previous = encode_pitch_bend(-1.0);
    for i in 1..=4000 {
        let p = -1.0 + (i as f64) * 0.0005;
        let value = encode_pitch_bend(p);
        assert!(value >= previous, "not monotonic at p={}", p);
        previous = value;
    }
}

#[test]
fn test_modulation_round_trip() {
    for v in 0..=127u8 {
        assert_eq!(encode_modulation(decode_modulation(v)), v);
    }
}

#[test]
fn test_out_of_range_is_clamped() {
    assert_eq!(encode_pitch_bend(1.5), codec::PITCH_BEND_MAX);
    assert_eq!(encode_pitch_bend(-1.5), 0);
    assert_eq!(encode_modulation(2.0), codec::MODULATION_MAX);
    assert_eq!(encode_modulation(-1.0), 0);
}

#[test]
fn test_control_message_frames() {
    let frames = ControlMessage::new(0.0, 0.0).frames();
    assert_eq!(frames[0].to_bytes(), [0xE0, 0x00, 0x40]);
    assert_eq!(frames[1].to_bytes(), [0xB0, 0x01, 0x00]);

    let frames = ControlMessage::new(1.0, 1.0).frames();
    assert_eq!(frames[0].to_bytes(), [0xE0, 0x7F, 0x7F]);
    assert_eq!(frames[1].to_bytes(), [0xB0, 0x01, 0x7F]);

    let frames = ControlMessage::new(-1.0, 0.5).frames();
    assert_eq!(frames[0].to_bytes(), [0xE0, 0x00, 0x00]);
    assert_eq!(frames[1].to_bytes(), [0xB0, 0x01, 64]);
}

#[test]
fn test_zeroing_frames_match_neutral_control() {
    assert_eq!(zeroing_frames(), ControlMessage::new(0.0, 0.0).frames());
}

#[test]
fn test_frame_bytes_parse_back() {
    for frame in [
        MidiFrame::PitchBend(0),
        MidiFrame::PitchBend(8192),
        MidiFrame::PitchBend(12345),
        MidiFrame::Modulation(0),
        MidiFrame::Modulation(99),
    ] {
        assert_eq!(MidiFrame::from_bytes(&frame.to_bytes()).unwrap(), frame);
    }
}

#[test]
fn test_frame_describe() {
    assert_eq!(
        MidiFrame::PitchBend(16383).describe(),
        "pitch-bend +1.000 (MIDI 16383)"
    );
    assert_eq!(
        MidiFrame::Modulation(127).describe(),
        "modulation 1.000 (MIDI 127/127)"
    );
}
