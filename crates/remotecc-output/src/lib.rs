//! RemoteCC Output
//!
//! The hardware side of RemoteCC: an [`OutputSink`] accepts raw control
//! frames and forwards them to a MIDI output port. Sinks never retry; a
//! failed send is a dropped frame that the next control update replaces.

pub mod error;
pub mod ports;
pub mod sink;

#[cfg(feature = "midi")]
pub mod midi;

pub use error::{OutputError, Result};
pub use ports::{auto_select_port, find_port_by_name, is_virtual_port};
pub use sink::{NullSink, OutputSink};

#[cfg(feature = "midi")]
pub use midi::MidiOutputSink;
