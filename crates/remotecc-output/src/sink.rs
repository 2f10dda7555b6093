//! Output sink trait

use remotecc_core::MidiFrame;

use crate::{OutputError, Result};

/// A hardware control output.
///
/// `send` must not block on the device: callers invoke it while holding the
/// arbitration lock.
pub trait OutputSink: Send {
    /// Open the port at `port_index`, closing any port already open
    fn open(&mut self, port_index: usize) -> Result<()>;

    /// Close the open port, if any
    fn close(&mut self);

    /// Send raw bytes to the open port
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Whether a port is open
    fn is_open(&self) -> bool;

    /// Name of the open port
    fn port_name(&self) -> Option<String>;

    /// Names of the ports this sink can open, by index
    fn available_ports(&self) -> Vec<String>;

    /// Writes the device rejected after `send` already returned, counted
    /// since the previous call. Sinks that write synchronously report
    /// failures from `send` and keep the default.
    fn take_write_failures(&mut self) -> u64 {
        0
    }

    /// Send a single control frame
    fn send_frame(&mut self, frame: MidiFrame) -> Result<()> {
        self.send(&frame.to_bytes())
    }
}

/// Sink without a device. Never opens; every send reports `SinkUnavailable`.
#[derive(Debug, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn open(&mut self, port_index: usize) -> Result<()> {
        Err(OutputError::PortNotFound(port_index))
    }

    fn close(&mut self) {}

    fn send(&mut self, _bytes: &[u8]) -> Result<()> {
        Err(OutputError::SinkUnavailable)
    }

    fn is_open(&self) -> bool {
        false
    }

    fn port_name(&self) -> Option<String> {
        None
    }

    fn available_ports(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<T: OutputSink + ?Sized> OutputSink for Box<T> {
    fn open(&mut self, port_index: usize) -> Result<()> {
        (**self).open(port_index)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn port_name(&self) -> Option<String> {
        (**self).port_name()
    }

    fn available_ports(&self) -> Vec<String> {
        (**self).available_ports()
    }

    fn take_write_failures(&mut self) -> u64 {
        (**self).take_write_failures()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sink() {
        let mut sink = NullSink;
        assert!(!sink.is_open());
        assert_eq!(sink.open(0), Err(OutputError::PortNotFound(0)));
        assert_eq!(
            sink.send_frame(MidiFrame::Modulation(1)),
            Err(OutputError::SinkUnavailable)
        );
        assert!(sink.available_ports().is_empty());
    }
}
