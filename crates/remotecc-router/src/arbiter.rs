//! Arbitration protocol
//!
//! The [`Arbiter`] owns the client registry, the output sink and the last
//! values written to it, all behind one mutex. Every election, control
//! update and eviction takes that lock, which gives a single global order
//! and guarantees at most one writer to the output at any instant.
//!
//! Transitions:
//!
//! | Event | Registry | Output |
//! |---|---|---|
//! | control from active connection | - | pitch-bend + modulation |
//! | control from non-active connection | elect, evict previous holder | zero, then pitch-bend + modulation |
//! | control from superseded connection | - | rejected |
//! | active connection disconnects | clear origin entry | zero |
//! | other connection disconnects | remove | - |
//!
//! No `.await` happens while the lock is held; sink writes are
//! non-blocking queue pushes. Opening a device can block, so a new sink is
//! opened by the caller and swapped in with [`Arbiter::replace_sink`].

use parking_lot::Mutex;
use remotecc_core::{
    codec::{neutral_modulation, neutral_pitch_bend},
    zeroing_frames, ControlMessage, MidiFrame, StatusSnapshot,
};
use remotecc_output::OutputSink;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::diagnostics::Diagnostics;
use crate::registry::{ClientRegistry, RegistrySnapshot};

/// Last values accepted by the output sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputState {
    pub pitch_bend: u16,
    pub modulation: u8,
}

impl Default for OutputState {
    fn default() -> Self {
        Self {
            pitch_bend: neutral_pitch_bend(),
            modulation: neutral_modulation(),
        }
    }
}

impl OutputState {
    fn record(&mut self, frame: MidiFrame) {
        match frame {
            MidiFrame::PitchBend(value) => self.pitch_bend = value,
            MidiFrame::Modulation(value) => self.modulation = value,
        }
    }
}

/// Why a control message was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A newer device on the same origin took over this connection's role
    Superseded,
    /// The connection is closing or was never registered
    NotRegistered,
}

/// Result of handling a control message
#[derive(Debug)]
pub enum ControlOutcome {
    /// Sender was already active; values forwarded
    Applied,
    /// Sender became active. `evicted` is the previous holder for its origin,
    /// which the caller must notify and close.
    Elected { evicted: Option<Arc<Connection>> },
    /// Nothing reached the output
    Rejected(RejectReason),
}

struct ArbiterState {
    registry: ClientRegistry,
    sink: Box<dyn OutputSink>,
    output: OutputState,
    /// False once the device rejected a write; the hardware may then hold
    /// values other than `output`
    output_known: bool,
}

impl ArbiterState {
    /// Send one pitch-bend + modulation pair
    fn write(&mut self, frames: [MidiFrame; 2], diagnostics: &Diagnostics) {
        if !self.sink.is_open() {
            return;
        }

        let mut accepted = true;
        for frame in frames {
            match self.sink.send_frame(frame) {
                Ok(()) => self.output.record(frame),
                Err(e) => {
                    accepted = false;
                    if diagnostics.should_report_failure() {
                        warn!("Dropped {}: {}", frame.describe(), e);
                    }
                }
            }
        }

        let rejected = self.sink.take_write_failures();
        if rejected > 0 {
            self.output_known = false;
            if diagnostics.should_report_failure() {
                warn!("Output device rejected {} frame(s)", rejected);
            }
        } else if accepted {
            self.output_known = true;
        }
    }

    fn zero(&mut self, diagnostics: &Diagnostics) {
        self.write(zeroing_frames(), diagnostics);
    }

    fn apply(&mut self, control: &ControlMessage, diagnostics: &Diagnostics) {
        self.write(control.frames(), diagnostics);
    }
}

/// Single serialization point for arbitration and output
pub struct Arbiter {
    state: Mutex<ArbiterState>,
    diagnostics: Diagnostics,
}

impl Arbiter {
    pub fn new(sink: Box<dyn OutputSink>, diagnostics: Diagnostics) -> Self {
        Self {
            state: Mutex::new(ArbiterState {
                registry: ClientRegistry::new(),
                sink,
                output: OutputState::default(),
                output_known: true,
            }),
            diagnostics,
        }
    }

    /// Register a newly opened connection
    pub fn connect(&self, connection: Arc<Connection>) {
        let mut state = self.state.lock();
        let label = connection.label();
        state.registry.register(connection);
        info!(
            "Client connected: {} (total: {})",
            label,
            state.registry.connected_count()
        );
    }

    /// Handle a control message from `connection`.
    ///
    /// Elects the sender when it is not yet active for its origin, zeroing
    /// the output before its first values are forwarded.
    pub fn control(&self, connection: &Arc<Connection>, control: &ControlMessage) -> ControlOutcome {
        let mut state = self.state.lock();

        if connection.is_superseded() {
            debug!("Rejected control from superseded connection {}", connection.label());
            return ControlOutcome::Rejected(RejectReason::Superseded);
        }
        if connection.close_requested() || !state.registry.contains(connection) {
            debug!("Rejected control from closed connection {}", connection.label());
            return ControlOutcome::Rejected(RejectReason::NotRegistered);
        }

        let outcome = if state.registry.is_active(connection) {
            ControlOutcome::Applied
        } else {
            let evicted = state.registry.elect(connection.clone());
            if let Some(previous) = &evicted {
                previous.mark_superseded();
                info!(
                    "Evicting {}: superseded by {} on the same origin",
                    previous.label(),
                    connection.label()
                );
            }
            info!("Active controller: {}", connection.label());

            state.zero(&self.diagnostics);
            if self.diagnostics.enabled() {
                info!("Output zeroed for new controller {}", connection.label());
            }

            ControlOutcome::Elected { evicted }
        };

        state.apply(control, &self.diagnostics);
        self.report(&state.output, control);

        outcome
    }

    /// Remove a closed connection. Returns true if it was the active
    /// controller for its origin, in which case the output was zeroed.
    pub fn disconnect(&self, connection: &Connection) -> bool {
        let mut state = self.state.lock();
        let removed = state.registry.unregister(connection);

        if removed.was_active {
            state.zero(&self.diagnostics);
            info!("Active client disconnected: {}", connection.origin());
            if self.diagnostics.enabled() {
                info!("Output zeroed after {} left", connection.label());
            }
        } else {
            info!("Client disconnected: {}", connection.label());
        }

        info!("Remaining connections: {}", state.registry.connected_count());
        removed.was_active
    }

    /// Whether `connection` currently drives the output for its origin
    pub fn is_active(&self, connection: &Connection) -> bool {
        self.state.lock().registry.is_active(connection)
    }

    /// Consistent status view
    pub fn status(&self) -> StatusSnapshot {
        let state = self.state.lock();
        let RegistrySnapshot {
            connected_count,
            active_list,
        } = state.registry.snapshot();

        StatusSnapshot {
            midi_connected: state.sink.is_open(),
            midi_port: state.sink.port_name(),
            clients_connected: connected_count,
            active_clients: active_list,
            available_ports: state.sink.available_ports(),
        }
    }

    pub fn registry_snapshot(&self) -> RegistrySnapshot {
        self.state.lock().registry.snapshot()
    }

    pub fn connection_count(&self) -> usize {
        self.state.lock().registry.connected_count()
    }

    /// Last values written to the output.
    ///
    /// `None` after the device rejected a write or the sink was replaced,
    /// until a later pair of frames goes through cleanly.
    pub fn output_state(&self) -> Option<OutputState> {
        let state = self.state.lock();
        state.output_known.then_some(state.output)
    }

    /// Swap in another sink, returning the previous one.
    ///
    /// Open the new sink before calling this and drop the returned one
    /// afterwards; neither happens under the arbitration lock.
    pub fn replace_sink(&self, sink: Box<dyn OutputSink>) -> Box<dyn OutputSink> {
        let mut state = self.state.lock();
        state.output_known = false;
        let previous = std::mem::replace(&mut state.sink, sink);
        info!(
            "Output switched to {}",
            state.sink.port_name().as_deref().unwrap_or("no port")
        );
        previous
    }

    pub fn close_port(&self) {
        self.state.lock().sink.close();
    }

    pub fn available_ports(&self) -> Vec<String> {
        self.state.lock().sink.available_ports()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// One throttled line per interval in debug mode
    fn report(&self, output: &OutputState, control: &ControlMessage) {
        if self.diagnostics.should_emit() {
            info!(
                "{} | {}{}",
                MidiFrame::PitchBend(output.pitch_bend).describe(),
                MidiFrame::Modulation(output.modulation).describe(),
                if control.continuous { " (continuous)" } else { "" }
            );
        }
    }
}
