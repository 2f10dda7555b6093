//! MIDI output sink

use midir::MidiOutput;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use crate::{OutputError, OutputSink, Result};

const DEFAULT_CLIENT_NAME: &str = "RemoteCC";

/// Connected output port, owned by a dedicated thread
struct OutputWorker {
    port_index: usize,
    port_name: String,
    tx: Option<mpsc::Sender<Vec<u8>>>,
    thread: Option<JoinHandle<()>>,
    /// Writes the device rejected, not yet reported
    failures: Arc<AtomicU64>,
}

impl OutputWorker {
    /// Open `port_index` on a new thread. Returns once the port is connected
    /// or the connection failed.
    fn spawn(client_name: &str, port_index: usize) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<String>>(1);
        let client_name = client_name.to_string();
        let failures = Arc::new(AtomicU64::new(0));
        let thread_failures = failures.clone();

        let thread = std::thread::Builder::new()
            .name("remotecc-midi-out".to_string())
            .spawn(move || {
                let midi_out = match MidiOutput::new(&client_name) {
                    Ok(m) => m,
                    Err(e) => {
                        let _ = ready_tx.send(Err(OutputError::Backend(e.to_string())));
                        return;
                    }
                };

                let ports = midi_out.ports();
                let port = match ports.get(port_index) {
                    Some(p) => p,
                    None => {
                        let _ = ready_tx.send(Err(OutputError::PortNotFound(port_index)));
                        return;
                    }
                };

                let port_name = midi_out
                    .port_name(port)
                    .unwrap_or_else(|_| "Unknown".to_string());

                let mut conn = match midi_out.connect(port, "remotecc-output") {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = ready_tx.send(Err(OutputError::Backend(e.to_string())));
                        return;
                    }
                };

                let _ = ready_tx.send(Ok(port_name));

                // Runs until the sink drops its sender
                while let Ok(data) = rx.recv() {
                    if let Err(e) = conn.send(&data) {
                        thread_failures.fetch_add(1, Ordering::Relaxed);
                        debug!("MIDI send error: {}", e);
                    }
                }

                let _ = conn.close();
                debug!("MIDI output thread exiting");
            })
            .map_err(|e| OutputError::Backend(e.to_string()))?;

        let port_name = match ready_rx.recv() {
            Ok(Ok(name)) => name,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(OutputError::Backend("MIDI output thread exited".to_string()));
            }
        };

        Ok(Self {
            port_index,
            port_name,
            tx: Some(tx),
            thread: Some(thread),
            failures,
        })
    }
}

impl Drop for OutputWorker {
    fn drop(&mut self) {
        // Dropping the sender ends the thread's receive loop
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Output sink backed by a `midir` output port.
///
/// The port connection lives on its own thread; `send` only pushes the frame
/// onto that thread's queue and never waits for the device.
pub struct MidiOutputSink {
    client_name: String,
    ports: Vec<String>,
    worker: Option<OutputWorker>,
}

impl MidiOutputSink {
    pub fn new() -> Result<Self> {
        Self::with_client_name(DEFAULT_CLIENT_NAME)
    }

    pub fn with_client_name(client_name: &str) -> Result<Self> {
        let mut sink = Self {
            client_name: client_name.to_string(),
            ports: Vec::new(),
            worker: None,
        };
        sink.refresh_ports()?;
        Ok(sink)
    }

    /// List available MIDI output ports
    pub fn list_output_ports(client_name: &str) -> Result<Vec<String>> {
        let midi_out =
            MidiOutput::new(client_name).map_err(|e| OutputError::Backend(e.to_string()))?;

        let ports = midi_out.ports();
        Ok(ports
            .iter()
            .filter_map(|p| midi_out.port_name(p).ok())
            .collect())
    }

    /// Re-enumerate output ports
    pub fn refresh_ports(&mut self) -> Result<()> {
        self.ports = Self::list_output_ports(&format!("{} Scanner", self.client_name))?;
        Ok(())
    }

    /// Index of the open port
    pub fn port_index(&self) -> Option<usize> {
        self.worker.as_ref().map(|w| w.port_index)
    }
}

impl OutputSink for MidiOutputSink {
    fn open(&mut self, port_index: usize) -> Result<()> {
        self.close();
        if let Err(e) = self.refresh_ports() {
            warn!("Failed to enumerate MIDI ports: {}", e);
        }

        let worker = OutputWorker::spawn(&self.client_name, port_index)?;
        info!("Opened MIDI output: {}", worker.port_name);
        self.worker = Some(worker);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            info!("Closing MIDI output: {}", worker.port_name);
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let worker = self.worker.as_ref().ok_or(OutputError::SinkUnavailable)?;
        let tx = worker.tx.as_ref().ok_or(OutputError::SinkUnavailable)?;
        tx.send(bytes.to_vec())
            .map_err(|e| OutputError::SinkWriteFailure(e.to_string()))
    }

    fn is_open(&self) -> bool {
        self.worker.is_some()
    }

    fn port_name(&self) -> Option<String> {
        self.worker.as_ref().map(|w| w.port_name.clone())
    }

    fn available_ports(&self) -> Vec<String> {
        self.ports.clone()
    }

    fn take_write_failures(&mut self) -> u64 {
        self.worker
            .as_ref()
            .map(|w| w.failures.swap(0, Ordering::Relaxed))
            .unwrap_or(0)
    }
}
