//! Server configuration
//!
//! Loaded from TOML; every key is optional.
//!
//! ```toml
//! listen = "0.0.0.0:8001"
//! midi_port = 1
//! auto_connect = true
//! debug = false
//! debug_interval_ms = 2000
//! disconnect_timeout_ms = 500
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, RouterError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// WebSocket listen address
    pub listen: String,
    /// Output port index to open at startup
    pub midi_port: Option<usize>,
    /// Output port name fragment to open at startup (used when `midi_port` is unset)
    pub midi_port_name: Option<String>,
    /// Open the single virtual MIDI port automatically when no port is given
    pub auto_connect: bool,
    /// Start with diagnostics enabled
    pub debug: bool,
    /// Minimum interval between throttled diagnostic lines
    pub debug_interval_ms: u64,
    /// Deadline for the disconnect notice sent to an evicted connection
    pub disconnect_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: format!("0.0.0.0:{}", remotecc_core::DEFAULT_WS_PORT),
            midi_port: None,
            midi_port_name: None,
            auto_connect: true,
            debug: false,
            debug_interval_ms: 2000,
            disconnect_timeout_ms: 500,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen.trim().is_empty() {
            return Err(RouterError::Config("listen address is empty".into()));
        }
        if self.debug_interval_ms == 0 {
            return Err(RouterError::Config("debug_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn debug_interval(&self) -> Duration {
        Duration::from_millis(self.debug_interval_ms)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }
}
