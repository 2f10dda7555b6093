//! RemoteCC Server
//!
//! Accepts controller devices over WebSocket and forwards their gestures to
//! a MIDI output as pitch-bend and modulation.

mod shell;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use remotecc_output::{auto_select_port, find_port_by_name, MidiOutputSink, NullSink, OutputSink};
use remotecc_router::{Server, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "remotecc-server")]
#[command(about = "Gesture controller to MIDI server")]
#[command(version)]
struct Cli {
    /// Listen address
    #[arg(short, long, env = "REMOTECC_LISTEN")]
    listen: Option<String>,

    /// Config file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// MIDI output port index to open at startup
    #[arg(short = 'p', long)]
    midi_port: Option<usize>,

    /// Open the first MIDI output port whose name contains this text
    #[arg(long)]
    midi_port_name: Option<String>,

    /// Do not auto-select a virtual MIDI port
    #[arg(long)]
    no_auto_connect: bool,

    /// Start with diagnostics enabled
    #[arg(short, long)]
    debug: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Run without the interactive command shell
    #[arg(long)]
    no_shell: bool,
}

impl Cli {
    /// Resolve the effective configuration: file values, then flags
    fn config(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(listen) = &self.listen {
            config.listen = listen.clone();
        }
        if let Some(index) = self.midi_port {
            config.midi_port = Some(index);
        }
        if let Some(name) = &self.midi_port_name {
            config.midi_port_name = Some(name.clone());
        }
        if self.no_auto_connect {
            config.auto_connect = false;
        }
        if self.debug {
            config.debug = true;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level, cli.json_logs)?;

    let config = cli.config()?;
    info!("Starting RemoteCC server");

    let sink = open_sink(&config);
    let server = Arc::new(Server::new(config, sink));

    println!("{}", "RemoteCC server".green().bold());
    println!("  {} ws://{}", "Listening:".bold(), server.config().listen);
    let status = server.arbiter().status();
    match status.midi_port {
        Some(port) => println!("  {} {}", "MIDI output:".bold(), port.cyan()),
        None => println!(
            "  {} {}",
            "MIDI output:".bold(),
            "none (use `connect <index>`)".yellow()
        ),
    }
    println!("  Type {} for commands", "help".cyan());

    let serving = Arc::clone(&server);
    let mut serve_task = tokio::spawn(async move { serving.serve().await });

    let shell_enabled = !cli.no_shell;
    let shell = async {
        if shell_enabled {
            shell::run(&server).await
        } else {
            std::future::pending().await
        }
    };

    tokio::select! {
        result = &mut serve_task => {
            result.context("Server task failed")?.context("Server failed")?;
        }
        result = shell => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
        }
    }

    server.stop();
    server.arbiter().close_port();
    info!("RemoteCC server stopped");
    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}

/// Build the MIDI sink and open the configured port.
///
/// A missing MIDI backend is not fatal: the server still runs and control
/// messages become no-ops.
fn open_sink(config: &ServerConfig) -> Box<dyn OutputSink> {
    let mut sink = match MidiOutputSink::new() {
        Ok(sink) => sink,
        Err(e) => {
            warn!("MIDI unavailable, running without output: {}", e);
            return Box::new(NullSink);
        }
    };

    let ports = sink.available_ports();
    if ports.is_empty() {
        warn!("No MIDI output ports found");
    }
    for (index, name) in ports.iter().enumerate() {
        info!("MIDI port {}: {}", index, name);
    }

    match select_port(config, &ports) {
        Some(index) => {
            if let Err(e) = sink.open(index) {
                warn!("Failed to open MIDI port {}: {}", index, e);
            }
        }
        None => info!("No MIDI port selected"),
    }

    Box::new(sink)
}

/// Port to open at startup: explicit index, then name match, then the
/// single virtual port if auto-connect is on.
fn select_port(config: &ServerConfig, ports: &[String]) -> Option<usize> {
    if let Some(index) = config.midi_port {
        return Some(index);
    }

    if let Some(name) = &config.midi_port_name {
        let found = find_port_by_name(ports, name);
        if found.is_none() {
            warn!("No MIDI port matches '{}'", name);
        }
        return found;
    }

    if config.auto_connect {
        let found = auto_select_port(ports);
        if let Some(index) = found {
            info!("Auto-selected virtual MIDI port: {}", ports[index]);
        }
        return found;
    }

    None
}
