//! Interactive command shell on stdin

use anyhow::Result;
use colored::Colorize;
use remotecc_output::{is_virtual_port, MidiOutputSink, OutputSink};
use remotecc_router::Server;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

const SCANNER_CLIENT_NAME: &str = "RemoteCC Scanner";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Debug,
    Ports,
    Connect(usize),
    Quit,
    Invalid(String),
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let name = words.next()?.to_lowercase();

        let command = match name.as_str() {
            "help" | "h" => Command::Help,
            "status" | "s" => Command::Status,
            "debug" | "d" => Command::Debug,
            "ports" | "p" => Command::Ports,
            "quit" | "q" | "exit" => Command::Quit,
            "connect" | "c" => match words.next().map(str::parse::<usize>) {
                Some(Ok(index)) => Command::Connect(index),
                Some(Err(_)) => Command::Invalid("port index must be a number".into()),
                None => Command::Invalid("usage: connect <index>".into()),
            },
            other => Command::Invalid(format!("unknown command '{}', type 'help'", other)),
        };
        Some(command)
    }
}

/// Read commands until `quit` or EOF
pub async fn run(server: &Server) -> Result<()> {
    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!("EOF received, shutting down");
                break;
            }
            Ok(_) => {
                let Some(command) = Command::parse(&line) else {
                    continue;
                };
                if command == Command::Quit {
                    break;
                }
                execute(server, command).await;
            }
            Err(e) => {
                error!("Error reading stdin: {}", e);
                break;
            }
        }
    }

    Ok(())
}

async fn execute(server: &Server, command: Command) {
    let arbiter = server.arbiter();

    match command {
        Command::Help => print_help(),
        Command::Status => {
            let status = arbiter.status();
            println!("{}", "Status".bold());
            let midi = match &status.midi_port {
                Some(port) if status.midi_connected => port.green().to_string(),
                _ => "not connected".yellow().to_string(),
            };
            println!("  MIDI output:  {}", midi);
            println!("  Clients:      {}", status.clients_connected);
            if status.active_clients.is_empty() {
                println!("  Active:       none");
            } else {
                println!("  Active:       {}", status.active_clients.join(", "));
            }
            let debug = if arbiter.diagnostics().enabled() {
                "on".green()
            } else {
                "off".dimmed()
            };
            println!("  Debug:        {}", debug);
        }
        Command::Debug => {
            let enabled = arbiter.diagnostics().toggle();
            info!("Debug mode {}", if enabled { "enabled" } else { "disabled" });
            println!(
                "Debug mode {} (interval {:?})",
                if enabled { "on".green() } else { "off".dimmed() },
                arbiter.diagnostics().interval()
            );
        }
        Command::Ports => {
            // Enumeration can block on the MIDI backend
            let scan = tokio::task::spawn_blocking(|| {
                MidiOutputSink::list_output_ports(SCANNER_CLIENT_NAME)
            })
            .await;
            let ports = match scan {
                Ok(Ok(ports)) => ports,
                Ok(Err(e)) => {
                    println!("{} {}", "Port scan failed:".red(), e);
                    arbiter.available_ports()
                }
                Err(e) => {
                    println!("{} {}", "Port scan failed:".red(), e);
                    arbiter.available_ports()
                }
            };
            if ports.is_empty() {
                println!("No MIDI output ports");
            }
            let current = arbiter.status().midi_port;
            for (index, name) in ports.iter().enumerate() {
                let marker = if current.as_deref() == Some(name.as_str()) {
                    "*"
                } else {
                    " "
                };
                let tag = if is_virtual_port(name) {
                    " (virtual)".cyan().to_string()
                } else {
                    String::new()
                };
                println!("{} {}: {}{}", marker, index, name, tag);
            }
        }
        Command::Connect(index) => match open_port(index).await {
            Ok(sink) => {
                let name = sink.port_name().unwrap_or_default();
                let previous = arbiter.replace_sink(Box::new(sink));
                // Closing the old port joins its worker thread
                tokio::task::spawn_blocking(move || drop(previous));
                println!("{} {}", "Connected to".green(), name);
            }
            Err(e) => println!("{} {}", "Failed to open port:".red(), e),
        },
        Command::Invalid(message) => println!("{}", message.yellow()),
        Command::Quit => {}
    }
}

/// Open a fresh sink on `index` without touching the running one
async fn open_port(index: usize) -> Result<MidiOutputSink> {
    let sink = tokio::task::spawn_blocking(move || {
        let mut sink = MidiOutputSink::new()?;
        sink.open(index)?;
        Ok::<_, remotecc_output::OutputError>(sink)
    })
    .await??;
    Ok(sink)
}

fn print_help() {
    println!("{}", "Commands".bold());
    println!("  help, h             Show this help");
    println!("  status, s           Show server status");
    println!("  debug, d            Toggle debug output");
    println!("  ports, p            List MIDI output ports");
    println!("  connect, c <index>  Open a MIDI output port");
    println!("  quit, q, exit       Stop the server");
}
