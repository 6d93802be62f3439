//! Design bridge CLI
//!
//! Replays a scripted parent/page session against a document description and prints
//! every envelope the bridge posts, one JSON object per line.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use design_bridge::bridge::{BootstrapMessage, BridgeInput, PointerInput};
use design_bridge::bridge::{RejectionReason, RuntimeErrorEvent};
use design_bridge::context::NoopContextProvider;
use design_bridge::protocol::{command_schema, envelope_schema, event_schema};
use design_bridge::runtime::{BridgePort, BridgeRuntime, ChannelPort};
use design_bridge::{BridgeAgent, BridgeOptions, DomTree};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "design-bridge")]
#[command(version)]
#[command(about = "In-page design-selection bridge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSONL script and print the envelopes posted to the parent
    Replay {
        /// Document description (JSON)
        #[arg(long, value_name = "PATH")]
        document: PathBuf,

        /// One step per line
        #[arg(long, value_name = "PATH")]
        script: PathBuf,

        /// Bridge options (JSON)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Print the JSON schemas of commands, events and the envelope
    Schema,
}

/// One line of a replay script
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ReplayStep {
    /// Handshake; the port is transferred unless `withPort` is false
    Bootstrap {
        data: Value,
        #[serde(default = "default_origin")]
        origin: String,
        #[serde(default = "default_true", rename = "withPort")]
        with_port: bool,
    },
    /// Message posted by the parent on the bridge port
    Message { data: Value },
    PointerDown(PointerStep),
    PointerMove(PointerStep),
    PointerUp(PointerStep),
    PointerCancel {
        #[serde(default, rename = "pointerId")]
        pointer_id: i64,
    },
    Click,
    Mutation,
    Scroll,
    Resize,
    Error {
        message: String,
        #[serde(default)]
        filename: Option<String>,
        #[serde(default)]
        lineno: Option<u32>,
        #[serde(default)]
        colno: Option<u32>,
    },
    Rejection { message: String },
    /// Let timers, heartbeats and lookups run
    Wait { ms: u64 },
    Teardown,
}

#[derive(Debug, Deserialize)]
struct PointerStep {
    #[serde(default, rename = "pointerId")]
    pointer_id: i64,
    x: f64,
    y: f64,
    #[serde(default)]
    button: i16,
}

impl PointerStep {
    fn input(&self) -> PointerInput {
        PointerInput::new(self.pointer_id, self.x, self.y).with_button(self.button)
    }
}

fn default_origin() -> String {
    "http://localhost".to_string()
}

fn default_true() -> bool {
    true
}

type ReplayRuntime = BridgeRuntime<DomTree, NoopContextProvider, ChannelPort>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { document, script, config } => replay(document, script, config).await,
        Commands::Schema => {
            let schemas = serde_json::json!({
                "command": command_schema(),
                "event": event_schema(),
                "envelope": envelope_schema(),
            });
            println!("{}", serde_json::to_string_pretty(&schemas)?);
            Ok(())
        }
    }
}

async fn replay(document: PathBuf, script: PathBuf, config: Option<PathBuf>) -> anyhow::Result<()> {
    let options = match config {
        Some(path) => BridgeOptions::from_file(&path)?,
        None => BridgeOptions::default(),
    };

    let document_json = std::fs::read_to_string(&document)
        .with_context(|| format!("Failed to read document {}", document.display()))?;
    let tree = DomTree::from_json(&document_json)?;

    let script_text = std::fs::read_to_string(&script)
        .with_context(|| format!("Failed to read script {}", script.display()))?;

    let agent = BridgeAgent::new(tree, options, std::time::Instant::now());
    let mut runtime: ReplayRuntime = BridgeRuntime::new(agent, NoopContextProvider);
    let mut parent: Option<ChannelPort> = None;

    for (index, line) in script_text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        let step: ReplayStep = serde_json::from_str(line)
            .with_context(|| format!("Invalid step on line {}", index + 1))?;
        log::debug!("Step {}: {:?}", index + 1, step);

        match step {
            ReplayStep::Bootstrap { data, origin, with_port } => {
                let message = BootstrapMessage::from_parent(data, origin);
                if with_port {
                    let (bridge_end, parent_end) = ChannelPort::pair();
                    runtime.bootstrap(message, Some(bridge_end));
                    if runtime.has_port() {
                        parent = Some(parent_end);
                    }
                } else {
                    runtime.bootstrap(message, None);
                }
            }
            ReplayStep::Message { data } => {
                let Some(port) = parent.as_mut() else {
                    bail!("Line {}: message sent before a port was adopted", index + 1);
                };
                if let Err(e) = port.post(data) {
                    log::warn!("Line {}: {}", index + 1, e);
                }
                runtime.run_for(Duration::ZERO).await;
            }
            ReplayStep::PointerDown(pointer) => {
                dispatch(&mut runtime, BridgeInput::PointerDown(pointer.input()))
            }
            ReplayStep::PointerMove(pointer) => {
                dispatch(&mut runtime, BridgeInput::PointerMove(pointer.input()))
            }
            ReplayStep::PointerUp(pointer) => {
                dispatch(&mut runtime, BridgeInput::PointerUp(pointer.input()))
            }
            ReplayStep::PointerCancel { pointer_id } => {
                dispatch(&mut runtime, BridgeInput::PointerCancel { pointer_id })
            }
            ReplayStep::Click => dispatch(&mut runtime, BridgeInput::Click),
            ReplayStep::Mutation => dispatch(&mut runtime, BridgeInput::DomMutated),
            ReplayStep::Scroll => dispatch(&mut runtime, BridgeInput::Scrolled),
            ReplayStep::Resize => dispatch(&mut runtime, BridgeInput::Resized),
            ReplayStep::Error { message, filename, lineno, colno } => {
                let event = RuntimeErrorEvent { message, filename, lineno, colno, stack: None };
                dispatch(&mut runtime, BridgeInput::RuntimeError(event));
            }
            ReplayStep::Rejection { message } => {
                let reason = RejectionReason::Message(message);
                dispatch(&mut runtime, BridgeInput::UnhandledRejection(reason))
            }
            ReplayStep::Wait { ms } => runtime.run_for(Duration::from_millis(ms)).await,
            ReplayStep::Teardown => dispatch(&mut runtime, BridgeInput::Teardown),
        }

        if let Some(port) = parent.as_mut() {
            print_posted(port)?;
        }
    }

    if !runtime.agent().is_torn_down() {
        runtime.dispatch(BridgeInput::Teardown);
    }
    if let Some(port) = parent.as_mut() {
        print_posted(port)?;
    }

    Ok(())
}

fn dispatch(runtime: &mut ReplayRuntime, input: BridgeInput) {
    if runtime.dispatch(input) {
        log::debug!("Event consumed by the bridge");
    }
}

fn print_posted(port: &mut ChannelPort) -> anyhow::Result<()> {
    for message in port.drain() {
        println!("{}", serde_json::to_string(&message)?);
    }
    Ok(())
}
