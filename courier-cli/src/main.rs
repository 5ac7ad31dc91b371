// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Courier CLI
//!
//! Joins the `broadcast` channel and a private session channel, prints what
//! arrives and forwards JSON lines typed on stdin.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use tracing::{info, warn};

use courier_core::config::{ClientConfig, ENV_MAX_QUEUED, ENV_RECONNECT_DELAY_MS, ENV_URL};
use courier_core::network::{ConnectionManager, HandlerContext, Message, WebSocketConnector};

/// Channel every client joins.
const BROADCAST_CHANNEL: &str = "broadcast";

/// Longest sleep between polls when nothing happened.
const IDLE_WAIT: Duration = Duration::from_millis(25);

#[derive(Parser)]
#[command(name = "courier")]
#[command(version, about = "Subscribe to courier channels and exchange messages")]
struct Cli {
    /// Server URL
    #[arg(long, env = ENV_URL, default_value = "ws://localhost:9000/ws")]
    url: String,

    /// Private session channel (default: a random UUID)
    #[arg(long)]
    session: Option<String>,

    /// Additional channel to subscribe to (repeatable)
    #[arg(long = "channel")]
    channels: Vec<String>,

    /// Message kind to print (repeatable); other kinds are shown as unhandled
    #[arg(long = "kind", default_values = ["pong"])]
    kinds: Vec<String>,

    /// Delay between a disconnect and the next attempt
    #[arg(long, env = ENV_RECONNECT_DELAY_MS, default_value_t = 2_000)]
    reconnect_delay_ms: u64,

    /// Keep at most this many unsent messages while offline
    #[arg(long, env = ENV_MAX_QUEUED)]
    max_queued: Option<usize>,

    /// Skip the initial ping on the broadcast channel
    #[arg(long)]
    no_ping: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("courier=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let session = cli
        .session
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut builder = ClientConfig::builder(&cli.url)
        .reconnect_delay_ms(cli.reconnect_delay_ms)
        .channel(BROADCAST_CHANNEL)
        .channel(&session)
        .channels(cli.channels.iter().map(String::as_str));
    if let Some(max) = cli.max_queued {
        builder = builder.max_queued_messages(max);
    }
    let config = builder.build().context("Invalid client configuration")?;

    info!("Starting courier v{}", env!("CARGO_PKG_VERSION"));
    info!("Server: {}", config.address);
    info!("Session channel: {}", session);

    let mut client = ConnectionManager::new(WebSocketConnector::new(), config);
    for kind in &cli.kinds {
        client.add_handler(kind, print_message);
    }
    client.set_fallback_handler(print_unhandled);

    if !cli.no_ping {
        client.send(Message::new("ping", BROADCAST_CHANNEL).with_field("count", 1));
    }

    let input = spawn_stdin_reader();
    client.start();
    run(&mut client, input);
    Ok(())
}

/// Drives the client until the process is interrupted.
fn run(client: &mut ConnectionManager<WebSocketConnector>, input: Receiver<String>) {
    let mut input = Some(input);
    loop {
        if let Some(rx) = &input {
            if !forward_input(client, rx) {
                info!("stdin closed, still listening");
                input = None;
            }
        }

        if client.poll() == 0 {
            let wait = client
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .map_or(IDLE_WAIT, |until| until.min(IDLE_WAIT));
            thread::sleep(wait);
        }
    }
}

/// Sends every pending stdin line. Returns false once stdin is gone.
fn forward_input(client: &mut ConnectionManager<WebSocketConnector>, rx: &Receiver<String>) -> bool {
    loop {
        match rx.try_recv() {
            Ok(line) => match Message::decode(&line) {
                Ok(message) => client.send(message),
                Err(e) => warn!("Ignoring input line: {}", e),
            },
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Disconnected) => return false,
        }
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn print_message(msg: &Message, _ctx: &mut HandlerContext) {
    println!(
        "{} {} {}",
        style(format!("[{}]", msg.kind)).green().bold(),
        style(&msg.channel).cyan(),
        format_fields(msg)
    );
}

fn print_unhandled(msg: &Message, _ctx: &mut HandlerContext) {
    println!(
        "{} {} {}",
        style(format!("[{}?]", msg.kind)).yellow(),
        style(&msg.channel).dim(),
        format_fields(msg)
    );
}

fn format_fields(msg: &Message) -> String {
    if msg.fields.is_empty() {
        String::new()
    } else {
        serde_json::Value::Object(msg.fields.clone()).to_string()
    }
}
