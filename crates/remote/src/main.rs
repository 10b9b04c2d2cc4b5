// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! chatsync-remote: reference WebSocket server for chatsync clients.
//!
//! Serves the chatsync protocol from memory, optionally persisting records
//! as JSONL files in a data directory.

mod server;
mod state;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// chatsync-remote: chat storage server
#[derive(Parser, Debug)]
#[command(name = "chatsync-remote")]
#[command(about = "Reference WebSocket server for chatsync clients")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "127.0.0.1:7890")]
    bind: SocketAddr,

    /// Directory for persisted records; in-memory only when omitted
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting chatsync-remote");
    info!("  Bind address: {}", args.bind);

    let state = match &args.data {
        Some(dir) => {
            info!("  Data directory: {}", dir.display());
            state::ServerState::open(dir)?
        }
        None => {
            info!("  Data directory: none (records are lost on exit)");
            state::ServerState::in_memory()
        }
    };

    server::run(args.bind, state).await
}
