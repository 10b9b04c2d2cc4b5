// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! chatsync - a local-first chat client with background sync.
//!
//! # Main Components
//!
//! - [`ChatSync`] - the store, sync engine and scheduler behind one handle
//! - [`WebSocketRemote`] - the remote backend reached over WebSocket
//! - [`scheduler`] - background sync passes and debounced persistence
//! - [`Config`] - `config.toml` in the data directory
//!
//! ```rust,ignore
//! let data_dir = chatsync::config::resolve_data_dir(None)?;
//! let config = chatsync::Config::load(&data_dir)?;
//! let mut app = chatsync::ChatSync::open(&data_dir, &config, None)?;
//! app.start_scheduler((&config.sync).into());
//! let chat = app.create_chat("general", "Trip", None);
//! app.shutdown().await?;
//! ```

mod cli;
mod commands;
mod display;

pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use app::ChatSync;
pub use cli::{Cli, Command};
pub use client::WebSocketRemote;
pub use commands::Effect;
pub use config::Config;
pub use error::{Error, Result};
pub use transport::{Transport, WebSocketTransport};

use chatsync_core::SyncOutcome;

/// Runs a parsed command line.
///
/// Changes are pushed to the configured remote right away unless
/// `--offline` is given; a failed push leaves them queued for next time.
pub async fn run(cli: Cli) -> Result<()> {
    let data_dir = config::resolve_data_dir(cli.data_dir.as_deref())?;
    let config = Config::load(&data_dir)?;
    let app = ChatSync::open(&data_dir, &config, cli.identity.as_deref())?;
    tracing::debug!(data_dir = %data_dir.display(), "opened local store");

    let mut stdout = std::io::stdout();
    let result = commands::execute(&app, cli.command, &mut stdout).await;

    if matches!(result, Ok(Effect::Changed)) && !cli.offline && app.engine().is_some() {
        match app.sync_now().await {
            Ok(SyncOutcome::Completed(report)) if report.failed + report.exhausted > 0 => {
                tracing::warn!(failed = report.failed, "some changes could not be sent yet");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("sync after change failed: {}", e),
        }
    }

    app.shutdown().await?;
    result.map(|_| ())
}
