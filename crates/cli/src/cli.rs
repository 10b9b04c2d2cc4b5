// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

#[derive(Parser)]
#[command(name = "chatsync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Local-first chat history that syncs in the background")]
#[command(
    long_about = "Local-first chat history that syncs in the background.\n\n\
    Every change is recorded locally first and pushed to the configured remote \
    when it is reachable. Without a remote, chatsync works entirely offline."
)]
pub struct Cli {
    /// Data directory (default: $CHATSYNC_DIR or the platform data directory)
    #[arg(long, global = true, value_name = "path")]
    pub data_dir: Option<PathBuf>,

    /// Act as this identity instead of the configured one
    #[arg(long, global = true, value_name = "id")]
    pub identity: Option<String>,

    /// Do not contact the remote after making changes
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Start a new chat
    #[command(after_help = "\
Examples:
  chatsync new \"Trip planning\"              Create a general chat
  chatsync new \"Recipes\" -m cooking -p p1   Create a chat for a profile")]
    New {
        #[arg(value_parser = non_empty_string)]
        title: String,

        /// Chat mode
        #[arg(long, short, default_value = "general")]
        mode: String,

        /// Profile the chat belongs to
        #[arg(long, short)]
        profile: Option<String>,
    },

    /// Add a message to a chat
    #[command(after_help = "\
Examples:
  chatsync send chat-lq2x-a1b2 \"Hello\"
  chatsync send chat-lq2x-a1b2 \"Hi there\" -r assistant --metadata '{\"model\":\"m1\"}'
  chatsync send chat-lq2x-a1b2 \"Hello\" --id msg-1   Idempotent on msg-1")]
    Send {
        /// Chat id (local or remote)
        chat: String,

        #[arg(value_parser = non_empty_string)]
        content: String,

        /// Author role (user, assistant, system)
        #[arg(long, short, default_value = "user")]
        role: String,

        /// JSON object stored with the message
        #[arg(long)]
        metadata: Option<String>,

        /// Caller-chosen message id; resending with the same id is a no-op
        #[arg(long)]
        id: Option<String>,
    },

    /// List chats, most recently active first
    List {
        /// Only chats of this mode
        #[arg(long, short)]
        mode: Option<String>,

        /// Only chats of this profile
        #[arg(long, short)]
        profile: Option<String>,

        /// Include archived chats
        #[arg(long, short)]
        all: bool,

        /// List favorite messages instead of chats
        #[arg(long)]
        favorites: bool,
    },

    /// Show a chat and its messages
    Show { chat: String },

    /// Change a chat's title
    Rename {
        chat: String,
        #[arg(value_parser = non_empty_string)]
        title: String,
    },

    /// Archive a chat
    Archive {
        chat: String,

        /// Unarchive instead
        #[arg(long)]
        undo: bool,
    },

    /// Make a chat public and print its share token
    Share { chat: String },

    /// Make a shared chat private again
    Unshare { chat: String },

    /// Mark a message as favorite
    Fav {
        message: String,

        /// Remove the mark instead
        #[arg(long)]
        undo: bool,
    },

    /// Delete a chat and its messages, locally and remotely
    Rm {
        #[arg(required_unless_present = "all")]
        chat: Option<String>,

        /// Delete every chat
        #[arg(long, conflicts_with = "chat")]
        all: bool,
    },

    /// Forget all local data for the current identity (remote data is kept)
    Clear,

    /// Push pending changes now
    Sync {
        /// Refresh from the server first
        #[arg(long)]
        pull: bool,

        /// Restrict the refresh to one profile
        #[arg(long, short, requires = "pull")]
        profile: Option<String>,
    },

    /// Show sync state
    Status,

    /// Retry a failed chat or message, or all failed records
    Retry { id: Option<String> },
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
