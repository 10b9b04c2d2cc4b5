// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations.

use std::io::Write;
use std::str::FromStr;

use serde_json::Value;

use chatsync_core::{Role, SyncOutcome, SyncStatus};

use crate::app::ChatSync;
use crate::cli::Command;
use crate::display::{
    format_chat_header, format_chat_line, format_merge_report, format_message, format_summary,
    format_sync_report,
};
use crate::error::{Error, Result};

/// Whether a command changed local state that should be pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    ReadOnly,
    Changed,
}

/// Runs one command against an open client, writing its output to `out`.
pub async fn execute(
    app: &ChatSync,
    command: Command,
    out: &mut (dyn Write + Send),
) -> Result<Effect> {
    match command {
        Command::New {
            title,
            mode,
            profile,
        } => {
            let chat = app.create_chat(&mode, &title, profile.as_deref());
            writeln!(out, "{}", chat.local_id)?;
            Ok(Effect::Changed)
        }
        Command::Send {
            chat,
            content,
            role,
            metadata,
            id,
        } => {
            let role = Role::from_str(&role)?;
            let metadata = parse_metadata(metadata.as_deref())?;
            let message = app.add_message(&chat, role, &content, metadata, id.as_deref())?;
            writeln!(out, "{}", message.local_id)?;
            Ok(Effect::Changed)
        }
        Command::List {
            mode,
            profile,
            all,
            favorites,
        } => {
            let store = app.lock();
            if favorites {
                for message in store.get_favorite_messages(profile.as_deref()) {
                    for line in format_message(&message) {
                        writeln!(out, "{}", line)?;
                    }
                }
                return Ok(Effect::ReadOnly);
            }
            let chats = store.get_chats(mode.as_deref(), profile.as_deref());
            for chat in chats.iter().filter(|c| all || !c.is_archived) {
                writeln!(out, "{}", format_chat_line(chat))?;
            }
            Ok(Effect::ReadOnly)
        }
        Command::Show { chat } => {
            let store = app.lock();
            let chat = store
                .get_chat(&chat)
                .ok_or_else(|| Error::ChatNotFound(chat.clone()))?;
            for line in format_chat_header(chat) {
                writeln!(out, "{}", line)?;
            }
            for message in store.get_messages_for_chat(&chat.local_id) {
                writeln!(out)?;
                for line in format_message(&message) {
                    writeln!(out, "{}", line)?;
                }
            }
            Ok(Effect::ReadOnly)
        }
        Command::Rename { chat, title } => {
            let chat = app.rename_chat(&chat, &title)?;
            writeln!(out, "Renamed {} to {}", chat.local_id, chat.title)?;
            Ok(Effect::Changed)
        }
        Command::Archive { chat, undo } => {
            let chat = app.set_archived(&chat, !undo)?;
            let verb = if undo { "Unarchived" } else { "Archived" };
            writeln!(out, "{} {}", verb, chat.local_id)?;
            Ok(Effect::Changed)
        }
        Command::Share { chat } => {
            let token = app.share_chat(&chat)?;
            writeln!(out, "{}", token)?;
            Ok(Effect::Changed)
        }
        Command::Unshare { chat } => {
            let chat = app.unshare_chat(&chat)?;
            writeln!(out, "Unshared {}", chat.local_id)?;
            Ok(Effect::Changed)
        }
        Command::Fav { message, undo } => {
            let message = app.set_favorite(&message, !undo)?;
            let verb = if undo { "Unmarked" } else { "Marked" };
            writeln!(out, "{} {}", verb, message.local_id)?;
            Ok(Effect::Changed)
        }
        Command::Rm { chat, all } => {
            match chat {
                Some(chat) if !all => {
                    let deleted = app.delete_chat(&chat)?;
                    writeln!(out, "Deleted {}", deleted.local_id)?;
                }
                _ => {
                    let count = app.delete_all_chats();
                    writeln!(out, "Deleted {} chats", count)?;
                }
            }
            Ok(Effect::Changed)
        }
        Command::Clear => {
            let identity = app
                .lock()
                .identity()
                .unwrap_or("anonymous")
                .to_string();
            app.clear()?;
            writeln!(out, "Cleared local data for {}", identity)?;
            Ok(Effect::ReadOnly)
        }
        Command::Sync { pull, profile } => {
            if pull {
                let report = app.refresh(profile.as_deref()).await?;
                writeln!(out, "{}", format_merge_report(&report))?;
            }
            match app.sync_now().await? {
                SyncOutcome::Completed(report) => {
                    writeln!(out, "{}", format_sync_report(&report))?;
                }
                SyncOutcome::Busy => writeln!(out, "A sync is already running")?,
                SyncOutcome::Offline => writeln!(out, "Offline, nothing sent")?,
            }
            Ok(Effect::ReadOnly)
        }
        Command::Status => {
            let store = app.lock();
            writeln!(out, "Identity: {}", store.identity().unwrap_or("anonymous"))?;
            let remote = if app.engine().is_some() {
                "configured"
            } else {
                "none (local only)"
            };
            writeln!(out, "Remote: {}", remote)?;
            writeln!(out, "{}", format_summary(&store.sync_summary()))?;
            for chat in store.get_chats(None, None) {
                if chat.sync_status == SyncStatus::Failed {
                    writeln!(out, "{}", format_chat_line(&chat))?;
                }
            }
            Ok(Effect::ReadOnly)
        }
        Command::Retry { id } => {
            match id {
                Some(id) => {
                    if app.retry(&id)? {
                        writeln!(out, "Queued {}", id)?;
                    } else {
                        writeln!(out, "{} does not need a retry", id)?;
                    }
                }
                None => {
                    let count = app.retry_all_failed();
                    writeln!(out, "Queued {} failed records", count)?;
                }
            }
            Ok(Effect::Changed)
        }
    }
}

/// Parses `--metadata`, which must be a JSON object when present.
fn parse_metadata(raw: Option<&str>) -> Result<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Null);
    };
    let value: Value =
        serde_json::from_str(raw).map_err(|e| Error::InvalidMetadata(e.to_string()))?;
    if !value.is_object() {
        return Err(Error::InvalidMetadata(format!("got {}", raw)));
    }
    Ok(value)
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
