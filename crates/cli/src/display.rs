// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Plain-text rendering of chats, messages and sync state.

use chatsync_core::{LocalChat, LocalMessage, MergeReport, SyncReport, SyncStatus, SyncSummary};

/// Maximum line width for message content (excluding the 4-space indent).
const WRAP_WIDTH: usize = 96;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Suffix describing a record's sync state; empty once synced.
pub fn sync_marker(status: SyncStatus, error: Option<&str>) -> String {
    match (status, error) {
        (SyncStatus::Synced, _) => String::new(),
        (SyncStatus::Failed, Some(error)) => format!(" [failed: {}]", error),
        (status, _) => format!(" [{}]", status),
    }
}

/// One-line summary of a chat.
///
/// ```text
/// - [general] Trip planning (chat-lq2x-a1b2) archived
/// ```
pub fn format_chat_line(chat: &LocalChat) -> String {
    let mut line = format!("- [{}] {} ({})", chat.mode, chat.title, chat.local_id);
    if chat.is_archived {
        line.push_str(" archived");
    }
    if chat.is_public {
        line.push_str(" shared");
    }
    line.push_str(&sync_marker(chat.sync_status, chat.sync_error.as_deref()));
    line
}

/// Header block shown above a chat's messages.
pub fn format_chat_header(chat: &LocalChat) -> Vec<String> {
    let mut lines = vec![format!("[{}] {}", chat.mode, chat.title)];
    lines.push(format!("Id: {}", chat.local_id));
    if let Some(remote_id) = &chat.remote_id {
        lines.push(format!("Remote: {}", remote_id));
    }
    if let Some(profile) = &chat.profile_id {
        lines.push(format!("Profile: {}", profile));
    }
    lines.push(format!("Created: {}", chat.created_at.format(TIME_FORMAT)));
    if let Some(token) = chat.share_token.as_deref().filter(|_| chat.is_public) {
        lines.push(format!("Shared: {}", token));
    }
    lines.push(format!(
        "Status: {}{}",
        chat.sync_status,
        chat.sync_error
            .as_deref()
            .map(|e| format!(" ({})", e))
            .unwrap_or_default()
    ));
    lines
}

/// A message as a metadata line followed by indented, wrapped content.
///
/// ```text
///   2024-05-01 12:00 user (msg-lq2x-c3d4) *
///     Content goes here.
/// ```
pub fn format_message(message: &LocalMessage) -> Vec<String> {
    let favorite = if message.is_favorite { " *" } else { "" };
    let mut lines = vec![format!(
        "  {} {} ({}){}{}",
        message.created_at.format(TIME_FORMAT),
        message.role,
        message.local_id,
        favorite,
        sync_marker(message.sync_status, message.sync_error.as_deref())
    )];
    for line in message.content.lines() {
        for wrapped in wrap_line(line, WRAP_WIDTH) {
            lines.push(format!("    {}", wrapped));
        }
    }
    lines
}

/// Splits a line at word boundaries so each piece fits in `width`.
///
/// Words longer than `width` are kept whole.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    if line.chars().count() <= width {
        return vec![line.to_string()];
    }
    let mut pieces: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let needed = current.chars().count() + word.chars().count() + 1;
        if !current.is_empty() && needed > width {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

pub fn format_summary(summary: &SyncSummary) -> String {
    format!(
        "{} chats, {} messages: {} synced, {} pending, {} failed ({} queued)",
        summary.chats,
        summary.messages,
        summary.synced,
        summary.pending,
        summary.failed,
        summary.queued
    )
}

pub fn format_sync_report(report: &SyncReport) -> String {
    let mut text = format!("synced {} of {} records", report.synced, report.attempted);
    if report.failed > 0 {
        text.push_str(&format!(", {} will retry", report.failed));
    }
    if report.exhausted > 0 {
        text.push_str(&format!(", {} gave up", report.exhausted));
    }
    if report.deferred > 0 {
        text.push_str(&format!(", {} waiting for their chat", report.deferred));
    }
    text
}

pub fn format_merge_report(report: &MergeReport) -> String {
    if !report.changed() {
        return "already up to date".to_string();
    }
    format!(
        "pulled {} new, {} updated, {} linked",
        report.inserted, report.updated, report.linked
    )
}

#[cfg(test)]
#[path = "display_tests.rs"]
mod tests;
