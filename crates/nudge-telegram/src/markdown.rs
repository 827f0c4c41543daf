// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MarkdownV2 rendering of reminder notifications.
//!
//! Reminder text is plain text written by users (task titles), so every
//! MarkdownV2 special character is escaped, backticks included. Only the
//! subject line carries formatting.

/// Characters that must be escaped anywhere outside entities.
const SPECIAL_CHARS: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Maximum message length accepted by the Bot API, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Escapes plain text for MarkdownV2.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for ch in text.chars() {
        if SPECIAL_CHARS.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Renders a reminder as a bold subject line followed by the body.
pub fn render(subject: &str, body: &str) -> String {
    let subject = subject.trim();
    if subject.is_empty() {
        return escape(body);
    }
    format!("*{}*\n\n{}", escape(subject), escape(body))
}

/// Renders the same layout without markup, for the plain-text fallback.
pub fn render_plain(subject: &str, body: &str) -> String {
    let subject = subject.trim();
    if subject.is_empty() {
        return body.to_string();
    }
    format!("{subject}\n\n{body}")
}

/// Cuts `text` to at most [`MAX_MESSAGE_CHARS`] characters.
///
/// A trailing backslash left by the cut would escape nothing and break
/// parsing, so it is dropped.
pub fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_MESSAGE_CHARS - 1).collect();
    let trailing = cut.chars().rev().take_while(|c| *c == '\\').count();
    if trailing % 2 == 1 {
        cut.pop();
    }
    cut.push('…');
    cut
}
