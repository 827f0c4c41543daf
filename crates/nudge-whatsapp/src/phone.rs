// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Destination number normalization.
//!
//! WhatsApp addresses accounts by their full international number. Numbers
//! arrive from user profiles in whatever shape people typed them, so they
//! are reduced to bare E.164 digits before anything touches the session.

use nudge_core::NudgeError;

/// Suffix WhatsApp Web uses for individual chats.
pub const CHAT_SUFFIX: &str = "@c.us";

const MIN_DIGITS: usize = 8;
const MAX_DIGITS: usize = 15;

fn invalid(destination: &str, reason: impl Into<String>) -> NudgeError {
    NudgeError::InvalidDestination {
        destination: destination.to_string(),
        reason: reason.into(),
    }
}

/// Reduces a phone number to international digits without the leading `+`.
///
/// Accepts `+62 812-3456-7890`, `0062...`, an existing chat id, or a national
/// number starting with a trunk `0` when `default_country_code` is known.
pub fn normalize(
    destination: &str,
    default_country_code: Option<&str>,
) -> Result<String, NudgeError> {
    let trimmed = destination.trim();
    let trimmed = trimmed.strip_suffix(CHAT_SUFFIX).unwrap_or(trimmed);
    let compact: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.' | '/' | '\u{a0}'))
        .collect();

    if compact.is_empty() {
        return Err(invalid(destination, "empty number"));
    }

    let digits = if let Some(rest) = compact.strip_prefix('+') {
        rest.to_string()
    } else if let Some(rest) = compact.strip_prefix("00") {
        rest.to_string()
    } else if let Some(rest) = compact.strip_prefix('0') {
        let Some(cc) = default_country_code else {
            return Err(invalid(
                destination,
                "national number without a country code; set whatsapp.default_country_code",
            ));
        };
        let cc = cc.trim();
        let cc = cc.strip_prefix('+').or_else(|| cc.strip_prefix("00")).unwrap_or(cc);
        format!("{cc}{rest}")
    } else {
        compact
    };

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid(destination, "contains characters other than digits"));
    }
    if digits.starts_with('0') {
        return Err(invalid(destination, "country code cannot start with 0"));
    }
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
        return Err(invalid(
            destination,
            format!("expected {MIN_DIGITS} to {MAX_DIGITS} digits, got {}", digits.len()),
        ));
    }
    Ok(digits)
}

/// Chat id for normalized digits.
pub fn chat_id(digits: &str) -> String {
    format!("{digits}{CHAT_SUFFIX}")
}
