// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment deserialization failures and validation failures are both turned
//! into [`ConfigError`]s that miette renders with the offending line of
//! `nudge.toml`, the section the key belongs to, and a "did you mean"
//! suggestion for misspelled keys and channel names.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a suggestion (`max_atempts` ->
/// `max_attempts`, `telegarm` -> `telegram`).
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Keys whose values are channel names.
const CHANNEL_LIST_KEYS: &[&str] = &["default_channels", "organization_channels"];

/// A configuration problem, ready for miette rendering.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key (or top-level section) that no section accepts.
    #[error("{}", describe_unknown(.key, .section))]
    #[diagnostic(
        code(nudge::config::unknown_key),
        help("{}", unknown_key_help(section, suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Dotted section path, empty at the top level.
        section: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not recognized here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A channel list names a channel nudge does not have.
    #[error("unknown channel `{value}` in `{key}`")]
    #[diagnostic(
        code(nudge::config::unknown_channel),
        help("{}", unknown_channel_help(suggestion.as_deref(), valid_channels))
    )]
    UnknownChannel {
        key: String,
        value: String,
        suggestion: Option<String>,
        valid_channels: String,
        #[label("no such channel")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value of the wrong type.
    #[error("invalid type for `{key}`: {detail}")]
    #[diagnostic(code(nudge::config::invalid_type), help("{}", type_help(key, expected)))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(nudge::config::missing_key),
        help("add `{key} = <value>` to your nudge.toml")
    )]
    MissingKey { key: String },

    /// A well-typed value that breaks a semantic rule.
    #[error("{message}")]
    #[diagnostic(code(nudge::config::validation), help("{}", validation_help(key)))]
    Validation {
        /// Dotted key the rule is about.
        key: &'static str,
        message: String,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(nudge::config::other))]
    Other(String),
}

fn describe_unknown(key: &str, section: &str) -> String {
    if section.is_empty() {
        format!("unknown section `{key}`")
    } else {
        format!("unknown key `{key}` in [{section}]")
    }
}

fn unknown_key_help(section: &str, suggestion: Option<&str>, valid_keys: &str) -> String {
    let scope = if section.is_empty() {
        "nudge.toml has the sections".to_string()
    } else {
        format!("[{section}] accepts")
    };
    match suggestion {
        Some(s) => format!("did you mean `{s}`? {scope}: {valid_keys}"),
        None => format!("{scope}: {valid_keys}"),
    }
}

fn unknown_channel_help(suggestion: Option<&str>, valid_channels: &str) -> String {
    let listing = format!("channels are tried in list order; available: {valid_channels}");
    match suggestion {
        Some(s) => format!("did you mean `{s}`? {listing}"),
        None => listing,
    }
}

fn type_help(key: &str, expected: &str) -> String {
    if key.ends_with("_secs") {
        format!("expected {expected}: durations are whole seconds, e.g. `{}` = 60", leaf(key))
    } else if CHANNEL_LIST_KEYS.iter().any(|k| key.contains(k)) {
        format!("expected {expected}: a list such as [\"whatsapp\", \"email\"]")
    } else {
        format!("expected {expected}")
    }
}

/// Help for the rules in [`crate::validation`], keyed by dotted path.
fn validation_help(key: &str) -> String {
    match key {
        "dispatch.lease_timeout_secs" | "dispatch.tick_budget_secs" => {
            "a claim must outlive the tick holding it; keep lease_timeout_secs above tick_budget_secs (defaults 300 and 50)".into()
        }
        "dispatch.max_attempts" => {
            "counts every delivery attempt including the first; the default is 3".into()
        }
        "dispatch.default_channels" | "dispatch.organization_channels" => {
            "list one or more of whatsapp, telegram, email in fallback order".into()
        }
        "whatsapp.default_country_code" => {
            "the calling code used for national numbers, e.g. \"62\" or \"+62\"".into()
        }
        "whatsapp.bridge_url" => {
            "the WhatsApp Web bridge sidecar, e.g. \"http://127.0.0.1:3100\"".into()
        }
        "email.from_address" => "a sender such as \"Nudge <reminders@example.com>\"".into(),
        "gateway.host" => "an IP address such as \"127.0.0.1\", or a hostname".into(),
        _ => format!("check `{}` in the [{}] section of nudge.toml", leaf(key), section_of(key)),
    }
}

fn leaf(key: &str) -> &str {
    key.rsplit('.').next().unwrap_or(key)
}

fn section_of(key: &str) -> &str {
    key.split('.').next().unwrap_or(key)
}

/// Converts every error inside a `figment::Error` into a [`ConfigError`].
///
/// `toml_sources` holds `(path, content)` of the files that were read, for
/// source spans.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
            let source = source_for(&error, toml_sources);
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) = source
                        .and_then(|(name, content)| {
                            find_key_offset(content, &path, field)
                                .map(|offset| spanned(name, content, offset, field.len()))
                        })
                        .unzip();
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        section: path.join("."),
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::UnknownVariant(value, expected)
                    if is_channel_list(&path) || expected.contains(&"whatsapp") =>
                {
                    let (span, src) = source
                        .and_then(|(name, content)| {
                            find_value_offset(content, &path, value)
                                .map(|offset| spanned(name, content, offset, value.len() + 2))
                        })
                        .unzip();
                    ConfigError::UnknownChannel {
                        key: path.join("."),
                        value: value.clone(),
                        suggestion: suggest_key(value, expected),
                        valid_channels: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: qualified(&path, field),
                },
                Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                    key: path.join("."),
                    detail: format!("found {actual}, expected {expected}"),
                    expected: expected.to_string(),
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn qualified(path: &[String], field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{field}", path.join("."))
    }
}

fn is_channel_list(path: &[String]) -> bool {
    path.iter().any(|p| CHANNEL_LIST_KEYS.contains(&p.as_str()))
}

fn spanned(name: &str, content: &str, offset: usize, len: usize) -> (SourceSpan, NamedSource<String>) {
    (
        SourceSpan::new(offset.into(), len),
        NamedSource::new(name, content.to_string()),
    )
}

/// The file a figment error came from, if it was one we read.
fn source_for<'a>(
    error: &figment::error::Error,
    toml_sources: &'a [(String, String)],
) -> Option<(&'a str, &'a str)> {
    let metadata = error.metadata.as_ref()?;
    match metadata.source.as_ref() {
        Some(figment::Source::File(path)) => {
            let path = path.display().to_string();
            toml_sources
                .iter()
                .find(|(p, _)| *p == path)
                .map(|(p, content)| (p.as_str(), content.as_str()))
        }
        // Inline strings carry no file; fall back to the only source we have.
        _ if toml_sources.len() == 1 => toml_sources
            .first()
            .map(|(p, content)| (p.as_str(), content.as_str())),
        _ => None,
    }
}

/// Byte offset just past the header of the deepest table in `path` that
/// appears in `content` (`[dispatch.organization_channels]` before
/// `[dispatch]`). Zero when `path` is empty.
fn section_start(content: &str, path: &[String]) -> Option<usize> {
    if path.is_empty() {
        return Some(0);
    }
    (1..=path.len()).rev().find_map(|depth| {
        let header = format!("[{}]", path[..depth].join("."));
        content.find(&header).map(|pos| pos + header.len())
    })
}

/// Byte offset of `field` as a key inside the table at `path`.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let start = section_start(content, path)?;
    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            break;
        }
        if let Some(after) = trimmed.strip_prefix(field) {
            if after.trim_start().starts_with('=') {
                return Some(offset + (line.len() - trimmed.len()));
            }
        }
        offset += line.len();
    }
    None
}

/// Byte offset of the quoted string `"value"` inside the table at `path`.
pub fn find_value_offset(content: &str, path: &[String], value: &str) -> Option<usize> {
    let start = section_start(content, path).unwrap_or(0);
    let needle = format!("\"{value}\"");
    content[start..].find(&needle).map(|pos| start + pos)
}

/// Closest candidate to `unknown` by Jaro-Winkler similarity, if any is
/// close enough.
pub fn suggest_key(unknown: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|&c| (strsim::jaro_winkler(unknown, c), c))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.to_string())
}

/// Renders errors to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}
