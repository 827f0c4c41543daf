// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Nudge dispatch engine.

use thiserror::Error;

use crate::types::ChannelKind;

/// The primary error type used across all Nudge adapter traits and core operations.
#[derive(Debug, Error)]
pub enum NudgeError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Generic channel errors (network failure, unexpected response).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The channel cannot accept messages right now (session not connected).
    #[error("{channel} channel unavailable: {message}")]
    ChannelUnavailable { channel: ChannelKind, message: String },

    /// The channel refused the message and will keep refusing it.
    #[error("{channel} rejected delivery: {message}")]
    DeliveryRejected { channel: ChannelKind, message: String },

    /// A destination address could not be normalized.
    #[error("invalid destination `{destination}`: {reason}")]
    InvalidDestination { destination: String, reason: String },

    /// Messaging session lifecycle errors (bring-up failure, driver crash).
    #[error("session error: {0}")]
    Session(String),

    /// Requested adapter was not found in the registry.
    #[error("adapter not found: {adapter_type}/{name}")]
    AdapterNotFound { adapter_type: String, name: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Caller failed authentication at a trust boundary.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl NudgeError {
    /// Whether a failed delivery is worth retrying on a later tick.
    ///
    /// Unavailable channels, timeouts and generic network errors are
    /// transient. Explicit rejections and malformed destinations are not.
    pub fn is_transient(&self) -> bool {
        match self {
            NudgeError::ChannelUnavailable { .. }
            | NudgeError::Timeout { .. }
            | NudgeError::Channel { .. }
            | NudgeError::Session(_)
            | NudgeError::Storage { .. }
            | NudgeError::Internal(_) => true,
            NudgeError::DeliveryRejected { .. }
            | NudgeError::InvalidDestination { .. }
            | NudgeError::Config(_)
            | NudgeError::AdapterNotFound { .. }
            | NudgeError::Unauthorized(_) => false,
        }
    }

    /// Short machine-readable label stored alongside dispatch attempts.
    pub fn kind(&self) -> &'static str {
        match self {
            NudgeError::Config(_) => "config",
            NudgeError::Storage { .. } => "storage",
            NudgeError::Channel { .. } => "channel",
            NudgeError::ChannelUnavailable { .. } => "unavailable",
            NudgeError::DeliveryRejected { .. } => "rejected",
            NudgeError::InvalidDestination { .. } => "invalid_destination",
            NudgeError::Session(_) => "session",
            NudgeError::AdapterNotFound { .. } => "adapter_not_found",
            NudgeError::Timeout { .. } => "timeout",
            NudgeError::Unauthorized(_) => "unauthorized",
            NudgeError::Internal(_) => "internal",
        }
    }
}
