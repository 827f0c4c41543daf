// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat driver trait: the protocol client behind the stateful messaging session.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::NudgeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ClientEvent, MessageId};

/// Low-level client for a single-device chat account (WhatsApp Web).
///
/// The client is not reentrant. The session manager guarantees that
/// lifecycle calls never overlap and that at most one `send_text` is in
/// flight at a time; implementations need not guard against either.
#[async_trait]
pub trait ChatDriver: PluginAdapter {
    /// Starts the client. Lifecycle events are delivered on `events` until
    /// the client is destroyed, at which point the sender is dropped.
    ///
    /// Returns once the client accepted the start request; pairing and
    /// readiness are reported asynchronously as [`ClientEvent`]s.
    async fn launch(&self, events: mpsc::Sender<ClientEvent>) -> Result<(), NudgeError>;

    /// Sends a text message to a normalized chat id (`<digits>@c.us`).
    async fn send_text(&self, chat_id: &str, body: &str) -> Result<MessageId, NudgeError>;

    /// Logs the device out remotely, invalidating the linked session.
    async fn logout(&self) -> Result<(), NudgeError>;

    /// Stops the client and releases its resources. Credentials are kept.
    async fn destroy(&self) -> Result<(), NudgeError>;

    /// Deletes persisted credential material.
    async fn purge_credentials(&self) -> Result<(), NudgeError>;

    /// Whether credentials from an earlier pairing are available.
    fn has_persisted_credentials(&self) -> bool;
}
