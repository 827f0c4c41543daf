// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification channel trait (WhatsApp, Telegram, email).

use async_trait::async_trait;

use crate::error::NudgeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChannelKind, MessageId, Notification};

/// Uniform send contract implemented once per delivery channel.
///
/// Implementations report each delivery independently. A channel that
/// cannot currently deliver must return [`NudgeError::ChannelUnavailable`]
/// without attempting the send; a channel that refuses the message returns
/// [`NudgeError::DeliveryRejected`].
#[async_trait]
pub trait NotificationChannel: PluginAdapter {
    /// The channel this adapter delivers through.
    fn kind(&self) -> ChannelKind;

    /// Delivers `notification` to `target` (a phone number, chat id, or address).
    async fn send(
        &self,
        target: &str,
        notification: &Notification,
    ) -> Result<MessageId, NudgeError>;
}
