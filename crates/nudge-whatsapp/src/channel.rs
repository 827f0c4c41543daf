// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp notification channel backed by the session manager.

use async_trait::async_trait;

use nudge_core::{
    AdapterType, ChannelKind, HealthStatus, MessageId, Notification, NotificationChannel,
    NudgeError, PluginAdapter,
};

use crate::session::SessionManager;

/// Delivers reminders through the linked WhatsApp device.
///
/// Holds a handle to the process-wide [`SessionManager`]; every send goes
/// through its queue.
pub struct WhatsAppChannel {
    session: SessionManager,
}

impl WhatsAppChannel {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }
}

#[async_trait]
impl PluginAdapter for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, NudgeError> {
        Ok(self.session.health())
    }

    async fn shutdown(&self) -> Result<(), NudgeError> {
        self.session.shutdown().await
    }
}

#[async_trait]
impl NotificationChannel for WhatsAppChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::WhatsApp
    }

    async fn send(
        &self,
        target: &str,
        notification: &Notification,
    ) -> Result<MessageId, NudgeError> {
        self.session.send_message(target, &notification.body).await
    }
}
