// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMTP email channel adapter for the Nudge dispatch engine.
//!
//! Implements [`NotificationChannel`] over an async lettre transport. Each
//! reminder is one plain-text message; the relay's reply code decides
//! whether a failure is retried.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use nudge_config::model::EmailConfig;
use nudge_core::{
    AdapterType, ChannelKind, HealthStatus, MessageId, Notification, NotificationChannel,
    NudgeError, PluginAdapter,
};
use tracing::{debug, warn};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Email channel adapter implementing [`NotificationChannel`].
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailChannel {
    /// Creates an adapter for the relay described by `config`.
    ///
    /// Requires `smtp_host` and a parseable `from_address`.
    pub fn new(config: &EmailConfig) -> Result<Self, NudgeError> {
        let host = config
            .smtp_host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| NudgeError::Config("email.smtp_host is required".into()))?;
        let from = parse_sender(config.from_address.as_deref())?;

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        }
        .map_err(|e| NudgeError::Config(format!("invalid SMTP relay `{host}`: {e}")))?;

        let mut builder = builder.port(config.smtp_port).timeout(Some(SMTP_TIMEOUT));
        if let Some(username) = &config.username {
            let password = config.password.clone().unwrap_or_default();
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    /// Creates an adapter over an already configured transport.
    pub fn from_transport(transport: AsyncSmtpTransport<Tokio1Executor>, from: Mailbox) -> Self {
        Self { transport, from }
    }

    fn compose(
        &self,
        to: Mailbox,
        notification: &Notification,
    ) -> Result<(Message, String), NudgeError> {
        let message_id = format!("<{}@nudge>", uuid::Uuid::new_v4());
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notification.subject.clone())
            .message_id(Some(message_id.clone()))
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())
            .map_err(|e| NudgeError::Internal(format!("failed to build email: {e}")))?;
        Ok((message, message_id))
    }
}

fn parse_sender(address: Option<&str>) -> Result<Mailbox, NudgeError> {
    let address = address
        .ok_or_else(|| NudgeError::Config("email.from_address is required".into()))?;
    address
        .parse()
        .map_err(|e| NudgeError::Config(format!("invalid email.from_address `{address}`: {e}")))
}

/// Parses a recipient address.
pub fn parse_recipient(target: &str) -> Result<Mailbox, NudgeError> {
    target
        .trim()
        .parse()
        .map_err(|e| NudgeError::InvalidDestination {
            destination: target.to_string(),
            reason: format!("{e}"),
        })
}

/// Maps an SMTP failure onto the delivery error taxonomy.
///
/// 5xx replies (unknown mailbox, policy rejection) are permanent. 4xx
/// replies, timeouts and connection errors are retried.
fn classify(err: lettre::transport::smtp::Error) -> NudgeError {
    if err.is_permanent() {
        return NudgeError::DeliveryRejected {
            channel: ChannelKind::Email,
            message: err.to_string(),
        };
    }
    NudgeError::Channel {
        message: format!("SMTP delivery failed: {err}"),
        source: Some(Box::new(err)),
    }
}

#[async_trait]
impl PluginAdapter for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, NudgeError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(HealthStatus::Healthy),
            Ok(false) => Ok(HealthStatus::Unhealthy("SMTP relay refused NOOP".into())),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("SMTP relay unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), NudgeError> {
        debug!("email channel shutting down");
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(
        &self,
        target: &str,
        notification: &Notification,
    ) -> Result<MessageId, NudgeError> {
        let to = parse_recipient(target)?;
        let (message, message_id) = self.compose(to, notification)?;

        match self.transport.send(message).await {
            Ok(_) => {
                debug!(
                    reminder_id = %notification.reminder_id,
                    message_id = %message_id,
                    "email reminder delivered"
                );
                Ok(MessageId(message_id))
            }
            Err(e) => {
                let err = classify(e);
                warn!(
                    reminder_id = %notification.reminder_id,
                    error = %err,
                    "email delivery failed"
                );
                Err(err)
            }
        }
    }
}
