// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock notification channel for deterministic testing.
//!
//! `MockChannel` implements `NotificationChannel` with scripted outcomes and
//! captured deliveries for assertion in tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use nudge_core::{
    AdapterType, ChannelKind, HealthStatus, MessageId, Notification, NotificationChannel,
    NudgeError, PluginAdapter,
};

type ErrorFactory = Arc<dyn Fn() -> NudgeError + Send + Sync>;

/// One delivery captured by [`MockChannel`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub target: String,
    pub reminder_id: String,
    pub subject: String,
    pub body: String,
}

/// A mock delivery channel for testing.
///
/// Each `send()` consumes the next scripted outcome if one was pushed,
/// otherwise falls back to the standing failure (if set) or succeeds.
/// Only successful sends are recorded in `sent_messages()`; every call is
/// counted in `call_count()`.
pub struct MockChannel {
    kind: ChannelKind,
    outcomes: Mutex<VecDeque<Result<(), NudgeError>>>,
    standing_failure: Mutex<Option<ErrorFactory>>,
    sent: Mutex<Vec<SentNotification>>,
    calls: Mutex<usize>,
}

impl MockChannel {
    /// Create a mock channel that accepts every send.
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            outcomes: Mutex::new(VecDeque::new()),
            standing_failure: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            calls: Mutex::new(0),
        }
    }

    /// Create a channel whose every send fails as "channel unavailable".
    pub fn unavailable(kind: ChannelKind) -> Self {
        let mut channel = Self::new(kind);
        *channel.standing_failure.get_mut() = Some(Arc::new(move || {
            NudgeError::ChannelUnavailable {
                channel: kind,
                message: "mock channel offline".into(),
            }
        }));
        channel
    }

    /// Create a channel that rejects every send permanently.
    pub fn rejecting(kind: ChannelKind) -> Self {
        let mut channel = Self::new(kind);
        *channel.standing_failure.get_mut() = Some(Arc::new(move || {
            NudgeError::DeliveryRejected {
                channel: kind,
                message: "mock channel rejects everything".into(),
            }
        }));
        channel
    }

    /// Queue the outcome of the next send.
    pub async fn push_outcome(&self, outcome: Result<(), NudgeError>) {
        self.outcomes.lock().await.push_back(outcome);
    }

    /// Make every later send fail with errors produced by `make`.
    pub async fn fail_with<F>(&self, make: F)
    where
        F: Fn() -> NudgeError + Send + Sync + 'static,
    {
        *self.standing_failure.lock().await = Some(Arc::new(make));
    }

    /// Make every later send succeed.
    pub async fn recover(&self) {
        *self.standing_failure.lock().await = None;
    }

    /// Get all notifications delivered successfully.
    pub async fn sent_messages(&self) -> Vec<SentNotification> {
        self.sent.lock().await.clone()
    }

    /// Get the count of successful deliveries.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Number of `send()` calls, successful or not.
    pub async fn call_count(&self) -> usize {
        *self.calls.lock().await
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, NudgeError> {
        Ok(match self.standing_failure.lock().await.as_ref() {
            Some(_) => HealthStatus::Unhealthy("scripted failure".into()),
            None => HealthStatus::Healthy,
        })
    }

    async fn shutdown(&self) -> Result<(), NudgeError> {
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for MockChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(
        &self,
        target: &str,
        notification: &Notification,
    ) -> Result<MessageId, NudgeError> {
        *self.calls.lock().await += 1;

        let scripted = self.outcomes.lock().await.pop_front();
        let outcome = match scripted {
            Some(outcome) => outcome,
            None => match self.standing_failure.lock().await.as_ref() {
                Some(make) => Err(make()),
                None => Ok(()),
            },
        };
        outcome?;

        self.sent.lock().await.push(SentNotification {
            target: target.to_string(),
            reminder_id: notification.reminder_id.clone(),
            subject: notification.subject.clone(),
            body: notification.body.clone(),
        });
        Ok(MessageId(format!("mock-msg-{}", uuid::Uuid::new_v4())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(text: &str) -> Notification {
        Notification {
            reminder_id: "r1".into(),
            subject: "Reminder".into(),
            body: text.into(),
        }
    }

    #[tokio::test]
    async fn send_captures_notifications() {
        let channel = MockChannel::new(ChannelKind::Telegram);
        let id = channel.send("12345", &notification("hello")).await.unwrap();
        assert!(id.0.starts_with("mock-msg-"));

        let sent = channel.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, "12345");
        assert_eq!(sent[0].body, "hello");
        assert_eq!(channel.kind(), ChannelKind::Telegram);
    }

    #[tokio::test]
    async fn scripted_outcomes_are_consumed_in_order() {
        let channel = MockChannel::new(ChannelKind::Email);
        channel
            .push_outcome(Err(NudgeError::Timeout {
                duration: std::time::Duration::from_secs(1),
            }))
            .await;

        assert!(channel.send("a@example.com", &notification("x")).await.is_err());
        assert!(channel.send("a@example.com", &notification("x")).await.is_ok());
        assert_eq!(channel.call_count().await, 2);
        assert_eq!(channel.sent_count().await, 1);
    }

    #[tokio::test]
    async fn unavailable_until_recovered() {
        let channel = MockChannel::unavailable(ChannelKind::WhatsApp);
        let err = channel.send("+62812", &notification("x")).await.unwrap_err();
        assert!(matches!(err, NudgeError::ChannelUnavailable { .. }));
        assert!(matches!(
            channel.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));

        channel.recover().await;
        assert!(channel.send("+62812", &notification("x")).await.is_ok());
    }

    #[tokio::test]
    async fn rejecting_channel_fails_permanently() {
        let channel = MockChannel::rejecting(ChannelKind::Email);
        let err = channel.send("x", &notification("x")).await.unwrap_err();
        assert!(!err.is_transient());
    }
}
