// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the store, the channels, and the dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier returned by a channel for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter in the registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Storage,
    Driver,
}

/// A delivery mechanism for reminders.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Stateful WhatsApp Web session.
    #[strum(serialize = "whatsapp")]
    #[serde(rename = "whatsapp")]
    WhatsApp,
    /// Telegram Bot API.
    Telegram,
    /// SMTP email.
    Email,
}

impl ChannelKind {
    /// All known channels, in default fallback order.
    pub const ALL: [ChannelKind; 3] = [ChannelKind::WhatsApp, ChannelKind::Telegram, ChannelKind::Email];
}

/// Reminder lifecycle status.
///
/// Valid transitions: `Pending -> Claimed -> {Sent | Failed}` and
/// `Pending -> Skipped`. A retryable `Failed` reminder may be claimed again.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
    Claimed,
    Sent,
    Failed,
    Skipped,
}

impl ReminderStatus {
    /// Whether no further dispatch will ever happen from this status alone.
    pub fn is_terminal(self) -> bool {
        matches!(self, ReminderStatus::Sent | ReminderStatus::Skipped)
    }
}

/// What causes a reminder to fire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Fires once, relative to the task's due date.
    DueDate,
    /// Fires on a cron schedule; each occurrence is its own reminder row.
    Recurring,
}

/// A scheduled notification tied to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub task_id: String,
    pub organization_id: String,
    /// User whose contact details receive the notification.
    pub user_id: String,
    pub trigger_type: TriggerType,
    pub scheduled_at: DateTime<Utc>,
    /// Preferred channels. Empty means "use the configured default".
    pub channels: Vec<ChannelKind>,
    /// Cron expression for recurring reminders.
    pub recurrence: Option<String>,
    pub status: ReminderStatus,
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Lease token held while `Claimed`. Terminal writes must present it.
    pub claim_token: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    /// Earliest time a retryable failure may be claimed again.
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub retryable: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a reminder (from the task domain or a recurrence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReminder {
    pub task_id: String,
    pub organization_id: String,
    pub user_id: String,
    pub trigger_type: TriggerType,
    pub scheduled_at: DateTime<Utc>,
    pub channels: Vec<ChannelKind>,
    pub recurrence: Option<String>,
}

/// One per-channel delivery outcome, appended to the attempt log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchAttempt {
    pub reminder_id: String,
    pub channel: ChannelKind,
    pub attempted_at: DateTime<Utc>,
    pub success: bool,
    /// Machine-readable error class (see `NudgeError::kind`).
    pub error_kind: Option<String>,
    pub error: Option<String>,
}

/// How a failed reminder should be finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureDisposition {
    /// Summary stored as the reminder's `last_error`.
    pub error: String,
    /// `Some` when the failure is retryable; the reminder becomes claimable again then.
    pub retry_at: Option<DateTime<Utc>>,
}

/// Open/closed state of a task as seen by the dispatcher.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Open,
    Completed,
}

/// The slice of a task the dispatcher needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: String,
    pub organization_id: String,
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TaskSnapshot {
    /// Whether reminders for this task should still be delivered.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none() && self.status == TaskStatus::Open
    }
}

/// Per-user contact details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: String,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub email: Option<String>,
}

impl Recipient {
    /// The destination address for `channel`, if the user has one.
    pub fn address_for(&self, channel: ChannelKind) -> Option<&str> {
        let addr = match channel {
            ChannelKind::WhatsApp => self.phone.as_deref(),
            ChannelKind::Telegram => self.telegram_chat_id.as_deref(),
            ChannelKind::Email => self.email.as_deref(),
        };
        addr.filter(|a| !a.trim().is_empty())
    }
}

/// A rendered notification, ready for any channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub reminder_id: String,
    /// Used by channels with a subject line (email).
    pub subject: String,
    pub body: String,
}

/// Status of the stateful chat session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Disconnected,
    Initializing,
    QrPending,
    Connected,
    AuthFailure,
    LoggedOut,
}

impl SessionStatus {
    /// Statuses during which a bring-up is already in flight or complete.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionStatus::Initializing | SessionStatus::QrPending | SessionStatus::Connected
        )
    }
}

/// Point-in-time view of the chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    /// Only present while `QrPending`.
    pub qr: Option<String>,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            status: SessionStatus::Disconnected,
            qr: None,
            last_connected_at: None,
            last_error: None,
        }
    }
}

/// Lifecycle event emitted by a [`ChatDriver`](crate::traits::ChatDriver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A pairing code to render as a QR image. Replaces any earlier code.
    Qr(String),
    /// Credentials were accepted; readiness follows.
    Authenticated,
    /// The client can send messages.
    Ready,
    /// Credentials were rejected.
    AuthFailure(String),
    /// The connection dropped. `logged_out` is set when the device was
    /// unlinked remotely, which invalidates the persisted credentials.
    Disconnected { reason: String, logged_out: bool },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn channel_kind_parses_case_insensitively() {
        assert_eq!(ChannelKind::from_str("whatsapp").unwrap(), ChannelKind::WhatsApp);
        assert_eq!(ChannelKind::from_str("Telegram").unwrap(), ChannelKind::Telegram);
        assert_eq!(ChannelKind::WhatsApp.to_string(), "whatsapp");
        assert!(ChannelKind::from_str("sms").is_err());
    }

    #[test]
    fn channel_kind_serde_uses_lowercase() {
        let json = serde_json::to_string(&vec![ChannelKind::WhatsApp, ChannelKind::Email]).unwrap();
        assert_eq!(json, r#"["whatsapp","email"]"#);
    }

    #[test]
    fn session_status_renders_screaming_case() {
        assert_eq!(SessionStatus::QrPending.to_string(), "QR_PENDING");
        assert_eq!(
            serde_json::to_string(&SessionStatus::AuthFailure).unwrap(),
            r#""AUTH_FAILURE""#
        );
        assert!(SessionStatus::QrPending.is_active());
        assert!(!SessionStatus::LoggedOut.is_active());
    }

    #[test]
    fn recipient_address_ignores_blank_values() {
        let r = Recipient {
            user_id: "u1".into(),
            phone: Some("  ".into()),
            email: Some("a@example.com".into()),
            ..Default::default()
        };
        assert_eq!(r.address_for(ChannelKind::WhatsApp), None);
        assert_eq!(r.address_for(ChannelKind::Email), Some("a@example.com"));
        assert_eq!(r.address_for(ChannelKind::Telegram), None);
    }

    #[test]
    fn task_activity() {
        let mut task = TaskSnapshot {
            id: "t1".into(),
            organization_id: "o1".into(),
            title: "Ship".into(),
            due_at: None,
            status: TaskStatus::Open,
            deleted_at: None,
        };
        assert!(task.is_active());
        task.status = TaskStatus::Completed;
        assert!(!task.is_active());
        task.status = TaskStatus::Open;
        task.deleted_at = Some(Utc::now());
        assert!(!task.is_active());
    }

    #[test]
    fn status_string_round_trip() {
        for status in [
            ReminderStatus::Pending,
            ReminderStatus::Claimed,
            ReminderStatus::Sent,
            ReminderStatus::Failed,
            ReminderStatus::Skipped,
        ] {
            let parsed = ReminderStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(parsed, status);
        }
        assert!(ReminderStatus::Sent.is_terminal());
        assert!(!ReminderStatus::Failed.is_terminal());
    }
}
