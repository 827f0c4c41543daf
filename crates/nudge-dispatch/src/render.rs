// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-text rendering of reminder notifications.
//!
//! Channels that support markup (Telegram) apply their own formatting on
//! top of this text.

use chrono::{DateTime, Utc};
use nudge_core::{Notification, Recipient, Reminder, TaskSnapshot, TriggerType};

const DUE_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Builds the notification sent for `reminder` about `task`.
pub fn render(
    reminder: &Reminder,
    task: &TaskSnapshot,
    recipient: &Recipient,
    service_name: &str,
    now: DateTime<Utc>,
) -> Notification {
    let title = task.title.trim();
    let mut lines = Vec::with_capacity(4);

    if let Some(name) = recipient.display_name.as_deref().filter(|n| !n.trim().is_empty()) {
        lines.push(format!("Hi {},", name.trim()));
    }

    lines.push(match (task.due_at, reminder.trigger_type) {
        (Some(due), _) if due < now => {
            format!("\"{title}\" was due {}.", due.format(DUE_FORMAT))
        }
        (Some(due), _) => format!("\"{title}\" is due {}.", due.format(DUE_FORMAT)),
        (None, TriggerType::Recurring) => format!("Recurring reminder for \"{title}\"."),
        (None, TriggerType::DueDate) => format!("This is a reminder about \"{title}\"."),
    });

    lines.push(format!("Sent by {service_name}."));

    Notification {
        reminder_id: reminder.id.clone(),
        subject: format!("Reminder: {title}"),
        body: lines.join("\n\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nudge_core::{ReminderStatus, TaskStatus};

    fn reminder(trigger_type: TriggerType) -> Reminder {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        Reminder {
            id: "r1".into(),
            task_id: "t1".into(),
            organization_id: "o1".into(),
            user_id: "u1".into(),
            trigger_type,
            scheduled_at: at,
            channels: vec![],
            recurrence: None,
            status: ReminderStatus::Claimed,
            attempts: 0,
            last_attempt_at: None,
            last_error: None,
            claim_token: None,
            claimed_at: None,
            next_attempt_at: None,
            retryable: false,
            created_at: at,
        }
    }

    fn task(due_at: Option<DateTime<Utc>>) -> TaskSnapshot {
        TaskSnapshot {
            id: "t1".into(),
            organization_id: "o1".into(),
            title: " Renew domain ".into(),
            due_at,
            status: TaskStatus::Open,
            deleted_at: None,
        }
    }

    #[test]
    fn upcoming_due_date_is_named() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let due = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let recipient = Recipient {
            user_id: "u1".into(),
            display_name: Some("Ana".into()),
            ..Default::default()
        };

        let n = render(&reminder(TriggerType::DueDate), &task(Some(due)), &recipient, "nudge", now);
        assert_eq!(n.reminder_id, "r1");
        assert_eq!(n.subject, "Reminder: Renew domain");
        assert_eq!(
            n.body,
            "Hi Ana,\n\n\"Renew domain\" is due 2026-03-01 09:30 UTC.\n\nSent by nudge."
        );
    }

    #[test]
    fn overdue_tasks_say_so() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        let due = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let n = render(
            &reminder(TriggerType::DueDate),
            &task(Some(due)),
            &Recipient::default(),
            "nudge",
            now,
        );
        assert!(n.body.starts_with("\"Renew domain\" was due 2026-03-01 09:30 UTC."));
    }

    #[test]
    fn recurring_reminders_without_due_date() {
        let n = render(
            &reminder(TriggerType::Recurring),
            &task(None),
            &Recipient::default(),
            "Acme Tasks",
            Utc::now(),
        );
        assert_eq!(
            n.body,
            "Recurring reminder for \"Renew domain\".\n\nSent by Acme Tasks."
        );
    }
}
