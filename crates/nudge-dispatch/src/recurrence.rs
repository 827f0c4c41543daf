// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Next-occurrence computation for recurring reminders.

use chrono::{DateTime, Utc};
use croner::Cron;
use nudge_core::{NewReminder, NudgeError, Reminder, TriggerType};
use tracing::warn;

/// Parses `expr` as a cron expression.
pub fn parse(expr: &str) -> Result<Cron, NudgeError> {
    expr.trim()
        .parse()
        .map_err(|e| NudgeError::Config(format!("invalid recurrence `{expr}`: {e}")))
}

/// First occurrence of `expr` strictly after `after`.
pub fn next_occurrence(expr: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>, NudgeError> {
    parse(expr)?
        .find_next_occurrence(&after, false)
        .map_err(|e| NudgeError::Config(format!("recurrence `{expr}` has no next occurrence: {e}")))
}

/// The reminder that follows `reminder` once it is finished, if any.
///
/// The next occurrence is taken after both the finished occurrence and
/// `now`, so a reminder that ran late does not queue up missed occurrences.
/// An unusable expression ends the series with a warning.
pub fn next_reminder(reminder: &Reminder, now: DateTime<Utc>) -> Option<NewReminder> {
    if reminder.trigger_type != TriggerType::Recurring {
        return None;
    }
    let expr = reminder.recurrence.as_deref()?;
    let anchor = reminder.scheduled_at.max(now);

    match next_occurrence(expr, anchor) {
        Ok(scheduled_at) => Some(NewReminder {
            task_id: reminder.task_id.clone(),
            organization_id: reminder.organization_id.clone(),
            user_id: reminder.user_id.clone(),
            trigger_type: TriggerType::Recurring,
            scheduled_at,
            channels: reminder.channels.clone(),
            recurrence: Some(expr.to_string()),
        }),
        Err(e) => {
            warn!(reminder_id = %reminder.id, error = %e, "recurrence ended");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nudge_core::ReminderStatus;

    fn recurring(expr: Option<&str>, at: DateTime<Utc>) -> Reminder {
        Reminder {
            id: "r1".into(),
            task_id: "t1".into(),
            organization_id: "o1".into(),
            user_id: "u1".into(),
            trigger_type: TriggerType::Recurring,
            scheduled_at: at,
            channels: vec![nudge_core::ChannelKind::Email],
            recurrence: expr.map(String::from),
            status: ReminderStatus::Claimed,
            attempts: 1,
            last_attempt_at: None,
            last_error: None,
            claim_token: None,
            claimed_at: None,
            next_attempt_at: None,
            retryable: false,
            created_at: at,
        }
    }

    #[test]
    fn daily_schedule_advances_one_day() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let next = next_reminder(&recurring(Some("0 9 * * *"), at), at).unwrap();
        assert_eq!(next.scheduled_at, Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
        assert_eq!(next.recurrence.as_deref(), Some("0 9 * * *"));
        assert_eq!(next.channels, vec![nudge_core::ChannelKind::Email]);
    }

    #[test]
    fn late_runs_skip_missed_occurrences() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap();
        let next = next_reminder(&recurring(Some("0 9 * * *"), at), now).unwrap();
        assert_eq!(next.scheduled_at, Utc.with_ymd_and_hms(2026, 3, 6, 9, 0, 0).unwrap());
    }

    #[test]
    fn one_shot_and_broken_series_end() {
        let at = Utc::now();
        let mut one_shot = recurring(Some("0 9 * * *"), at);
        one_shot.trigger_type = TriggerType::DueDate;
        assert!(next_reminder(&one_shot, at).is_none());
        assert!(next_reminder(&recurring(None, at), at).is_none());
        assert!(next_reminder(&recurring(Some("every tuesday"), at), at).is_none());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse("*/5 * * * *").is_ok());
        assert!(matches!(parse("61 * * * *"), Err(NudgeError::Config(_))));
    }
}
