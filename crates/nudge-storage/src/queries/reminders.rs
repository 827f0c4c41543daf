// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reminder lifecycle queries: create, find due, claim, finalize.
//!
//! Every state transition is one conditional `UPDATE` scoped to a single
//! row. Terminal writes additionally require the claim token handed out by
//! [`try_claim`], so a tick whose lease was reclaimed cannot overwrite the
//! outcome of the tick that took over.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use nudge_core::NudgeError;
use nudge_core::types::{
    ChannelKind, DispatchAttempt, FailureDisposition, NewReminder, Reminder, ReminderStatus,
};
use rusqlite::{OptionalExtension, named_params, params};
use serde::Serialize;

use crate::database::{Database, fmt_ts, map_tr_err, parse_opt_ts, parse_ts};
use crate::queries::attempts::insert_attempts;

const COLUMNS: &str = "id, task_id, organization_id, user_id, trigger_type, scheduled_at,
    channels, recurrence, status, attempts, last_attempt_at, last_error, claim_token,
    claimed_at, next_attempt_at, retryable, created_at";

/// Rows a tick may claim: fresh pending work, retryable failures whose
/// backoff elapsed, and claims whose lease expired.
const CLAIMABLE: &str = "(status = 'pending' AND scheduled_at <= :now)
    OR (status = 'failed' AND retryable = 1 AND next_attempt_at IS NOT NULL
        AND next_attempt_at <= :now)
    OR (status = 'claimed' AND claimed_at <= :cutoff)";

/// Number of reminders in one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: ReminderStatus,
    pub count: u64,
}

fn parse_enum<T>(idx: usize, raw: &str) -> Result<T, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn reminder_from_row(row: &rusqlite::Row<'_>) -> Result<Reminder, rusqlite::Error> {
    let channels: String = row.get(6)?;
    let channels: Vec<ChannelKind> = serde_json::from_str(&channels).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let trigger_type: String = row.get(4)?;
    let status: String = row.get(8)?;
    let scheduled_at: String = row.get(5)?;
    let created_at: String = row.get(16)?;

    Ok(Reminder {
        id: row.get(0)?,
        task_id: row.get(1)?,
        organization_id: row.get(2)?,
        user_id: row.get(3)?,
        trigger_type: parse_enum(4, &trigger_type)?,
        scheduled_at: parse_ts(5, &scheduled_at)?,
        channels,
        recurrence: row.get(7)?,
        status: parse_enum(8, &status)?,
        attempts: row.get(9)?,
        last_attempt_at: parse_opt_ts(10, row.get(10)?)?,
        last_error: row.get(11)?,
        claim_token: row.get(12)?,
        claimed_at: parse_opt_ts(13, row.get(13)?)?,
        next_attempt_at: parse_opt_ts(14, row.get(14)?)?,
        retryable: row.get(15)?,
        created_at: parse_ts(16, &created_at)?,
    })
}

/// Inserts a reminder unless the same occurrence already exists.
///
/// Returns the id of the row for that occurrence, new or existing.
pub(crate) fn insert_reminder(
    conn: &rusqlite::Connection,
    new: &NewReminder,
    now: DateTime<Utc>,
) -> Result<String, rusqlite::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let channels = serde_json::to_string(&new.channels)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    let now = fmt_ts(now);
    let scheduled_at = fmt_ts(new.scheduled_at);
    let trigger_type = new.trigger_type.to_string();

    conn.execute(
        "INSERT INTO reminders (id, task_id, organization_id, user_id, trigger_type,
             scheduled_at, channels, recurrence, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9, ?9)
         ON CONFLICT (task_id, user_id, trigger_type, scheduled_at) DO NOTHING",
        params![
            id,
            new.task_id,
            new.organization_id,
            new.user_id,
            trigger_type,
            scheduled_at,
            channels,
            new.recurrence,
            now,
        ],
    )?;

    conn.query_row(
        "SELECT id FROM reminders
         WHERE task_id = ?1 AND user_id = ?2 AND trigger_type = ?3 AND scheduled_at = ?4",
        params![new.task_id, new.user_id, trigger_type, scheduled_at],
        |row| row.get(0),
    )
}

/// Creates a PENDING reminder. Saving the same occurrence twice is a no-op.
pub async fn create_reminder(db: &Database, new: &NewReminder) -> Result<Reminder, NudgeError> {
    let new = new.clone();
    db.connection()
        .call(move |conn| -> Result<Reminder, rusqlite::Error> {
            let id = insert_reminder(conn, &new, Utc::now())?;
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM reminders WHERE id = ?1"),
                params![id],
                reminder_from_row,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a reminder by id.
pub async fn get_reminder(db: &Database, id: &str) -> Result<Option<Reminder>, NudgeError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM reminders WHERE id = ?1"),
                params![id],
                reminder_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Reminders that [`try_claim`] would currently accept.
///
/// Stale claims come first, then everything else by scheduled time, oldest
/// first. Reading is not claiming: callers must still win `try_claim`.
pub async fn find_due(
    db: &Database,
    now: DateTime<Utc>,
    lease_cutoff: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<Reminder>, NudgeError> {
    let now = fmt_ts(now);
    let cutoff = fmt_ts(lease_cutoff);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| -> Result<Vec<Reminder>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM reminders
                 WHERE {CLAIMABLE}
                 ORDER BY CASE WHEN status = 'claimed' THEN 0 ELSE 1 END, scheduled_at ASC
                 LIMIT :limit"
            ))?;
            let rows = stmt.query_map(
                named_params! { ":now": now, ":cutoff": cutoff, ":limit": limit },
                reminder_from_row,
            )?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically moves one reminder into CLAIMED under a fresh claim token.
///
/// Returns `None` when the row is no longer claimable, which is how the
/// loser of a race between overlapping ticks finds out.
pub async fn try_claim(
    db: &Database,
    id: &str,
    now: DateTime<Utc>,
    lease_cutoff: DateTime<Utc>,
) -> Result<Option<Reminder>, NudgeError> {
    let id = id.to_string();
    let token = uuid::Uuid::new_v4().to_string();
    let now = fmt_ts(now);
    let cutoff = fmt_ts(lease_cutoff);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "UPDATE reminders
                     SET status = 'claimed', claim_token = :token, claimed_at = :now,
                         updated_at = :now
                     WHERE id = :id AND ({CLAIMABLE})
                     RETURNING {COLUMNS}"
                ),
                named_params! { ":id": id, ":token": token, ":now": now, ":cutoff": cutoff },
                reminder_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

fn last_attempt_time(attempts: &[DispatchAttempt]) -> String {
    fmt_ts(
        attempts
            .iter()
            .map(|a| a.attempted_at)
            .max()
            .unwrap_or_else(Utc::now),
    )
}

/// CLAIMED -> SENT, with the attempt log and the next recurrence, atomically.
///
/// Returns `false` when the claim was lost; nothing is written in that case.
pub async fn mark_sent(
    db: &Database,
    id: &str,
    claim_token: &str,
    attempts: &[DispatchAttempt],
    next: Option<&NewReminder>,
) -> Result<bool, NudgeError> {
    let id = id.to_string();
    let claim_token = claim_token.to_string();
    let attempts = attempts.to_vec();
    let next = next.cloned();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let at = last_attempt_time(&attempts);
            let changed = tx.execute(
                "UPDATE reminders
                 SET status = 'sent', attempts = attempts + 1, last_attempt_at = ?3,
                     last_error = NULL, claim_token = NULL, claimed_at = NULL,
                     next_attempt_at = NULL, updated_at = ?3
                 WHERE id = ?1 AND status = 'claimed' AND claim_token = ?2",
                params![id, claim_token, at],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            insert_attempts(&tx, &attempts)?;
            if let Some(next) = &next {
                insert_reminder(&tx, next, Utc::now())?;
            }
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

/// CLAIMED -> FAILED, retryable or terminal depending on `disposition`.
///
/// The next recurrence is only scheduled by callers on terminal failures.
/// Returns `false` when the claim was lost.
pub async fn mark_failed(
    db: &Database,
    id: &str,
    claim_token: &str,
    attempts: &[DispatchAttempt],
    disposition: &FailureDisposition,
    next: Option<&NewReminder>,
) -> Result<bool, NudgeError> {
    let id = id.to_string();
    let claim_token = claim_token.to_string();
    let attempts = attempts.to_vec();
    let error = disposition.error.clone();
    let retry_at = disposition.retry_at.map(fmt_ts);
    let next = next.cloned();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let at = last_attempt_time(&attempts);
            let changed = tx.execute(
                "UPDATE reminders
                 SET status = 'failed', attempts = attempts + 1, last_attempt_at = ?3,
                     last_error = ?4, retryable = ?5, next_attempt_at = ?6,
                     claim_token = NULL, claimed_at = NULL, updated_at = ?3
                 WHERE id = ?1 AND status = 'claimed' AND claim_token = ?2",
                params![id, claim_token, at, error, retry_at.is_some(), retry_at],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            insert_attempts(&tx, &attempts)?;
            if let Some(next) = &next {
                insert_reminder(&tx, next, Utc::now())?;
            }
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

/// Moves a reminder to SKIPPED.
///
/// With a claim token the reminder must be held by that claim (the task was
/// found inactive after claiming). Without one only a PENDING reminder moves.
pub async fn mark_skipped(
    db: &Database,
    id: &str,
    claim_token: Option<&str>,
) -> Result<bool, NudgeError> {
    let id = id.to_string();
    let claim_token = claim_token.map(str::to_string);
    let now = fmt_ts(Utc::now());
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = match claim_token {
                Some(token) => conn.execute(
                    "UPDATE reminders
                     SET status = 'skipped', claim_token = NULL, claimed_at = NULL,
                         updated_at = ?3
                     WHERE id = ?1 AND status = 'claimed' AND claim_token = ?2",
                    params![id, token, now],
                )?,
                None => conn.execute(
                    "UPDATE reminders SET status = 'skipped', updated_at = ?2
                     WHERE id = ?1 AND status = 'pending'",
                    params![id, now],
                )?,
            };
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Skips due PENDING reminders whose task is gone, deleted or completed.
pub async fn skip_orphaned_due(db: &Database, now: DateTime<Utc>) -> Result<u64, NudgeError> {
    let now = fmt_ts(now);
    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE reminders SET status = 'skipped', updated_at = ?1
                 WHERE status = 'pending' AND scheduled_at <= ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM tasks t
                       WHERE t.id = reminders.task_id
                         AND t.status = 'open' AND t.deleted_at IS NULL
                   )",
                params![now],
            )?;
            Ok(changed as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Cancels every PENDING reminder of a task. Used when the task is deleted or completed.
pub async fn skip_for_task(db: &Database, task_id: &str) -> Result<u64, NudgeError> {
    let task_id = task_id.to_string();
    let now = fmt_ts(Utc::now());
    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE reminders SET status = 'skipped', updated_at = ?2
                 WHERE task_id = ?1 AND status = 'pending'",
                params![task_id, now],
            )?;
            Ok(changed as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Reminder counts grouped by status, for the status commands.
pub async fn counts_by_status(db: &Database) -> Result<Vec<StatusCount>, NudgeError> {
    db.connection()
        .call(|conn| -> Result<Vec<StatusCount>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM reminders GROUP BY status ORDER BY status",
            )?;
            let rows = stmt.query_map([], |row| {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok(StatusCount {
                    status: parse_enum(0, &status)?,
                    count: count.max(0) as u64,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::attempts::list_attempts;
    use crate::queries::tasks::upsert_task;
    use chrono::Duration;
    use nudge_core::types::{TaskSnapshot, TaskStatus, TriggerType};
    use tempfile::tempdir;

    async fn setup() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn task(id: &str) -> TaskSnapshot {
        TaskSnapshot {
            id: id.into(),
            organization_id: "org-1".into(),
            title: "File the quarterly report".into(),
            due_at: None,
            status: TaskStatus::Open,
            deleted_at: None,
        }
    }

    fn new_reminder(task_id: &str, at: DateTime<Utc>) -> NewReminder {
        NewReminder {
            task_id: task_id.into(),
            organization_id: "org-1".into(),
            user_id: "user-1".into(),
            trigger_type: TriggerType::DueDate,
            scheduled_at: at,
            channels: vec![ChannelKind::WhatsApp, ChannelKind::Email],
            recurrence: None,
        }
    }

    fn attempt(id: &str, success: bool) -> DispatchAttempt {
        DispatchAttempt {
            reminder_id: id.into(),
            channel: ChannelKind::WhatsApp,
            attempted_at: Utc::now(),
            success,
            error_kind: (!success).then(|| "unavailable".to_string()),
            error: (!success).then(|| "session not connected".to_string()),
        }
    }

    #[tokio::test]
    async fn create_is_idempotent_per_occurrence() {
        let (db, _dir) = setup().await;
        let at = Utc::now();
        let first = create_reminder(&db, &new_reminder("t1", at)).await.unwrap();
        let second = create_reminder(&db, &new_reminder("t1", at)).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.status, ReminderStatus::Pending);
        assert_eq!(first.channels, vec![ChannelKind::WhatsApp, ChannelKind::Email]);
    }

    #[tokio::test]
    async fn future_reminders_are_not_due() {
        let (db, _dir) = setup().await;
        let now = Utc::now();
        create_reminder(&db, &new_reminder("t1", now + Duration::hours(1)))
            .await
            .unwrap();
        let due = find_due(&db, now, now - Duration::minutes(5), 10).await.unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn find_due_orders_oldest_first() {
        let (db, _dir) = setup().await;
        let now = Utc::now();
        let late = create_reminder(&db, &new_reminder("t1", now - Duration::minutes(1)))
            .await
            .unwrap();
        let early = create_reminder(&db, &new_reminder("t2", now - Duration::minutes(30)))
            .await
            .unwrap();
        let due = find_due(&db, now, now - Duration::minutes(5), 10).await.unwrap();
        let ids: Vec<_> = due.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![early.id.as_str(), late.id.as_str()]);
    }

    #[tokio::test]
    async fn second_claim_loses() {
        let (db, _dir) = setup().await;
        let now = Utc::now();
        let r = create_reminder(&db, &new_reminder("t1", now)).await.unwrap();
        let cutoff = now - Duration::minutes(5);

        let first = try_claim(&db, &r.id, now, cutoff).await.unwrap();
        let second = try_claim(&db, &r.id, now, cutoff).await.unwrap();
        let claimed = first.expect("first claim wins");
        assert_eq!(claimed.status, ReminderStatus::Claimed);
        assert!(claimed.claim_token.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn expired_lease_is_reclaimable_with_new_token() {
        let (db, _dir) = setup().await;
        let t0 = Utc::now() - Duration::minutes(10);
        let r = create_reminder(&db, &new_reminder("t1", t0)).await.unwrap();
        let stale = try_claim(&db, &r.id, t0, t0 - Duration::minutes(5))
            .await
            .unwrap()
            .unwrap();

        let now = Utc::now();
        let cutoff = now - Duration::minutes(5);
        let due = find_due(&db, now, cutoff, 10).await.unwrap();
        assert_eq!(due.len(), 1);
        let fresh = try_claim(&db, &r.id, now, cutoff).await.unwrap().unwrap();
        assert_ne!(fresh.claim_token, stale.claim_token);

        // The crashed tick wakes up late and must not overwrite the new claim.
        let stale_token = stale.claim_token.unwrap();
        let lost = mark_sent(&db, &r.id, &stale_token, &[attempt(&r.id, true)], None)
            .await
            .unwrap();
        assert!(!lost);
        assert!(list_attempts(&db, &r.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sent_reminders_are_never_due_again() {
        let (db, _dir) = setup().await;
        let now = Utc::now();
        let cutoff = now - Duration::minutes(5);
        let r = create_reminder(&db, &new_reminder("t1", now)).await.unwrap();
        let claimed = try_claim(&db, &r.id, now, cutoff).await.unwrap().unwrap();
        let token = claimed.claim_token.unwrap();
        assert!(
            mark_sent(&db, &r.id, &token, &[attempt(&r.id, true)], None)
                .await
                .unwrap()
        );

        let later = now + Duration::days(1);
        assert!(find_due(&db, later, later, 10).await.unwrap().is_empty());
        assert!(try_claim(&db, &r.id, later, later).await.unwrap().is_none());

        let stored = get_reminder(&db, &r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Sent);
        assert_eq!(stored.attempts, 1);
        assert!(stored.claim_token.is_none());
    }

    #[tokio::test]
    async fn retryable_failure_becomes_due_after_backoff() {
        let (db, _dir) = setup().await;
        let now = Utc::now();
        let cutoff = now - Duration::minutes(5);
        let r = create_reminder(&db, &new_reminder("t1", now)).await.unwrap();
        let token = try_claim(&db, &r.id, now, cutoff)
            .await
            .unwrap()
            .unwrap()
            .claim_token
            .unwrap();
        let retry_at = now + Duration::minutes(1);
        let disposition = FailureDisposition {
            error: "whatsapp channel unavailable".into(),
            retry_at: Some(retry_at),
        };
        assert!(
            mark_failed(&db, &r.id, &token, &[attempt(&r.id, false)], &disposition, None)
                .await
                .unwrap()
        );

        assert!(find_due(&db, now, cutoff, 10).await.unwrap().is_empty());
        let later = retry_at + Duration::seconds(1);
        let due = find_due(&db, later, later - Duration::minutes(5), 10)
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].status, ReminderStatus::Failed);
        assert_eq!(due[0].attempts, 1);
        assert!(due[0].retryable);
    }

    #[tokio::test]
    async fn permanent_failure_is_never_due() {
        let (db, _dir) = setup().await;
        let now = Utc::now();
        let r = create_reminder(&db, &new_reminder("t1", now)).await.unwrap();
        let token = try_claim(&db, &r.id, now, now)
            .await
            .unwrap()
            .unwrap()
            .claim_token
            .unwrap();
        let disposition = FailureDisposition {
            error: "invalid destination".into(),
            retry_at: None,
        };
        mark_failed(&db, &r.id, &token, &[attempt(&r.id, false)], &disposition, None)
            .await
            .unwrap();

        let later = now + Duration::days(1);
        assert!(find_due(&db, later, later, 10).await.unwrap().is_empty());
        let stored = get_reminder(&db, &r.id).await.unwrap().unwrap();
        assert!(!stored.retryable);
        assert_eq!(stored.last_error.as_deref(), Some("invalid destination"));
    }

    #[tokio::test]
    async fn mark_sent_schedules_next_occurrence_once() {
        let (db, _dir) = setup().await;
        let now = Utc::now();
        let r = create_reminder(&db, &new_reminder("t1", now)).await.unwrap();
        let token = try_claim(&db, &r.id, now, now)
            .await
            .unwrap()
            .unwrap()
            .claim_token
            .unwrap();
        let next = new_reminder("t1", now + Duration::days(1));
        mark_sent(&db, &r.id, &token, &[attempt(&r.id, true)], Some(&next))
            .await
            .unwrap();
        // Recreating the same occurrence does not duplicate it.
        create_reminder(&db, &next).await.unwrap();

        let counts = counts_by_status(&db).await.unwrap();
        assert!(counts.contains(&StatusCount {
            status: ReminderStatus::Pending,
            count: 1
        }));
        assert!(counts.contains(&StatusCount {
            status: ReminderStatus::Sent,
            count: 1
        }));
    }

    #[tokio::test]
    async fn orphaned_due_reminders_are_skipped() {
        let (db, _dir) = setup().await;
        let now = Utc::now();
        upsert_task(&db, &task("live")).await.unwrap();
        let mut deleted = task("gone");
        deleted.deleted_at = Some(now - Duration::hours(1));
        upsert_task(&db, &deleted).await.unwrap();

        let keep = create_reminder(&db, &new_reminder("live", now)).await.unwrap();
        let drop = create_reminder(&db, &new_reminder("gone", now)).await.unwrap();
        let unknown = create_reminder(&db, &new_reminder("never-synced", now))
            .await
            .unwrap();

        assert_eq!(skip_orphaned_due(&db, now).await.unwrap(), 2);
        let status = |id: String| {
            let db = db.clone();
            async move { get_reminder(&db, &id).await.unwrap().unwrap().status }
        };
        assert_eq!(status(keep.id).await, ReminderStatus::Pending);
        assert_eq!(status(drop.id.clone()).await, ReminderStatus::Skipped);
        assert_eq!(status(unknown.id).await, ReminderStatus::Skipped);
        assert!(list_attempts(&db, &drop.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn skip_requires_matching_state() {
        let (db, _dir) = setup().await;
        let now = Utc::now();
        let pending = create_reminder(&db, &new_reminder("t1", now)).await.unwrap();
        assert!(mark_skipped(&db, &pending.id, None).await.unwrap());
        assert!(!mark_skipped(&db, &pending.id, None).await.unwrap());

        let claimed = create_reminder(&db, &new_reminder("t2", now)).await.unwrap();
        let token = try_claim(&db, &claimed.id, now, now)
            .await
            .unwrap()
            .unwrap()
            .claim_token
            .unwrap();
        assert!(!mark_skipped(&db, &claimed.id, None).await.unwrap());
        assert!(!mark_skipped(&db, &claimed.id, Some("other")).await.unwrap());
        assert!(mark_skipped(&db, &claimed.id, Some(&token)).await.unwrap());
    }

    #[tokio::test]
    async fn skip_for_task_only_touches_pending() {
        let (db, _dir) = setup().await;
        let now = Utc::now();
        create_reminder(&db, &new_reminder("t1", now)).await.unwrap();
        create_reminder(&db, &new_reminder("t1", now + Duration::hours(1)))
            .await
            .unwrap();
        let sent = create_reminder(&db, &new_reminder("t1", now - Duration::hours(1)))
            .await
            .unwrap();
        let token = try_claim(&db, &sent.id, now, now)
            .await
            .unwrap()
            .unwrap()
            .claim_token
            .unwrap();
        mark_sent(&db, &sent.id, &token, &[attempt(&sent.id, true)], None)
            .await
            .unwrap();

        assert_eq!(skip_for_task(&db, "t1").await.unwrap(), 2);
        let stored = get_reminder(&db, &sent.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Sent);
    }
}
