// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only dispatch attempt log.

use nudge_core::NudgeError;
use nudge_core::types::DispatchAttempt;
use rusqlite::params;

use crate::database::{Database, fmt_ts, map_tr_err, parse_ts};

/// Appends attempt rows. Runs inside the caller's finalize transaction.
pub(crate) fn insert_attempts(
    conn: &rusqlite::Connection,
    attempts: &[DispatchAttempt],
) -> Result<(), rusqlite::Error> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO dispatch_attempts
             (reminder_id, channel, attempted_at, success, error_kind, error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for attempt in attempts {
        stmt.execute(params![
            attempt.reminder_id,
            attempt.channel.to_string(),
            fmt_ts(attempt.attempted_at),
            attempt.success,
            attempt.error_kind,
            attempt.error,
        ])?;
    }
    Ok(())
}

/// All attempts for a reminder, oldest first.
pub async fn list_attempts(
    db: &Database,
    reminder_id: &str,
) -> Result<Vec<DispatchAttempt>, NudgeError> {
    let reminder_id = reminder_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<DispatchAttempt>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT reminder_id, channel, attempted_at, success, error_kind, error
                 FROM dispatch_attempts WHERE reminder_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![reminder_id], |row| {
                let channel: String = row.get(1)?;
                let attempted_at: String = row.get(2)?;
                Ok(DispatchAttempt {
                    reminder_id: row.get(0)?,
                    channel: channel.parse().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?,
                    attempted_at: parse_ts(2, &attempted_at)?,
                    success: row.get(3)?,
                    error_kind: row.get(4)?,
                    error: row.get(5)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
