// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task and recipient projections written by the task domain.

use chrono::Utc;
use nudge_core::NudgeError;
use nudge_core::types::{Recipient, TaskSnapshot};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, fmt_ts, map_tr_err, parse_opt_ts};

/// Insert or replace a task snapshot.
pub async fn upsert_task(db: &Database, task: &TaskSnapshot) -> Result<(), NudgeError> {
    let task = task.clone();
    let now = fmt_ts(Utc::now());
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO tasks (id, organization_id, title, due_at, status, deleted_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (id) DO UPDATE SET
                     organization_id = excluded.organization_id,
                     title = excluded.title,
                     due_at = excluded.due_at,
                     status = excluded.status,
                     deleted_at = excluded.deleted_at,
                     updated_at = excluded.updated_at",
                params![
                    task.id,
                    task.organization_id,
                    task.title,
                    task.due_at.map(fmt_ts),
                    task.status.to_string(),
                    task.deleted_at.map(fmt_ts),
                    now,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a task snapshot by id.
pub async fn get_task(db: &Database, id: &str) -> Result<Option<TaskSnapshot>, NudgeError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, organization_id, title, due_at, status, deleted_at
                 FROM tasks WHERE id = ?1",
                params![id],
                |row| {
                    let status: String = row.get(4)?;
                    Ok(TaskSnapshot {
                        id: row.get(0)?,
                        organization_id: row.get(1)?,
                        title: row.get(2)?,
                        due_at: parse_opt_ts(3, row.get(3)?)?,
                        status: status.parse().map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                4,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?,
                        deleted_at: parse_opt_ts(5, row.get(5)?)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or replace a recipient's contact details.
pub async fn upsert_recipient(db: &Database, recipient: &Recipient) -> Result<(), NudgeError> {
    let r = recipient.clone();
    let now = fmt_ts(Utc::now());
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO recipients (user_id, display_name, phone, telegram_chat_id, email, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (user_id) DO UPDATE SET
                     display_name = excluded.display_name,
                     phone = excluded.phone,
                     telegram_chat_id = excluded.telegram_chat_id,
                     email = excluded.email,
                     updated_at = excluded.updated_at",
                params![r.user_id, r.display_name, r.phone, r.telegram_chat_id, r.email, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a recipient by user id.
pub async fn get_recipient(db: &Database, user_id: &str) -> Result<Option<Recipient>, NudgeError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT user_id, display_name, phone, telegram_chat_id, email
                 FROM recipients WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(Recipient {
                        user_id: row.get(0)?,
                        display_name: row.get(1)?,
                        phone: row.get(2)?,
                        telegram_chat_id: row.get(3)?,
                        email: row.get(4)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
