// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store fixtures: a throwaway SQLite reminder store plus seeding helpers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use nudge_config::model::StorageConfig;
use nudge_core::{
    ChannelKind, NewReminder, NudgeError, Recipient, Reminder, TaskSnapshot, TaskStatus,
    TriggerType,
};
use nudge_storage::SqliteReminderStore;

/// Organization used by every fixture.
pub const ORG_ID: &str = "org-test";

/// An open task owned by [`ORG_ID`].
pub fn open_task(id: &str) -> TaskSnapshot {
    TaskSnapshot {
        id: id.to_string(),
        organization_id: ORG_ID.to_string(),
        title: format!("Task {id}"),
        due_at: None,
        status: TaskStatus::Open,
        deleted_at: None,
    }
}

/// A recipient reachable on every channel.
pub fn recipient(user_id: &str) -> Recipient {
    Recipient {
        user_id: user_id.to_string(),
        display_name: Some("Test User".to_string()),
        phone: Some("+62 812 3456 7890".to_string()),
        telegram_chat_id: Some("100200300".to_string()),
        email: Some(format!("{user_id}@example.com")),
    }
}

/// A one-shot reminder for `task_id` addressed to `user-1`.
pub fn due_reminder(task_id: &str, at: DateTime<Utc>, channels: &[ChannelKind]) -> NewReminder {
    NewReminder {
        task_id: task_id.to_string(),
        organization_id: ORG_ID.to_string(),
        user_id: "user-1".to_string(),
        trigger_type: TriggerType::DueDate,
        scheduled_at: at,
        channels: channels.to_vec(),
        recurrence: None,
    }
}

/// A reminder store in a temp directory, removed on drop.
pub struct TestStore {
    pub store: Arc<SqliteReminderStore>,
    pub path: String,
    _dir: tempfile::TempDir,
}

impl TestStore {
    pub async fn new() -> Result<Self, NudgeError> {
        let dir = tempfile::TempDir::new().map_err(|e| NudgeError::Storage { source: e.into() })?;
        let path = dir.path().join("test.db").to_string_lossy().to_string();
        let store = SqliteReminderStore::new(StorageConfig {
            database_path: path.clone(),
            wal_mode: true,
        });
        store.initialize().await?;
        Ok(Self {
            store: Arc::new(store),
            path,
            _dir: dir,
        })
    }

    /// Seeds an open task, `user-1` as recipient, and one due reminder.
    pub async fn seed_due(
        &self,
        task_id: &str,
        at: DateTime<Utc>,
        channels: &[ChannelKind],
    ) -> Result<Reminder, NudgeError> {
        self.store.upsert_task(&open_task(task_id)).await?;
        self.store.upsert_recipient(&recipient("user-1")).await?;
        self.store
            .create_reminder(&due_reminder(task_id, at, channels))
            .await
    }

    /// Marks a task deleted, as the task domain would.
    pub async fn delete_task(&self, task_id: &str) -> Result<(), NudgeError> {
        let mut task = open_task(task_id);
        task.deleted_at = Some(Utc::now());
        self.store.upsert_task(&task).await
    }

    pub async fn reminder(&self, id: &str) -> Result<Reminder, NudgeError> {
        self.store
            .get_reminder(id)
            .await?
            .ok_or_else(|| NudgeError::Internal(format!("reminder {id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nudge_core::ReminderStatus;

    #[tokio::test]
    async fn seed_due_creates_pending_reminder() {
        let fixture = TestStore::new().await.unwrap();
        let r = fixture
            .seed_due("t1", Utc::now(), &[ChannelKind::Telegram])
            .await
            .unwrap();
        let stored = fixture.reminder(&r.id).await.unwrap();
        assert_eq!(stored.status, ReminderStatus::Pending);
        assert_eq!(stored.channels, vec![ChannelKind::Telegram]);
    }
}
