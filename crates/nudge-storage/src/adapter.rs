// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the ReminderStore trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use nudge_config::model::StorageConfig;
use nudge_core::types::{
    DispatchAttempt, FailureDisposition, NewReminder, Recipient, Reminder, TaskSnapshot,
};
use nudge_core::{AdapterType, HealthStatus, NudgeError, PluginAdapter, ReminderStore};

use crate::database::Database;
use crate::queries;
use crate::queries::reminders::StatusCount;

/// SQLite-backed reminder store.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
/// The database is opened on [`SqliteReminderStore::initialize`].
pub struct SqliteReminderStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteReminderStore {
    /// Create a store for the given configuration. Nothing is opened yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already opened database.
    pub fn from_database(db: Database) -> Self {
        Self {
            config: StorageConfig::default(),
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// Open the database and apply migrations.
    pub async fn initialize(&self) -> Result<(), NudgeError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| NudgeError::Storage {
            source: "reminder store already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "reminder store initialized");
        Ok(())
    }

    fn db(&self) -> Result<&Database, NudgeError> {
        self.db.get().ok_or_else(|| NudgeError::Storage {
            source: "reminder store not initialized -- call initialize() first".into(),
        })
    }

    // --- Task domain hooks ---

    /// Schedule a reminder. Saving the same occurrence twice returns the existing row.
    pub async fn create_reminder(&self, new: &NewReminder) -> Result<Reminder, NudgeError> {
        queries::reminders::create_reminder(self.db()?, new).await
    }

    pub async fn get_reminder(&self, id: &str) -> Result<Option<Reminder>, NudgeError> {
        queries::reminders::get_reminder(self.db()?, id).await
    }

    /// Cancel a task's pending reminders.
    pub async fn skip_for_task(&self, task_id: &str) -> Result<u64, NudgeError> {
        queries::reminders::skip_for_task(self.db()?, task_id).await
    }

    pub async fn upsert_task(&self, task: &TaskSnapshot) -> Result<(), NudgeError> {
        queries::tasks::upsert_task(self.db()?, task).await
    }

    pub async fn upsert_recipient(&self, recipient: &Recipient) -> Result<(), NudgeError> {
        queries::tasks::upsert_recipient(self.db()?, recipient).await
    }

    /// The attempt log of one reminder, oldest first.
    pub async fn attempts_for(&self, reminder_id: &str) -> Result<Vec<DispatchAttempt>, NudgeError> {
        queries::attempts::list_attempts(self.db()?, reminder_id).await
    }

    pub async fn counts_by_status(&self) -> Result<Vec<StatusCount>, NudgeError> {
        queries::reminders::counts_by_status(self.db()?).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteReminderStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, NudgeError> {
        let Ok(db) = self.db() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        let probe = db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await;
        Ok(match probe {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), NudgeError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl ReminderStore for SqliteReminderStore {
    async fn skip_orphaned_due(&self, now: DateTime<Utc>) -> Result<u64, NudgeError> {
        queries::reminders::skip_orphaned_due(self.db()?, now).await
    }

    async fn find_due(
        &self,
        now: DateTime<Utc>,
        lease_cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reminder>, NudgeError> {
        queries::reminders::find_due(self.db()?, now, lease_cutoff, limit).await
    }

    async fn try_claim(
        &self,
        id: &str,
        now: DateTime<Utc>,
        lease_cutoff: DateTime<Utc>,
    ) -> Result<Option<Reminder>, NudgeError> {
        queries::reminders::try_claim(self.db()?, id, now, lease_cutoff).await
    }

    async fn mark_sent(
        &self,
        id: &str,
        claim_token: &str,
        attempts: &[DispatchAttempt],
        next: Option<&NewReminder>,
    ) -> Result<bool, NudgeError> {
        queries::reminders::mark_sent(self.db()?, id, claim_token, attempts, next).await
    }

    async fn mark_failed(
        &self,
        id: &str,
        claim_token: &str,
        attempts: &[DispatchAttempt],
        disposition: &FailureDisposition,
        next: Option<&NewReminder>,
    ) -> Result<bool, NudgeError> {
        queries::reminders::mark_failed(self.db()?, id, claim_token, attempts, disposition, next)
            .await
    }

    async fn mark_skipped(&self, id: &str, claim_token: Option<&str>) -> Result<bool, NudgeError> {
        queries::reminders::mark_skipped(self.db()?, id, claim_token).await
    }

    async fn task_snapshot(&self, task_id: &str) -> Result<Option<TaskSnapshot>, NudgeError> {
        queries::tasks::get_task(self.db()?, task_id).await
    }

    async fn recipient(&self, user_id: &str) -> Result<Option<Recipient>, NudgeError> {
        queries::tasks::get_recipient(self.db()?, user_id).await
    }
}
