// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reminder store trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::NudgeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    DispatchAttempt, FailureDisposition, NewReminder, Recipient, Reminder, TaskSnapshot,
};

/// Repository contract consumed by the scanner and the orchestrator.
///
/// Every mutating operation must be a single atomic conditional update so
/// that overlapping dispatch ticks can share one store safely.
#[async_trait]
pub trait ReminderStore: PluginAdapter {
    /// Marks due `Pending` reminders whose task was deleted or completed as `Skipped`.
    ///
    /// Returns the number of reminders skipped.
    async fn skip_orphaned_due(&self, now: DateTime<Utc>) -> Result<u64, NudgeError>;

    /// Lists claim candidates, oldest trigger first.
    ///
    /// Candidates are claims older than `lease_cutoff` (listed first), due
    /// `Pending` reminders, and retryable `Failed` reminders whose backoff
    /// has elapsed. Listing does not claim.
    async fn find_due(
        &self,
        now: DateTime<Utc>,
        lease_cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reminder>, NudgeError>;

    /// Atomically moves one candidate to `Claimed`.
    ///
    /// Returns `None` when another tick got there first.
    async fn try_claim(
        &self,
        id: &str,
        now: DateTime<Utc>,
        lease_cutoff: DateTime<Utc>,
    ) -> Result<Option<Reminder>, NudgeError>;

    /// Finalizes a claimed reminder as `Sent` together with its attempt log.
    ///
    /// `next` schedules the following occurrence of a recurring reminder in
    /// the same transaction. Returns `false` if the claim was lost.
    async fn mark_sent(
        &self,
        id: &str,
        claim_token: &str,
        attempts: &[DispatchAttempt],
        next: Option<&NewReminder>,
    ) -> Result<bool, NudgeError>;

    /// Finalizes a claimed reminder as `Failed` together with its attempt log.
    async fn mark_failed(
        &self,
        id: &str,
        claim_token: &str,
        attempts: &[DispatchAttempt],
        disposition: &FailureDisposition,
        next: Option<&NewReminder>,
    ) -> Result<bool, NudgeError>;

    /// Marks a reminder `Skipped`.
    ///
    /// With a claim token, only the matching claim is skipped; without one,
    /// only a `Pending` reminder is.
    async fn mark_skipped(&self, id: &str, claim_token: Option<&str>) -> Result<bool, NudgeError>;

    /// Fetches the task a reminder belongs to. `None` means the task is gone.
    async fn task_snapshot(&self, task_id: &str) -> Result<Option<TaskSnapshot>, NudgeError>;

    /// Fetches the contact details of a user.
    async fn recipient(&self, user_id: &str) -> Result<Option<Recipient>, NudgeError>;
}
