// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reminder scanner: finds due reminders and claims them.
//!
//! Listing and claiming are separate steps. Overlapping ticks may list the
//! same candidates, but each reminder is won by exactly one `try_claim`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use nudge_core::{NudgeError, Reminder, ReminderStatus, ReminderStore};
use tracing::{debug, info};

/// Reminders won by one claim pass.
#[derive(Debug, Default)]
pub struct ClaimBatch {
    /// Claimed reminders, stale reclaims first, then oldest trigger first.
    pub claimed: Vec<Reminder>,
    /// How many of `claimed` were taken over from an expired lease.
    pub reclaimed: usize,
    /// Candidates another tick claimed first.
    pub contended: usize,
    /// Due reminders skipped up front because their task is gone.
    pub orphans_skipped: u64,
}

/// Claims due reminders in bounded batches.
pub struct ReminderScanner {
    store: Arc<dyn ReminderStore>,
    batch_size: usize,
}

impl ReminderScanner {
    pub fn new(store: Arc<dyn ReminderStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Claims up to one batch of due reminders.
    ///
    /// Claims held longer than `lease_timeout` count as abandoned and are
    /// taken over before fresh reminders. A store failure here fails the
    /// whole pass; nothing has been dispatched yet at that point.
    pub async fn claim_due(
        &self,
        now: DateTime<Utc>,
        lease_timeout: Duration,
    ) -> Result<ClaimBatch, NudgeError> {
        let lease_cutoff = now - to_delta(lease_timeout);
        let mut batch = ClaimBatch {
            orphans_skipped: self.store.skip_orphaned_due(now).await?,
            ..ClaimBatch::default()
        };
        if batch.orphans_skipped > 0 {
            info!(count = batch.orphans_skipped, "skipped reminders of inactive tasks");
        }

        let candidates = self
            .store
            .find_due(now, lease_cutoff, self.batch_size)
            .await?;

        for candidate in candidates {
            let stale = candidate.status == ReminderStatus::Claimed;
            match self.store.try_claim(&candidate.id, now, lease_cutoff).await? {
                Some(claimed) => {
                    if stale {
                        info!(
                            reminder_id = %claimed.id,
                            previous_claim_at = ?candidate.claimed_at,
                            "reclaimed reminder with expired lease"
                        );
                        batch.reclaimed += 1;
                    }
                    batch.claimed.push(claimed);
                }
                None => {
                    debug!(reminder_id = %candidate.id, "reminder claimed by another tick");
                    batch.contended += 1;
                }
            }
        }

        Ok(batch)
    }
}

/// Converts a configured duration, capping absurd values at a year.
pub(crate) fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration)
        .unwrap_or_else(|_| TimeDelta::days(365))
        .min(TimeDelta::days(365))
}
