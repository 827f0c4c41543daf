// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch orchestrator: one tick of claim, deliver, finalize.
//!
//! Per-reminder failures never abort the tick. The only error a tick
//! returns is a failed claim pass, before anything was sent.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use nudge_config::model::DispatchConfig;
use nudge_core::{
    ChannelKind, DispatchAttempt, FailureDisposition, Notification, NudgeError, Recipient,
    Reminder, ReminderStore, TaskSnapshot,
};
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::channels::ChannelSet;
use crate::recurrence;
use crate::render;
use crate::scanner::{ReminderScanner, to_delta};

/// Final disposition of one claimed reminder within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// At least one channel delivered.
    Sent,
    /// Every channel failed. `retry` is set when a later tick will try again.
    Failed { retry: bool },
    /// The task was deleted or completed after the reminder was claimed.
    Skipped,
    /// Another tick took the claim over before this one finished.
    LostClaim,
    /// The store failed mid-dispatch; the claim is left to expire.
    Deferred,
}

/// Summary of one tick, returned to the trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub tick_id: String,
    pub claimed: usize,
    /// Claims taken over from a tick that never finished them.
    pub reclaimed: usize,
    /// Candidates lost to an overlapping tick.
    pub contended: usize,
    pub sent: usize,
    pub failed: usize,
    /// Failed reminders that will be retried.
    pub retry_scheduled: usize,
    pub skipped: usize,
    pub orphans_skipped: u64,
    pub lost_claims: usize,
    pub deferred: usize,
    /// Claimed reminders not finished within the tick budget.
    pub unfinished: usize,
}

impl TickReport {
    /// Reminders that reached a final status in this tick.
    pub fn processed(&self) -> usize {
        self.sent + self.failed + self.skipped
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Sent => self.sent += 1,
            Outcome::Failed { retry } => {
                self.failed += 1;
                if retry {
                    self.retry_scheduled += 1;
                }
            }
            Outcome::Skipped => self.skipped += 1,
            Outcome::LostClaim => self.lost_claims += 1,
            Outcome::Deferred => self.deferred += 1,
        }
    }
}

struct ChannelResult {
    kind: ChannelKind,
    result: Result<(), NudgeError>,
}

/// Runs dispatch ticks against a store and a set of channels.
pub struct Dispatcher {
    store: Arc<dyn ReminderStore>,
    channels: ChannelSet,
    scanner: ReminderScanner,
    config: DispatchConfig,
    service_name: String,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        channels: ChannelSet,
        config: DispatchConfig,
        service_name: impl Into<String>,
    ) -> Self {
        let scanner = ReminderScanner::new(store.clone(), config.batch_size);
        Self {
            store,
            channels,
            scanner,
            config,
            service_name: service_name.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ReminderStore> {
        &self.store
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Runs one tick at the current time.
    pub async fn run_tick(&self) -> Result<TickReport, NudgeError> {
        self.run_tick_at(Utc::now()).await
    }

    /// Runs one tick as if the clock read `now`.
    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> Result<TickReport, NudgeError> {
        let tick_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("dispatch_tick", tick_id = %tick_id);
        self.tick(tick_id, now).instrument(span).await
    }

    async fn tick(&self, tick_id: String, now: DateTime<Utc>) -> Result<TickReport, NudgeError> {
        let deadline = tokio::time::Instant::now() + self.config.tick_budget();

        let batch = self
            .scanner
            .claim_due(now, self.config.lease_timeout())
            .await?;
        let mut report = TickReport {
            tick_id,
            claimed: batch.claimed.len(),
            reclaimed: batch.reclaimed,
            contended: batch.contended,
            orphans_skipped: batch.orphans_skipped,
            ..TickReport::default()
        };

        let mut in_flight = stream::iter(batch.claimed)
            .map(|reminder| self.dispatch(reminder, now))
            .buffer_unordered(self.config.concurrency.max(1));

        let mut finished = 0;
        loop {
            match tokio::time::timeout_at(deadline, in_flight.next()).await {
                Ok(Some(outcome)) => {
                    finished += 1;
                    report.record(outcome);
                }
                Ok(None) => break,
                Err(_) => {
                    report.unfinished = report.claimed - finished;
                    warn!(
                        unfinished = report.unfinished,
                        budget_secs = self.config.tick_budget_secs,
                        "tick budget exhausted; remaining claims recover after their lease"
                    );
                    break;
                }
            }
        }

        if report.claimed > 0 || report.orphans_skipped > 0 {
            info!(
                claimed = report.claimed,
                sent = report.sent,
                failed = report.failed,
                retry_scheduled = report.retry_scheduled,
                skipped = report.skipped,
                "dispatch tick complete"
            );
        } else {
            debug!("dispatch tick found nothing due");
        }
        Ok(report)
    }

    async fn dispatch(&self, reminder: Reminder, now: DateTime<Utc>) -> Outcome {
        let span = info_span!(
            "reminder",
            reminder_id = %reminder.id,
            attempts = reminder.attempts
        );
        self.dispatch_claimed(reminder, now).instrument(span).await
    }

    async fn dispatch_claimed(&self, reminder: Reminder, now: DateTime<Utc>) -> Outcome {
        let Some(token) = reminder.claim_token.clone() else {
            warn!("claimed reminder carries no claim token");
            return Outcome::LostClaim;
        };

        let task = match self.store.task_snapshot(&reminder.task_id).await {
            Ok(task) => task,
            Err(e) => {
                warn!(error = %e, "task lookup failed; leaving claim to expire");
                return Outcome::Deferred;
            }
        };
        let Some(task) = task.filter(TaskSnapshot::is_active) else {
            return self.skip(&reminder, &token).await;
        };

        let recipient = match self.store.recipient(&reminder.user_id).await {
            Ok(Some(recipient)) => recipient,
            Ok(None) => Recipient {
                user_id: reminder.user_id.clone(),
                ..Recipient::default()
            },
            Err(e) => {
                warn!(error = %e, "recipient lookup failed; leaving claim to expire");
                return Outcome::Deferred;
            }
        };

        let notification = render::render(&reminder, &task, &recipient, &self.service_name, now);
        let results = self.deliver(&reminder, &recipient, &notification).await;
        self.finalize(&reminder, &token, results, now).await
    }

    async fn skip(&self, reminder: &Reminder, token: &str) -> Outcome {
        match self.store.mark_skipped(&reminder.id, Some(token)).await {
            Ok(true) => {
                info!(task_id = %reminder.task_id, "task inactive, reminder skipped");
                Outcome::Skipped
            }
            Ok(false) => Outcome::LostClaim,
            Err(e) => {
                warn!(error = %e, "failed to skip reminder");
                Outcome::Deferred
            }
        }
    }

    /// Sends through every resolved channel independently.
    async fn deliver(
        &self,
        reminder: &Reminder,
        recipient: &Recipient,
        notification: &Notification,
    ) -> Vec<ChannelResult> {
        let sends = self
            .channels
            .resolve(reminder, &self.config)
            .into_iter()
            .map(|(kind, channel)| async move {
                let result = match recipient.address_for(kind) {
                    Some(target) => channel.send(target, notification).await.map(|_| ()),
                    None => Err(NudgeError::DeliveryRejected {
                        channel: kind,
                        message: format!("recipient {} has no {kind} address", recipient.user_id),
                    }),
                };
                match &result {
                    Ok(()) => debug!(channel = %kind, "channel delivered"),
                    Err(e) => warn!(
                        channel = %kind,
                        error = %e,
                        transient = e.is_transient(),
                        "channel delivery failed"
                    ),
                }
                ChannelResult { kind, result }
            });
        join_all(sends).await
    }

    async fn finalize(
        &self,
        reminder: &Reminder,
        token: &str,
        results: Vec<ChannelResult>,
        now: DateTime<Utc>,
    ) -> Outcome {
        let attempted_at = Utc::now();
        let log: Vec<DispatchAttempt> = results
            .iter()
            .map(|r| DispatchAttempt {
                reminder_id: reminder.id.clone(),
                channel: r.kind,
                attempted_at,
                success: r.result.is_ok(),
                error_kind: r.result.as_ref().err().map(|e| e.kind().to_string()),
                error: r.result.as_ref().err().map(|e| e.to_string()),
            })
            .collect();

        if results.iter().any(|r| r.result.is_ok()) {
            let next = recurrence::next_reminder(reminder, now);
            return match self
                .store
                .mark_sent(&reminder.id, token, &log, next.as_ref())
                .await
            {
                Ok(true) => {
                    info!(channels = log.len(), "reminder sent");
                    Outcome::Sent
                }
                Ok(false) => {
                    warn!("claim lost before the reminder could be marked sent");
                    Outcome::LostClaim
                }
                Err(e) => {
                    warn!(error = %e, "failed to record sent reminder");
                    Outcome::Deferred
                }
            };
        }

        let disposition = self.failure_disposition(reminder, &results, now);
        let retry = disposition.retry_at.is_some();
        let next = if retry {
            None
        } else {
            recurrence::next_reminder(reminder, now)
        };
        match self
            .store
            .mark_failed(&reminder.id, token, &log, &disposition, next.as_ref())
            .await
        {
            Ok(true) => {
                warn!(
                    attempts = reminder.attempts + 1,
                    retry_at = ?disposition.retry_at,
                    error = %disposition.error,
                    "reminder failed"
                );
                Outcome::Failed { retry }
            }
            Ok(false) => {
                warn!("claim lost before the reminder could be marked failed");
                Outcome::LostClaim
            }
            Err(e) => {
                warn!(error = %e, "failed to record failed reminder");
                Outcome::Deferred
            }
        }
    }

    /// Retry only when some channel failed transiently and attempts remain.
    fn failure_disposition(
        &self,
        reminder: &Reminder,
        results: &[ChannelResult],
        now: DateTime<Utc>,
    ) -> FailureDisposition {
        if results.is_empty() {
            return FailureDisposition {
                error: "no delivery channel available".into(),
                retry_at: None,
            };
        }

        let transient = results
            .iter()
            .any(|r| matches!(&r.result, Err(e) if e.is_transient()));
        let attempts = reminder.attempts + 1;
        let retry = transient && attempts < self.config.max_attempts;

        FailureDisposition {
            error: results
                .iter()
                .filter_map(|r| r.result.as_ref().err().map(|e| format!("{}: {e}", r.kind)))
                .collect::<Vec<_>>()
                .join("; "),
            retry_at: retry.then(|| now + to_delta(self.config.retry_backoff())),
        }
    }
}
