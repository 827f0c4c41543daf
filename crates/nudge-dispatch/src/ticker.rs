// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process scheduler for deployments without an external cron.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::orchestrator::Dispatcher;

/// Runs a tick every `interval` until `cancel` fires.
///
/// Ticks run one after another; a tick that overruns the interval delays
/// the next one instead of stacking. A failed tick is logged and the loop
/// carries on.
pub async fn run_ticker(dispatcher: Arc<Dispatcher>, interval: Duration, cancel: CancellationToken) {
    let mut ticks = tokio::time::interval(interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = interval.as_secs(), "dispatch ticker started");

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                if let Err(e) = dispatcher.run_tick().await {
                    error!(error = %e, "dispatch tick failed");
                }
            }
            _ = cancel.cancelled() => {
                info!("dispatch ticker shutting down");
                break;
            }
        }
    }
}

/// Spawns [`run_ticker`] on the current runtime.
pub fn spawn_ticker(
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run_ticker(dispatcher, interval, cancel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use nudge_config::model::DispatchConfig;
    use nudge_core::{ChannelKind, ReminderStatus};
    use nudge_test_utils::{MockChannel, TestStore};

    use crate::channels::ChannelSet;

    #[tokio::test]
    async fn ticker_dispatches_until_cancelled() {
        let fixture = TestStore::new().await.unwrap();
        let r = fixture
            .seed_due("t1", Utc::now(), &[ChannelKind::Email])
            .await
            .unwrap();
        let email = Arc::new(MockChannel::new(ChannelKind::Email));
        let dispatcher = Arc::new(Dispatcher::new(
            fixture.store.clone(),
            ChannelSet::new().with(email.clone()),
            DispatchConfig::default(),
            "nudge",
        ));

        let cancel = CancellationToken::new();
        let handle = spawn_ticker(dispatcher, Duration::from_millis(20), cancel.clone());

        tokio::time::timeout(Duration::from_secs(5), async {
            while email.sent_count().await == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("ticker never delivered");

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(
            fixture.reminder(&r.id).await.unwrap().status,
            ReminderStatus::Sent
        );
        assert_eq!(email.sent_count().await, 1);
    }
}
