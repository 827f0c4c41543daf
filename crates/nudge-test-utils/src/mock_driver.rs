// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted chat driver standing in for the WhatsApp Web bridge.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use nudge_core::{
    AdapterType, ChatDriver, ClientEvent, HealthStatus, MessageId, NudgeError, PluginAdapter,
};

/// A chat driver that replays a fixed script on every launch.
///
/// - events pushed with [`ScriptedDriver::on_launch`] are emitted as soon as
///   `launch()` is called;
/// - [`ScriptedDriver::emit`] injects events later (QR scanned, remote logout);
/// - `destroy()` drops the event sender, like a real client going away.
///
/// Every call is counted so tests can assert that idempotent operations
/// did not touch the driver.
pub struct ScriptedDriver {
    launch_events: Vec<ClientEvent>,
    launch_error: Option<String>,
    failing_launches: AtomicUsize,
    send_delay: Duration,
    persisted: AtomicBool,
    events: Mutex<Option<mpsc::Sender<ClientEvent>>>,
    send_outcomes: Mutex<VecDeque<Result<(), NudgeError>>>,
    sent: Mutex<Vec<(String, String)>>,
    launches: AtomicUsize,
    logouts: AtomicUsize,
    destroys: AtomicUsize,
    purges: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedDriver {
    /// A driver that starts but never reports progress.
    pub fn new() -> Self {
        Self {
            launch_events: Vec::new(),
            launch_error: None,
            failing_launches: AtomicUsize::new(0),
            send_delay: Duration::ZERO,
            persisted: AtomicBool::new(false),
            events: Mutex::new(None),
            send_outcomes: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            launches: AtomicUsize::new(0),
            logouts: AtomicUsize::new(0),
            destroys: AtomicUsize::new(0),
            purges: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// A driver with valid persisted credentials: launch goes straight to ready.
    pub fn connecting() -> Self {
        Self::new()
            .with_persisted_credentials()
            .on_launch(ClientEvent::Authenticated)
            .on_launch(ClientEvent::Ready)
    }

    /// A driver that needs pairing: launch shows `qr`.
    pub fn pairing(qr: &str) -> Self {
        Self::new().on_launch(ClientEvent::Qr(qr.to_string()))
    }

    /// Emit `event` on every launch, after previously scripted events.
    pub fn on_launch(mut self, event: ClientEvent) -> Self {
        self.launch_events.push(event);
        self
    }

    /// Make `launch()` fail, as when the browser runtime is missing.
    pub fn failing_launch(mut self, message: &str) -> Self {
        self.launch_error = Some(message.to_string());
        self
    }

    /// Make the next `count` launches fail, as while the bridge restarts.
    pub fn fail_next_launches(&self, count: usize) {
        self.failing_launches.store(count, Ordering::SeqCst);
    }

    /// Hold every send for `delay` before completing it.
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    pub fn with_persisted_credentials(self) -> Self {
        self.persisted.store(true, Ordering::SeqCst);
        self
    }

    /// Inject an event into the running client. Ignored when not launched.
    pub async fn emit(&self, event: ClientEvent) {
        if let Some(tx) = self.events.lock().await.as_ref() {
            let _ = tx.send(event).await;
        }
    }

    /// Queue the outcome of the next `send_text`.
    pub async fn push_send_outcome(&self, outcome: Result<(), NudgeError>) {
        self.send_outcomes.lock().await.push_back(outcome);
    }

    /// `(chat_id, body)` of every successful send.
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    pub fn destroys(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    pub fn purges(&self) -> usize {
        self.purges.load(Ordering::SeqCst)
    }

    /// Highest number of sends ever observed in flight at once.
    pub fn max_concurrent_sends(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for ScriptedDriver {
    fn name(&self) -> &str {
        "scripted-driver"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Driver
    }

    async fn health_check(&self) -> Result<HealthStatus, NudgeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), NudgeError> {
        Ok(())
    }
}

#[async_trait]
impl ChatDriver for ScriptedDriver {
    async fn launch(&self, events: mpsc::Sender<ClientEvent>) -> Result<(), NudgeError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.launch_error {
            return Err(NudgeError::Session(message.clone()));
        }
        if self
            .failing_launches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(NudgeError::Session("bridge is restarting".into()));
        }
        for event in &self.launch_events {
            let _ = events.send(event.clone()).await;
        }
        *self.events.lock().await = Some(events);
        Ok(())
    }

    async fn send_text(&self, chat_id: &str, body: &str) -> Result<MessageId, NudgeError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(outcome) = self.send_outcomes.lock().await.pop_front() {
            outcome?;
        }
        self.sent
            .lock()
            .await
            .push((chat_id.to_string(), body.to_string()));
        Ok(MessageId(format!("scripted-{}", uuid::Uuid::new_v4())))
    }

    async fn logout(&self) -> Result<(), NudgeError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn destroy(&self) -> Result<(), NudgeError> {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        self.events.lock().await.take();
        Ok(())
    }

    async fn purge_credentials(&self) -> Result<(), NudgeError> {
        self.purges.fetch_add(1, Ordering::SeqCst);
        self.persisted.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn has_persisted_credentials(&self) -> bool {
        self.persisted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn launch_replays_script() {
        let driver = ScriptedDriver::pairing("qr-1");
        let (tx, mut rx) = mpsc::channel(4);
        driver.launch(tx).await.unwrap();
        assert_eq!(rx.recv().await, Some(ClientEvent::Qr("qr-1".into())));

        driver.emit(ClientEvent::Ready).await;
        assert_eq!(rx.recv().await, Some(ClientEvent::Ready));

        driver.destroy().await.unwrap();
        assert_eq!(rx.recv().await, None);
        assert_eq!(driver.launches(), 1);
    }

    #[tokio::test]
    async fn scheduled_launch_failures_run_out() {
        let driver = ScriptedDriver::connecting();
        driver.fail_next_launches(1);
        let (tx, _rx) = mpsc::channel(4);
        assert!(driver.launch(tx.clone()).await.is_err());
        assert!(driver.launch(tx).await.is_ok());
        assert_eq!(driver.launches(), 2);
    }

    #[tokio::test]
    async fn failing_launch_reports_session_error() {
        let driver = ScriptedDriver::new().failing_launch("chromium not found");
        let (tx, _rx) = mpsc::channel(1);
        let err = driver.launch(tx).await.unwrap_err();
        assert!(matches!(err, NudgeError::Session(m) if m.contains("chromium")));
    }
}
