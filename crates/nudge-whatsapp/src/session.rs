// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The WhatsApp session manager.
//!
//! One [`SessionManager`] owns the single linked device of a deployment. It
//! is the only writer of the session state, which it publishes through a
//! `watch` channel so that status reads never wait on a lock.
//!
//! State machine:
//!
//! ```text
//! DISCONNECTED --initialize--> INITIALIZING --qr--> QR_PENDING --ready--> CONNECTED
//! INITIALIZING --ready (persisted credentials)--> CONNECTED
//! CONNECTED --remote logout / auth failure--> AUTH_FAILURE --initialize--> INITIALIZING
//! any --logout--> LOGGED_OUT --> DISCONNECTED
//! ```
//!
//! Every bring-up gets a generation number. Events from a driver instance
//! whose generation was superseded (by logout, shutdown, or a failed
//! bring-up) are dropped, so a late `ready` can never resurrect a session
//! that was already torn down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info, warn};

use nudge_config::model::WhatsAppConfig;
use nudge_core::{
    ChannelKind, ChatDriver, ClientEvent, HealthStatus, MessageId, NudgeError, SessionSnapshot,
    SessionStatus,
};

use crate::phone;

const EVENT_BUFFER: usize = 32;
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(300);

/// Timeouts and policies of a [`SessionManager`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// How long `initialize` waits for QR_PENDING or CONNECTED.
    pub init_timeout: Duration,
    /// How long one send may take before it counts as failed.
    pub send_timeout: Duration,
    /// Re-initialize after an unexpected disconnect from CONNECTED.
    pub auto_reconnect: bool,
    pub reconnect_delay: Duration,
    /// Applied to national-format numbers.
    pub default_country_code: Option<String>,
}

impl From<&WhatsAppConfig> for SessionSettings {
    fn from(config: &WhatsAppConfig) -> Self {
        Self {
            init_timeout: Duration::from_secs(config.init_timeout_secs),
            send_timeout: Duration::from_secs(config.send_timeout_secs),
            auto_reconnect: config.auto_reconnect,
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
            default_country_code: config.default_country_code.clone(),
        }
    }
}

/// Idempotent facade over a non-reentrant chat driver.
///
/// Cloning is cheap; all clones share one session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    driver: Arc<dyn ChatDriver>,
    settings: SessionSettings,
    state: watch::Sender<SessionSnapshot>,
    /// Serializes driver launch, logout and shutdown.
    lifecycle: Mutex<()>,
    /// Serializes sends; the driver never sees two at once.
    sends: Mutex<()>,
    generation: AtomicU64,
    /// Bumped by logout and shutdown; pending reconnects give up when it moves.
    teardowns: AtomicU64,
    reconnects: mpsc::UnboundedSender<u64>,
}

impl SessionManager {
    /// Creates a manager in DISCONNECTED. Must be called inside a Tokio runtime.
    pub fn new(driver: Arc<dyn ChatDriver>, settings: SessionSettings) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        let (reconnects, requests) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            driver,
            settings,
            state,
            lifecycle: Mutex::new(()),
            sends: Mutex::new(()),
            generation: AtomicU64::new(0),
            teardowns: AtomicU64::new(0),
            reconnects,
        });
        tokio::spawn(reconnect_loop(Arc::downgrade(&inner), requests));
        Self { inner }
    }

    /// Current state. Never blocks and never fails.
    pub fn get_status(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    /// The pairing code while QR_PENDING.
    pub fn get_qr(&self) -> Option<String> {
        let state = self.inner.state.borrow();
        match state.status {
            SessionStatus::QrPending => state.qr.clone(),
            _ => None,
        }
    }

    /// Receiver that observes every state change, for pairing UIs.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    /// Whether an earlier pairing left credentials behind.
    pub fn has_persisted_credentials(&self) -> bool {
        self.inner.driver.has_persisted_credentials()
    }

    /// Starts bring-up unless a session is already INITIALIZING, QR_PENDING
    /// or CONNECTED, in which case the current state is returned unchanged
    /// and at once.
    ///
    /// Resolves once the session reaches QR_PENDING or CONNECTED. On failure
    /// the driver is torn down and the state falls back to DISCONNECTED (or
    /// stays AUTH_FAILURE when credentials were rejected). The lifecycle lock
    /// covers only the driver launch, so `logout` and `shutdown` never wait
    /// out a pending pairing; they retire the bring-up instead.
    pub async fn initialize(&self) -> Result<SessionSnapshot, NudgeError> {
        if let Some(current) = self.active_status() {
            return Ok(current);
        }

        let timeout = self.inner.settings.init_timeout;
        let deadline = tokio::time::Instant::now() + timeout;
        let mut watcher = self.inner.state.subscribe();

        let generation = {
            let _lifecycle = self.inner.lifecycle.lock().await;
            if let Some(current) = self.active_status() {
                return Ok(current);
            }

            let generation = self.inner.start_generation();
            info!(generation, "initializing whatsapp session");

            let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
            tokio::spawn(pump_events(self.inner.clone(), generation, events_rx));

            let launched =
                match tokio::time::timeout_at(deadline, self.inner.driver.launch(events_tx)).await {
                    Ok(result) => result,
                    Err(_) => Err(NudgeError::Timeout { duration: timeout }),
                };
            if let Err(e) = launched {
                warn!(error = %e, "whatsapp client failed to launch");
                self.inner.abandon(&e).await;
                return Err(e);
            }
            generation
        };

        let outcome = tokio::time::timeout_at(
            deadline,
            watcher.wait_for(|s| s.status != SessionStatus::Initializing),
        )
        .await
        .map(|waited| waited.map(|snapshot| snapshot.clone()));

        let failure = match outcome {
            Ok(Ok(snapshot)) => match snapshot.status {
                SessionStatus::QrPending | SessionStatus::Connected => {
                    info!(status = %snapshot.status, "whatsapp session is up");
                    return Ok(snapshot);
                }
                SessionStatus::AuthFailure => {
                    let reason = snapshot
                        .last_error
                        .unwrap_or_else(|| "credentials rejected".to_string());
                    warn!(reason = %reason, "whatsapp authentication failed");
                    let _lifecycle = self.inner.lifecycle.lock().await;
                    if self.inner.owns(generation) {
                        self.inner.retire_generation();
                        self.inner.destroy_driver().await;
                    }
                    return Err(NudgeError::Session(format!("authentication failed: {reason}")));
                }
                other => NudgeError::Session(snapshot.last_error.unwrap_or_else(|| {
                    format!("session ended during bring-up in state {other}")
                })),
            },
            Ok(Err(_)) => NudgeError::Session("session state channel closed".into()),
            Err(_) => NudgeError::Timeout { duration: timeout },
        };

        let _lifecycle = self.inner.lifecycle.lock().await;
        if !self.inner.owns(generation) {
            debug!(generation, error = %failure, "bring-up was superseded");
            return Err(failure);
        }
        warn!(error = %failure, "whatsapp session bring-up failed");
        self.inner.abandon(&failure).await;
        Err(failure)
    }

    /// Brings up a session from persisted credentials, if there are any.
    pub async fn restore(&self) -> Result<Option<SessionSnapshot>, NudgeError> {
        if !self.has_persisted_credentials() {
            debug!("no persisted whatsapp credentials, not restoring");
            return Ok(None);
        }
        self.initialize().await.map(Some)
    }

    /// Tears the session down and purges its credentials.
    ///
    /// Ends in DISCONNECTED after passing through LOGGED_OUT. A no-op when
    /// already DISCONNECTED. A failed remote logout does not stop the local
    /// teardown.
    pub async fn logout(&self) -> Result<(), NudgeError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.teardowns.fetch_add(1, Ordering::SeqCst);
        if self.get_status().status == SessionStatus::Disconnected {
            debug!("session already disconnected, logout is a no-op");
            return Ok(());
        }

        self.inner.retire_generation();
        let _sends = self.inner.sends.lock().await;

        if let Err(e) = self.inner.driver.logout().await {
            warn!(error = %e, "remote logout failed, tearing down locally");
        }
        self.inner.destroy_driver().await;
        let purged = self.inner.driver.purge_credentials().await;
        let purge_error = purged.as_ref().err().map(ToString::to_string);

        self.inner.state.send_modify(|s| {
            s.status = SessionStatus::LoggedOut;
            s.qr = None;
            s.last_error = purge_error;
        });
        info!("whatsapp session logged out");
        self.inner
            .state
            .send_modify(|s| s.status = SessionStatus::Disconnected);
        purged
    }

    /// Stops the driver and keeps credentials for the next start.
    pub async fn shutdown(&self) -> Result<(), NudgeError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.teardowns.fetch_add(1, Ordering::SeqCst);
        self.inner.retire_generation();
        let was_active = self.get_status().status.is_active();
        if was_active {
            self.inner.destroy_driver().await;
        }
        self.inner.state.send_modify(|s| {
            s.status = SessionStatus::Disconnected;
            s.qr = None;
        });
        Ok(())
    }

    /// Sends `body` to a phone number.
    ///
    /// The number is normalized first; a malformed one fails with
    /// [`NudgeError::InvalidDestination`] without touching the session.
    /// Anything but CONNECTED fails fast with
    /// [`NudgeError::ChannelUnavailable`].
    pub async fn send_message(
        &self,
        destination: &str,
        body: &str,
    ) -> Result<MessageId, NudgeError> {
        let digits = phone::normalize(
            destination,
            self.inner.settings.default_country_code.as_deref(),
        )?;
        self.ensure_connected()?;

        let _sends = self.inner.sends.lock().await;
        // The session may have dropped while this send was queued.
        self.ensure_connected()?;

        let chat_id = phone::chat_id(&digits);
        let timeout = self.inner.settings.send_timeout;
        match tokio::time::timeout(timeout, self.inner.driver.send_text(&chat_id, body)).await {
            Ok(Ok(id)) => {
                debug!(message_id = %id.0, "whatsapp message sent");
                Ok(id)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(?timeout, "whatsapp send timed out");
                Err(NudgeError::Timeout { duration: timeout })
            }
        }
    }

    /// Health derived from the session status.
    pub fn health(&self) -> HealthStatus {
        let state = self.get_status();
        match state.status {
            SessionStatus::Connected => HealthStatus::Healthy,
            SessionStatus::Initializing | SessionStatus::QrPending => {
                HealthStatus::Degraded(format!("session is {}", state.status))
            }
            other => HealthStatus::Unhealthy(
                state
                    .last_error
                    .map(|e| format!("session is {other}: {e}"))
                    .unwrap_or_else(|| format!("session is {other}")),
            ),
        }
    }

    fn active_status(&self) -> Option<SessionSnapshot> {
        let current = self.get_status();
        if current.status.is_active() {
            debug!(status = %current.status, "session already active, initialize is a no-op");
            Some(current)
        } else {
            None
        }
    }

    fn ensure_connected(&self) -> Result<(), NudgeError> {
        let status = self.inner.state.borrow().status;
        if status == SessionStatus::Connected {
            Ok(())
        } else {
            Err(NudgeError::ChannelUnavailable {
                channel: ChannelKind::WhatsApp,
                message: format!("session is {status}"),
            })
        }
    }
}

impl Inner {
    /// Enters INITIALIZING under a fresh generation.
    fn start_generation(&self) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|s| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            s.status = SessionStatus::Initializing;
            s.qr = None;
            s.last_error = None;
        });
        generation
    }

    /// Invalidates the current generation so its pending events are dropped.
    ///
    /// Bumped under the state lock so it cannot interleave with [`Inner::apply`].
    fn retire_generation(&self) {
        self.state.send_if_modified(|_| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            false
        });
    }

    /// Whether `generation` is still the live bring-up. Stable only under
    /// the lifecycle lock.
    fn owns(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Drops a failed bring-up and falls back to DISCONNECTED.
    async fn abandon(&self, failure: &NudgeError) {
        self.retire_generation();
        self.destroy_driver().await;
        let message = failure.to_string();
        self.state.send_modify(|s| {
            s.status = SessionStatus::Disconnected;
            s.qr = None;
            s.last_error = Some(message);
        });
    }

    async fn destroy_driver(&self) {
        if let Err(e) = self.driver.destroy().await {
            warn!(error = %e, "failed to destroy whatsapp client");
        }
    }

    fn apply(&self, generation: u64, event: ClientEvent) {
        let mut reconnect = false;
        let changed = self.state.send_if_modified(|s| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            match event {
                ClientEvent::Qr(code) => {
                    s.status = SessionStatus::QrPending;
                    s.qr = Some(code);
                }
                ClientEvent::Authenticated => return false,
                ClientEvent::Ready => {
                    s.status = SessionStatus::Connected;
                    s.qr = None;
                    s.last_connected_at = Some(Utc::now());
                    s.last_error = None;
                }
                ClientEvent::AuthFailure(reason) => {
                    s.status = SessionStatus::AuthFailure;
                    s.qr = None;
                    s.last_error = Some(reason);
                }
                ClientEvent::Disconnected {
                    reason,
                    logged_out: true,
                } => {
                    s.status = SessionStatus::AuthFailure;
                    s.qr = None;
                    s.last_error = Some(format!("device logged out remotely: {reason}"));
                }
                ClientEvent::Disconnected {
                    reason,
                    logged_out: false,
                } => {
                    if !s.status.is_active() {
                        return false;
                    }
                    reconnect =
                        s.status == SessionStatus::Connected && self.settings.auto_reconnect;
                    s.status = SessionStatus::Disconnected;
                    s.qr = None;
                    s.last_error = Some(reason);
                }
            }
            true
        });

        if changed {
            let state = self.state.borrow().clone();
            info!(
                status = %state.status,
                error = state.last_error.as_deref().unwrap_or(""),
                "whatsapp session status changed"
            );
        }
        if reconnect && self.reconnects.send(generation).is_err() {
            debug!("reconnect loop gone, not scheduling reconnect");
        }
    }
}

/// Applies driver events for one generation until the driver drops its sender.
async fn pump_events(
    inner: Arc<Inner>,
    generation: u64,
    mut events: mpsc::Receiver<ClientEvent>,
) {
    while let Some(event) = events.recv().await {
        if inner.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "dropping events of a retired session");
            return;
        }
        inner.apply(generation, event);
    }
    inner.apply(
        generation,
        ClientEvent::Disconnected {
            reason: "client event stream ended".to_string(),
            logged_out: false,
        },
    );
}

/// Re-initializes after unexpected disconnects.
///
/// Failed attempts are retried with doubling delays until the session is
/// back (CONNECTED or QR_PENDING), the credentials are rejected, or a logout
/// or shutdown intervenes. Holds only a weak reference so the loop ends with
/// the last manager.
async fn reconnect_loop(inner: Weak<Inner>, mut requests: mpsc::UnboundedReceiver<u64>) {
    while let Some(generation) = requests.recv().await {
        let Some(teardowns) = inner.upgrade().map(|i| i.teardowns.load(Ordering::SeqCst)) else {
            break;
        };

        let mut attempt: u32 = 0;
        loop {
            let Some(delay) = inner
                .upgrade()
                .map(|i| reconnect_backoff(i.settings.reconnect_delay, attempt))
            else {
                return;
            };
            info!(generation, attempt = attempt + 1, ?delay, "whatsapp session dropped, reconnecting");
            tokio::time::sleep(delay).await;

            let Some(strong) = inner.upgrade() else {
                return;
            };
            if strong.teardowns.load(Ordering::SeqCst) != teardowns {
                debug!("session torn down while waiting, reconnect cancelled");
                break;
            }
            let status = strong.state.borrow().status;
            if status != SessionStatus::Disconnected {
                debug!(%status, "session changed while waiting, reconnect cancelled");
                break;
            }

            let manager = SessionManager { inner: strong };
            match manager.initialize().await {
                Ok(snapshot) => {
                    info!(status = %snapshot.status, "whatsapp session reconnected");
                    break;
                }
                Err(e) if manager.get_status().status == SessionStatus::AuthFailure => {
                    warn!(error = %e, "whatsapp reconnect rejected, pairing required");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, attempt = attempt + 1, "whatsapp reconnect failed");
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }
}

/// `base` doubled per failed attempt, capped at [`MAX_RECONNECT_DELAY`].
fn reconnect_backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1 << attempt.min(10))
        .min(MAX_RECONNECT_DELAY)
}
