// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat driver that talks to a WhatsApp Web bridge sidecar.
//!
//! The WhatsApp Web protocol client runs in a headless browser inside the
//! sidecar. Commands go over HTTP:
//!
//! - `POST /session/start` starts the client (`{"auth_dir": ...}`)
//! - `POST /messages` sends a text (`{"chat_id", "body"}` -> `{"id"}`)
//! - `POST /session/logout` unlinks the device
//! - `POST /session/stop` stops the client, keeping credentials
//! - `GET /health`
//!
//! Lifecycle events arrive as JSON text frames on the `/events` WebSocket,
//! tagged by `type`: `qr`, `authenticated`, `ready`, `auth_failure`,
//! `disconnected`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use nudge_config::model::WhatsAppConfig;
use nudge_core::{
    AdapterType, ChannelKind, ChatDriver, ClientEvent, HealthStatus, MessageId, NudgeError,
    PluginAdapter,
};

/// Reason the sidecar reports when the device was unlinked from the phone.
const LOGOUT_REASON: &str = "LOGOUT";

/// One event frame from the bridge.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeEvent {
    Qr {
        qr: String,
    },
    Authenticated,
    Ready,
    AuthFailure {
        #[serde(default)]
        message: String,
    },
    Disconnected {
        #[serde(default)]
        reason: String,
    },
}

impl From<BridgeEvent> for ClientEvent {
    fn from(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::Qr { qr } => ClientEvent::Qr(qr),
            BridgeEvent::Authenticated => ClientEvent::Authenticated,
            BridgeEvent::Ready => ClientEvent::Ready,
            BridgeEvent::AuthFailure { message } => ClientEvent::AuthFailure(message),
            BridgeEvent::Disconnected { reason } => {
                let logged_out = reason.eq_ignore_ascii_case(LOGOUT_REASON);
                ClientEvent::Disconnected { reason, logged_out }
            }
        }
    }
}

/// Parses one text frame. Unknown or malformed frames yield `None`.
fn parse_event(raw: &str) -> Option<ClientEvent> {
    serde_json::from_str::<BridgeEvent>(raw).ok().map(Into::into)
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

/// HTTP + WebSocket client for the bridge sidecar.
pub struct BridgeDriver {
    base_url: String,
    token: Option<String>,
    auth_dir: PathBuf,
    request_timeout: Duration,
    client: reqwest::Client,
    events_task: Mutex<Option<JoinHandle<()>>>,
}

impl BridgeDriver {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, NudgeError> {
        let request_timeout = Duration::from_secs(config.send_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| NudgeError::Config(format!("failed to build bridge HTTP client: {e}")))?;
        Ok(Self {
            base_url: config.bridge_url.trim_end_matches('/').to_string(),
            token: config.bridge_token.clone(),
            auth_dir: PathBuf::from(&config.auth_dir),
            request_timeout,
            client,
            events_task: Mutex::new(None),
        })
    }

    fn events_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{ws_base}/events")
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, NudgeError> {
        let mut request = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                NudgeError::Timeout {
                    duration: self.request_timeout,
                }
            } else {
                NudgeError::Channel {
                    message: format!("bridge request to {path} failed: {e}"),
                    source: Some(Box::new(e)),
                }
            }
        })
    }

    /// Runs a lifecycle command; any non-success status is a session error.
    async fn command(&self, path: &str, body: serde_json::Value) -> Result<(), NudgeError> {
        let response = self.post(path, body).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        Err(NudgeError::Session(format!(
            "bridge {path} returned {status}: {detail}"
        )))
    }

    async fn stop_events(&self) {
        if let Some(task) = self.events_task.lock().await.take() {
            task.abort();
        }
    }
}

/// Forwards bridge frames as client events until the socket closes.
async fn forward_events<S>(mut frames: S, events: mpsc::Sender<ClientEvent>)
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let reason = loop {
        let text = match frames.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => {
                break "bridge closed the event stream".to_string();
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => break format!("bridge event stream error: {e}"),
        };
        match parse_event(text.as_str()) {
            Some(event) => {
                if events.send(event).await.is_err() {
                    return;
                }
            }
            None => debug!(frame = %text.as_str(), "ignoring unrecognized bridge frame"),
        }
    };
    warn!(reason = %reason, "whatsapp bridge event stream ended");
    let _ = events
        .send(ClientEvent::Disconnected {
            reason,
            logged_out: false,
        })
        .await;
}

#[async_trait]
impl PluginAdapter for BridgeDriver {
    fn name(&self) -> &str {
        "whatsapp-web-bridge"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Driver
    }

    async fn health_check(&self) -> Result<HealthStatus, NudgeError> {
        let mut request = self.client.get(format!("{}/health", self.base_url));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        Ok(match request.send().await {
            Ok(resp) if resp.status().is_success() => HealthStatus::Healthy,
            Ok(resp) => HealthStatus::Unhealthy(format!("bridge returned {}", resp.status())),
            Err(e) => HealthStatus::Unhealthy(format!("bridge unreachable: {e}")),
        })
    }

    async fn shutdown(&self) -> Result<(), NudgeError> {
        self.stop_events().await;
        Ok(())
    }
}

#[async_trait]
impl ChatDriver for BridgeDriver {
    async fn launch(&self, events: mpsc::Sender<ClientEvent>) -> Result<(), NudgeError> {
        self.stop_events().await;

        // Subscribe before starting so the first QR cannot be missed.
        let mut request = self
            .events_url()
            .into_client_request()
            .map_err(|e| NudgeError::Session(format!("invalid bridge event URL: {e}")))?;
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| NudgeError::Config(format!("invalid bridge token: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| NudgeError::Session(format!("bridge event stream unavailable: {e}")))?;
        *self.events_task.lock().await = Some(tokio::spawn(forward_events(stream, events)));

        let auth_dir = self.auth_dir.to_string_lossy().into_owned();
        if let Err(e) = self
            .command("/session/start", serde_json::json!({ "auth_dir": auth_dir }))
            .await
        {
            self.stop_events().await;
            return Err(e);
        }
        info!(bridge = %self.base_url, "whatsapp bridge client started");
        Ok(())
    }

    async fn send_text(&self, chat_id: &str, body: &str) -> Result<MessageId, NudgeError> {
        let response = self
            .post(
                "/messages",
                serde_json::json!({ "chat_id": chat_id, "body": body }),
            )
            .await?;
        let status = response.status();
        if status.is_success() {
            let sent: SentMessage = response.json().await.map_err(|e| NudgeError::Channel {
                message: format!("unexpected bridge response: {e}"),
                source: Some(Box::new(e)),
            })?;
            return Ok(MessageId(sent.id));
        }

        let detail = response.text().await.unwrap_or_default();
        let message = format!("bridge returned {status}: {detail}");
        Err(match status.as_u16() {
            // The sidecar answers 409 while its client is not ready.
            409 | 503 => NudgeError::ChannelUnavailable {
                channel: ChannelKind::WhatsApp,
                message,
            },
            400..=499 => NudgeError::DeliveryRejected {
                channel: ChannelKind::WhatsApp,
                message,
            },
            _ => NudgeError::Channel {
                message,
                source: None,
            },
        })
    }

    async fn logout(&self) -> Result<(), NudgeError> {
        self.command("/session/logout", serde_json::json!({})).await
    }

    async fn destroy(&self) -> Result<(), NudgeError> {
        self.stop_events().await;
        self.command("/session/stop", serde_json::json!({})).await
    }

    async fn purge_credentials(&self) -> Result<(), NudgeError> {
        match tokio::fs::remove_dir_all(&self.auth_dir).await {
            Ok(()) => {
                info!(dir = %self.auth_dir.display(), "whatsapp credentials purged");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(NudgeError::Session(format!(
                "failed to purge credentials in {}: {e}",
                self.auth_dir.display()
            ))),
        }
    }

    fn has_persisted_credentials(&self) -> bool {
        std::fs::read_dir(&self.auth_dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }
}
