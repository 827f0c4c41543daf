// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway.
//!
//! Handles the cron trigger, the WhatsApp session/pairing API and the public
//! health probe.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use nudge_core::{HealthStatus, NudgeError, PluginAdapter, SessionSnapshot, SessionStatus};
use nudge_dispatch::TickReport;
use nudge_whatsapp::SessionManager;
use qrcode::QrCode;
use qrcode::render::svg;
use serde::{Deserialize, Serialize};

use crate::server::GatewayState;

/// Response body of the cron trigger.
#[derive(Debug, Serialize)]
pub struct TickResponse {
    pub ok: bool,
    /// Reminders that reached SENT, FAILED or SKIPPED.
    pub processed: usize,
    pub report: TickReport,
}

/// Response body for GET /api/whatsapp/status.
#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub status: SessionStatus,
    pub has_qr: bool,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl From<SessionSnapshot> for SessionStatusResponse {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            status: snapshot.status,
            has_qr: snapshot.status == SessionStatus::QrPending && snapshot.qr.is_some(),
            last_connected_at: snapshot.last_connected_at,
            last_error: snapshot.last_error,
        }
    }
}

/// Response body for GET /api/whatsapp/qr.
///
/// `qr` and `svg` are only present while the session waits for a scan.
#[derive(Debug, Serialize)]
pub struct QrResponse {
    pub status: SessionStatus,
    pub qr: Option<String>,
    pub svg: Option<String>,
}

/// Request body for POST /api/whatsapp/send.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Phone number in international or national format.
    pub to: String,
    pub message: String,
}

/// Response body for POST /api/whatsapp/send.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub ok: bool,
    pub message_id: String,
}

/// Response body for simple acknowledgements.
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

/// One component of the health report.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<HealthStatus> for ComponentHealth {
    fn from(health: HealthStatus) -> Self {
        match health {
            HealthStatus::Healthy => Self {
                status: "healthy",
                detail: None,
            },
            HealthStatus::Degraded(detail) => Self {
                status: "degraded",
                detail: Some(detail),
            },
            HealthStatus::Unhealthy(detail) => Self {
                status: "unhealthy",
                detail: Some(detail),
            },
        }
    }
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub uptime_secs: u64,
    pub components: BTreeMap<String, ComponentHealth>,
}

fn error_body(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            ok: false,
            error: error.into(),
        }),
    )
        .into_response()
}

/// Maps an engine error to the HTTP status a caller can act on.
fn error_response(e: &NudgeError) -> Response {
    let status = match e {
        NudgeError::InvalidDestination { .. } | NudgeError::Config(_) => StatusCode::BAD_REQUEST,
        NudgeError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        NudgeError::DeliveryRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        NudgeError::ChannelUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        NudgeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        NudgeError::Channel { .. } | NudgeError::Session(_) => StatusCode::BAD_GATEWAY,
        NudgeError::Storage { .. }
        | NudgeError::AdapterNotFound { .. }
        | NudgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_body(status, e.to_string())
}

fn session_or_404(state: &GatewayState) -> Result<&SessionManager, Response> {
    state
        .session
        .as_ref()
        .ok_or_else(|| error_body(StatusCode::NOT_FOUND, "whatsapp channel is disabled"))
}

/// GET|POST /api/cron/reminders
///
/// Runs one dispatch tick. Fails only when the claim step fails; individual
/// reminder failures are part of the report.
pub async fn run_reminders(State(state): State<GatewayState>) -> Response {
    match state.dispatcher.run_tick().await {
        Ok(report) => (
            StatusCode::OK,
            Json(TickResponse {
                ok: true,
                processed: report.processed(),
                report,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "cron-triggered tick failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/whatsapp/status
pub async fn whatsapp_status(State(state): State<GatewayState>) -> Response {
    match session_or_404(&state) {
        Ok(session) => Json(SessionStatusResponse::from(session.get_status())).into_response(),
        Err(response) => response,
    }
}

/// GET /api/whatsapp/qr
///
/// Returns the raw pairing payload and an SVG rendering of it.
pub async fn whatsapp_qr(State(state): State<GatewayState>) -> Response {
    let session = match session_or_404(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };
    let status = session.get_status().status;
    let Some(qr) = session.get_qr() else {
        return Json(QrResponse {
            status,
            qr: None,
            svg: None,
        })
        .into_response();
    };

    match QrCode::new(qr.as_bytes()) {
        Ok(code) => {
            let svg = code
                .render::<svg::Color>()
                .min_dimensions(256, 256)
                .build();
            Json(QrResponse {
                status,
                qr: Some(qr),
                svg: Some(svg),
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to encode pairing code");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, format!("failed to encode QR code: {e}"))
        }
    }
}

/// POST /api/whatsapp/initialize
///
/// Idempotent: an active session is returned unchanged.
pub async fn whatsapp_initialize(State(state): State<GatewayState>) -> Response {
    let session = match session_or_404(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match session.initialize().await {
        Ok(snapshot) => Json(SessionStatusResponse::from(snapshot)).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "whatsapp initialize failed");
            error_response(&e)
        }
    }
}

/// POST /api/whatsapp/logout
pub async fn whatsapp_logout(State(state): State<GatewayState>) -> Response {
    let session = match session_or_404(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match session.logout().await {
        Ok(()) => Json(OkResponse { ok: true }).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "whatsapp logout failed");
            error_response(&e)
        }
    }
}

/// POST /api/whatsapp/send
///
/// Manual send for testing a paired session.
pub async fn whatsapp_send(
    State(state): State<GatewayState>,
    Json(body): Json<SendRequest>,
) -> Response {
    let session = match session_or_404(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };
    if body.message.trim().is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "message must not be empty");
    }
    match session.send_message(&body.to, &body.message).await {
        Ok(id) => Json(SendResponse {
            ok: true,
            message_id: id.0,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /health
///
/// 503 when the store is down or no channel can deliver; degraded channels
/// still answer 200.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let store = state
        .dispatcher
        .store()
        .health_check()
        .await
        .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));

    let mut components = BTreeMap::new();
    let mut channels_down = 0;
    let channels = state.dispatcher.channels();
    for kind in channels.kinds() {
        let Some(channel) = channels.get(kind) else {
            continue;
        };
        let health = channel
            .health_check()
            .await
            .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
        if matches!(health, HealthStatus::Unhealthy(_)) {
            channels_down += 1;
        }
        components.insert(kind.to_string(), ComponentHealth::from(health));
    }

    let any_degraded = components.values().any(|c| c.status != "healthy");
    let store_down = matches!(store, HealthStatus::Unhealthy(_));
    components.insert("store".to_string(), ComponentHealth::from(store));

    let status = if store_down || (!channels.is_empty() && channels_down == channels.len()) {
        "unhealthy"
    } else if any_degraded || channels.is_empty() {
        "degraded"
    } else {
        "ok"
    };
    let code = if status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: state.start_time.elapsed().as_secs(),
            components,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_request_deserializes() {
        let req: SendRequest =
            serde_json::from_str(r#"{"to": "+62 812 3456 7890", "message": "hi"}"#).unwrap();
        assert_eq!(req.to, "+62 812 3456 7890");
        assert_eq!(req.message, "hi");
    }

    #[test]
    fn status_response_hides_stale_qr_flag() {
        let snapshot = SessionSnapshot {
            status: SessionStatus::Connected,
            qr: Some("left-over".into()),
            ..SessionSnapshot::default()
        };
        let resp = SessionStatusResponse::from(snapshot);
        assert!(!resp.has_qr);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""status":"CONNECTED""#));
    }

    #[test]
    fn component_health_carries_detail() {
        let json = serde_json::to_string(&ComponentHealth::from(HealthStatus::Degraded(
            "session is QR_PENDING".into(),
        )))
        .unwrap();
        assert!(json.contains(r#""status":"degraded""#));
        assert!(json.contains("QR_PENDING"));

        let json = serde_json::to_string(&ComponentHealth::from(HealthStatus::Healthy)).unwrap();
        assert!(!json.contains("detail"));
    }

    #[test]
    fn errors_map_to_actionable_status_codes() {
        use nudge_core::ChannelKind;

        let cases = [
            (
                NudgeError::InvalidDestination {
                    destination: "abc".into(),
                    reason: "not a number".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                NudgeError::ChannelUnavailable {
                    channel: ChannelKind::WhatsApp,
                    message: "session is DISCONNECTED".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                NudgeError::Timeout {
                    duration: std::time::Duration::from_secs(30),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                NudgeError::Session("bridge crashed".into()),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error_response(&error).status(), expected, "{error}");
        }
    }
}
