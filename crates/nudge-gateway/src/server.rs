// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use nudge_config::model::GatewayConfig;
use nudge_core::NudgeError;
use nudge_dispatch::Dispatcher;
use nudge_whatsapp::SessionManager;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Runs the tick behind the cron trigger. Also owns the store and channels.
    pub dispatcher: Arc<Dispatcher>,
    /// `None` when the WhatsApp channel is disabled.
    pub session: Option<SessionManager>,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(dispatcher: Arc<Dispatcher>, session: Option<SessionManager>) -> Self {
        Self {
            dispatcher,
            session,
            start_time: Instant::now(),
        }
    }
}

/// Builds the gateway router.
///
/// - `GET /health`, unauthenticated
/// - `GET|POST /api/cron/reminders`, guarded by `cron_secret` when set
/// - `/api/whatsapp/*`, guarded by `api_token` (fail-closed)
pub fn router(config: &GatewayConfig, state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let cron_routes = Router::new()
        .route(
            "/api/cron/reminders",
            get(handlers::run_reminders).post(handlers::run_reminders),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            AuthConfig::optional(config.cron_secret.clone()),
            auth_middleware,
        ))
        .with_state(state.clone());

    let session_routes = Router::new()
        .route("/api/whatsapp/status", get(handlers::whatsapp_status))
        .route("/api/whatsapp/qr", get(handlers::whatsapp_qr))
        .route("/api/whatsapp/initialize", post(handlers::whatsapp_initialize))
        .route("/api/whatsapp/logout", post(handlers::whatsapp_logout))
        .route("/api/whatsapp/send", post(handlers::whatsapp_send))
        .route_layer(axum_middleware::from_fn_with_state(
            AuthConfig::required(config.api_token.clone()),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(cron_routes)
        .merge(session_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves the gateway until `cancel` fires, then drains in-flight requests.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), NudgeError> {
    if config.api_token.is_none() {
        tracing::warn!("gateway.api_token is not set; the WhatsApp session API will reject every call");
    }
    let app = router(config, state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| NudgeError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| NudgeError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
