// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router-level tests for the gateway, driven with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use nudge_config::model::{DispatchConfig, GatewayConfig, StorageConfig};
use nudge_core::{ChannelKind, ReminderStatus};
use nudge_dispatch::{ChannelSet, Dispatcher};
use nudge_gateway::{GatewayState, router};
use nudge_storage::SqliteReminderStore;
use nudge_test_utils::{MockChannel, ScriptedDriver, TestStore};
use nudge_whatsapp::{SessionManager, SessionSettings};
use serde_json::Value;
use tower::ServiceExt;

const API_TOKEN: &str = "api-token";
const CRON_SECRET: &str = "cron-secret";

fn gateway_config(cron_secret: Option<&str>) -> GatewayConfig {
    GatewayConfig {
        api_token: Some(API_TOKEN.into()),
        cron_secret: cron_secret.map(String::from),
        ..GatewayConfig::default()
    }
}

fn session_settings() -> SessionSettings {
    SessionSettings {
        init_timeout: Duration::from_secs(2),
        send_timeout: Duration::from_secs(1),
        auto_reconnect: false,
        reconnect_delay: Duration::from_millis(10),
        default_country_code: Some("62".into()),
    }
}

struct Harness {
    app: Router,
    fixture: TestStore,
    email: Arc<MockChannel>,
    driver: Arc<ScriptedDriver>,
}

async fn harness(driver: ScriptedDriver, cron_secret: Option<&str>) -> Harness {
    let fixture = TestStore::new().await.unwrap();
    let email = Arc::new(MockChannel::new(ChannelKind::Email));
    let driver = Arc::new(driver);
    let session = SessionManager::new(driver.clone(), session_settings());
    let dispatcher = Arc::new(Dispatcher::new(
        fixture.store.clone(),
        ChannelSet::new().with(email.clone()),
        DispatchConfig {
            default_channels: vec![ChannelKind::Email],
            ..DispatchConfig::default()
        },
        "nudge",
    ));
    let app = router(
        &gateway_config(cron_secret),
        GatewayState::new(dispatcher, Some(session)),
    );
    Harness {
        app,
        fixture,
        email,
        driver,
    }
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn cron_trigger_runs_a_tick() {
    let h = harness(ScriptedDriver::new(), Some(CRON_SECRET)).await;
    let r = h
        .fixture
        .seed_due("t1", Utc::now(), &[ChannelKind::Email])
        .await
        .unwrap();

    let (status, body) = call(
        &h.app,
        request("POST", "/api/cron/reminders", Some(CRON_SECRET), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["processed"], 1);
    assert_eq!(body["report"]["sent"], 1);
    assert_eq!(h.email.sent_count().await, 1);
    assert_eq!(
        h.fixture.reminder(&r.id).await.unwrap().status,
        ReminderStatus::Sent
    );
}

#[tokio::test]
async fn cron_trigger_accepts_get() {
    let h = harness(ScriptedDriver::new(), Some(CRON_SECRET)).await;
    let (status, body) = call(
        &h.app,
        request("GET", "/api/cron/reminders", Some(CRON_SECRET), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 0);
}

#[tokio::test]
async fn bad_cron_secret_touches_nothing() {
    let h = harness(ScriptedDriver::new(), Some(CRON_SECRET)).await;
    let r = h
        .fixture
        .seed_due("t1", Utc::now(), &[ChannelKind::Email])
        .await
        .unwrap();

    for token in [None, Some("wrong")] {
        let (status, _) = call(&h.app, request("POST", "/api/cron/reminders", token, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    assert_eq!(h.email.call_count().await, 0);
    let untouched = h.fixture.reminder(&r.id).await.unwrap();
    assert_eq!(untouched.status, ReminderStatus::Pending);
    assert!(untouched.claim_token.is_none());
}

#[tokio::test]
async fn cron_trigger_is_open_without_secret() {
    let h = harness(ScriptedDriver::new(), None).await;
    let (status, body) = call(&h.app, request("POST", "/api/cron/reminders", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn cron_trigger_reports_store_failure() {
    // Never initialized, so every store call fails.
    let store = Arc::new(SqliteReminderStore::new(StorageConfig {
        database_path: "unused.db".into(),
        wal_mode: true,
    }));
    let dispatcher = Arc::new(Dispatcher::new(
        store,
        ChannelSet::new(),
        DispatchConfig::default(),
        "nudge",
    ));
    let app = router(&gateway_config(None), GatewayState::new(dispatcher, None));

    let (status, body) = call(&app, request("POST", "/api/cron/reminders", None, None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["ok"], false);

    let (status, body) = call(&app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["components"]["store"]["status"], "unhealthy");
}

#[tokio::test]
async fn session_api_requires_api_token() {
    let h = harness(ScriptedDriver::new(), None).await;
    for token in [None, Some("wrong"), Some(CRON_SECRET)] {
        let (status, _) = call(&h.app, request("GET", "/api/whatsapp/status", token, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn session_api_fails_closed_without_api_token() {
    let fixture = TestStore::new().await.unwrap();
    let dispatcher = Arc::new(Dispatcher::new(
        fixture.store.clone(),
        ChannelSet::new(),
        DispatchConfig::default(),
        "nudge",
    ));
    let app = router(&GatewayConfig::default(), GatewayState::new(dispatcher, None));

    let (status, _) = call(&app, request("GET", "/api/whatsapp/status", Some(""), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn pairing_flow_over_http() {
    let h = harness(ScriptedDriver::pairing("2@pairing-payload"), None).await;

    let (status, body) = call(
        &h.app,
        request("GET", "/api/whatsapp/status", Some(API_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "DISCONNECTED");

    let (status, body) = call(
        &h.app,
        request("GET", "/api/whatsapp/qr", Some(API_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["qr"].is_null());

    let (status, body) = call(
        &h.app,
        request("POST", "/api/whatsapp/initialize", Some(API_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "QR_PENDING");
    assert_eq!(body["has_qr"], true);

    let (status, body) = call(
        &h.app,
        request("GET", "/api/whatsapp/qr", Some(API_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["qr"], "2@pairing-payload");
    assert!(body["svg"].as_str().unwrap().contains("<svg"));

    // A second initialize while pairing does not relaunch the client.
    let (status, body) = call(
        &h.app,
        request("POST", "/api/whatsapp/initialize", Some(API_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "QR_PENDING");
    assert_eq!(h.driver.launches(), 1);

    let (status, body) = call(
        &h.app,
        request("POST", "/api/whatsapp/logout", Some(API_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (_, body) = call(
        &h.app,
        request("GET", "/api/whatsapp/status", Some(API_TOKEN), None),
    )
    .await;
    assert_eq!(body["status"], "DISCONNECTED");
    assert_eq!(body["has_qr"], false);
}

#[tokio::test]
async fn manual_send_through_connected_session() {
    let h = harness(ScriptedDriver::connecting(), None).await;
    call(
        &h.app,
        request("POST", "/api/whatsapp/initialize", Some(API_TOKEN), None),
    )
    .await;

    let (status, body) = call(
        &h.app,
        request(
            "POST",
            "/api/whatsapp/send",
            Some(API_TOKEN),
            Some(serde_json::json!({"to": "0812-3456-7890", "message": "hello"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let sent = h.driver.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "6281234567890@c.us");
    assert_eq!(sent[0].1, "hello");
}

#[tokio::test]
async fn manual_send_maps_failures() {
    let h = harness(ScriptedDriver::new(), None).await;

    let (status, body) = call(
        &h.app,
        request(
            "POST",
            "/api/whatsapp/send",
            Some(API_TOKEN),
            Some(serde_json::json!({"to": "+62 812 3456 7890", "message": "hello"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ok"], false);

    let (status, _) = call(
        &h.app,
        request(
            "POST",
            "/api/whatsapp/send",
            Some(API_TOKEN),
            Some(serde_json::json!({"to": "not a number", "message": "hello"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(h.driver.sent().await.is_empty());
}

#[tokio::test]
async fn session_routes_404_when_whatsapp_disabled() {
    let fixture = TestStore::new().await.unwrap();
    let dispatcher = Arc::new(Dispatcher::new(
        fixture.store.clone(),
        ChannelSet::new(),
        DispatchConfig::default(),
        "nudge",
    ));
    let app = router(&gateway_config(None), GatewayState::new(dispatcher, None));

    let (status, body) = call(
        &app,
        request("GET", "/api/whatsapp/status", Some(API_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "whatsapp channel is disabled");
}

#[tokio::test]
async fn health_is_public_and_reports_components() {
    let h = harness(ScriptedDriver::new(), Some(CRON_SECRET)).await;

    let (status, body) = call(&h.app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["components"]["store"]["status"], "healthy");
    assert_eq!(body["components"]["email"]["status"], "healthy");

    h.email
        .fail_with(|| nudge_core::NudgeError::ChannelUnavailable {
            channel: ChannelKind::Email,
            message: "relay down".into(),
        })
        .await;
    let (status, body) = call(&h.app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["components"]["email"]["status"], "unhealthy");
}
