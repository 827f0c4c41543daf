// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram channel against a stubbed Bot API server.

use nudge_config::model::TelegramConfig;
use nudge_core::{Notification, NotificationChannel, NudgeError, PluginAdapter, HealthStatus};
use nudge_telegram::TelegramChannel;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEND_PATH: &str = r"(?i)^/bot[^/]+/sendmessage$";

async fn channel(server: &MockServer) -> TelegramChannel {
    TelegramChannel::new(&TelegramConfig {
        bot_token: Some("42:test-token".into()),
    })
    .unwrap()
    .with_api_url(&server.uri())
    .unwrap()
}

fn notification() -> Notification {
    Notification {
        reminder_id: "r1".into(),
        subject: "Reminder: Pay invoice".into(),
        body: "Due today.".into(),
    }
}

fn sent_message(id: i32) -> serde_json::Value {
    json!({
        "ok": true,
        "result": {
            "message_id": id,
            "date": 1_767_225_600,
            "chat": { "id": 100200300, "type": "private", "first_name": "Test" },
            "from": { "id": 42, "is_bot": true, "first_name": "Nudge" },
            "text": "Reminder: Pay invoice\n\nDue today."
        }
    })
}

fn api_error(code: u16, description: &str) -> serde_json::Value {
    json!({ "ok": false, "error_code": code, "description": description })
}

#[tokio::test]
async fn delivers_as_markdown_v2() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(SEND_PATH))
        .and(body_partial_json(json!({
            "chat_id": 100200300,
            "parse_mode": "MarkdownV2",
            "text": "*Reminder: Pay invoice*\n\nDue today\\."
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(sent_message(7)))
        .expect(1)
        .mount(&server)
        .await;

    let id = channel(&server)
        .await
        .send("100200300", &notification())
        .await
        .unwrap();
    assert_eq!(id.0, "7");
}

#[tokio::test]
async fn unknown_chat_is_a_permanent_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(SEND_PATH))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(api_error(400, "Bad Request: chat not found")),
        )
        .mount(&server)
        .await;

    let err = channel(&server)
        .await
        .send("100200300", &notification())
        .await
        .unwrap_err();
    assert!(matches!(err, NudgeError::DeliveryRejected { .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn garbled_response_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(SEND_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let err = channel(&server)
        .await
        .send("100200300", &notification())
        .await
        .unwrap_err();
    assert!(matches!(err, NudgeError::Channel { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn malformed_target_never_reaches_the_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sent_message(1)))
        .expect(0)
        .mount(&server)
        .await;

    let err = channel(&server)
        .await
        .send("+62 812 3456 7890", &notification())
        .await
        .unwrap_err();
    assert!(matches!(err, NudgeError::InvalidDestination { .. }));
}

#[tokio::test]
async fn health_reports_unreachable_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(api_error(401, "Unauthorized")))
        .mount(&server)
        .await;

    let health = channel(&server).await.health_check().await.unwrap();
    assert!(matches!(health, HealthStatus::Unhealthy(_)));
}
