//! Route tests.
//!
//! Uses `tower::ServiceExt` to drive the Axum router without a real HTTP server,
//! with in-memory storage behind the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use taskbell_api::routes::create_router;
use taskbell_api::state::AppState;
use taskbell_common::config::AppConfig;
use taskbell_engine::NotificationOrchestrator;
use taskbell_engine::memory::{InMemoryNotificationRepository, InMemoryUserDirectory};
use taskbell_notifier::Gateways;
use taskbell_notifier::broker::Broker;
use taskbell_notifier::realtime::{RealtimePublisher, user_topic};

// ============================================================
// Helpers
// ============================================================

fn test_config(webhook_url: Option<&str>) -> AppConfig {
    AppConfig {
        database_url: "unused".to_string(),
        redis_url: None,
        db_max_connections: 1,
        api_port: 0,
        line_channel_access_token: None,
        line_api_base_url: "http://127.0.0.1:9".to_string(),
        webhook_url: webhook_url.map(str::to_string),
        webhook_secret: "test-secret".to_string(),
        gateway_timeout_secs: 2,
        scheduler_enabled: false,
        scheduler_interval_secs: 3600,
        scheduler_lookahead_hours: 12,
        broker_handler_timeout_ms: 1000,
        broker_queue_capacity: 16,
    }
}

fn build_app(config: &AppConfig) -> Router {
    build_app_with_publisher(config, RealtimePublisher::new(Broker::default()))
}

fn build_app_with_publisher(config: &AppConfig, publisher: RealtimePublisher) -> Router {
    let gateways = Gateways::from_config(config, publisher.clone()).unwrap();
    let orchestrator = Arc::new(NotificationOrchestrator::new(
        Arc::new(InMemoryNotificationRepository::new()),
        Arc::new(InMemoryUserDirectory::with_users(["u1", "u2"])),
        gateways,
    ));
    create_router(AppState::new(
        orchestrator,
        publisher,
        CancellationToken::new(),
    ))
}

fn app() -> Router {
    build_app(&test_config(None))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn create(app: &Router, user_id: &str, channels: &[&str]) -> Value {
    let (status, json) = call(
        app,
        "POST",
        "/api/notifications",
        Some(json!({
            "user_id": user_id,
            "type": "task_assigned",
            "title": "New task",
            "message": "You were assigned a task",
            "metadata": {"task_id": "t-1"},
            "channels": channels,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create failed: {}", json);
    json
}

// ============================================================
// Tests
// ============================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (status, json) = call(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "taskbell-api");
}

#[tokio::test]
async fn test_create_then_fetch() {
    let app = app();
    let created = create(&app, "u1", &["app"]).await;

    assert_eq!(created["status"], "pending");
    assert_eq!(created["type"], "task_assigned");
    assert_eq!(created["channels"][0]["type"], "app");

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = call(&app, "GET", &format!("/api/notifications/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);
    assert_eq!(fetched["metadata"]["task_id"], "t-1");
}

#[tokio::test]
async fn test_create_validation_and_unknown_user() {
    let app = app();

    let (status, json) = call(
        &app,
        "POST",
        "/api/notifications",
        Some(json!({
            "user_id": "u1",
            "type": "system_notice",
            "title": "Maintenance",
            "message": "Tonight",
            "channels": [],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "at least one channel is required");

    let (status, _) = call(
        &app,
        "POST",
        "/api/notifications",
        Some(json!({
            "user_id": "nobody",
            "type": "system_notice",
            "title": "Maintenance",
            "message": "Tonight",
            "channels": ["app"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_send_read_and_unread_count() {
    let app = app();
    let created = create(&app, "u1", &["app", "webhook"]).await;
    let id = created["id"].as_str().unwrap();

    let (status, json) = call(&app, "GET", "/api/users/u1/notifications/unread-count", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);

    let (status, json) = call(&app, "POST", &format!("/api/notifications/{}/send", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "sent");

    // Second send is a no-op.
    let (status, json) = call(&app, "POST", &format!("/api/notifications/{}/send", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "sent");

    let (status, json) = call(&app, "POST", &format!("/api/notifications/{}/read", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "read");

    let (_, json) = call(&app, "GET", "/api/users/u1/notifications/unread-count", None).await;
    assert_eq!(json["count"], 0);

    let (_, fetched) = call(&app, "GET", &format!("/api/notifications/{}", id), None).await;
    assert_eq!(fetched["status"], "read");
    assert!(fetched["sent_at"].is_string());
}

#[tokio::test]
async fn test_send_with_unreachable_webhook_is_partial_delivery() {
    // Nothing listens on the discard port, so the webhook call fails.
    let app = build_app(&test_config(Some("http://127.0.0.1:9/hooks/taskbell")));
    let created = create(&app, "u1", &["app", "webhook"]).await;
    let id = created["id"].as_str().unwrap();

    let (status, json) = call(&app, "POST", &format!("/api/notifications/{}/send", id), None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "failed to send to 1 channels");

    let (_, fetched) = call(&app, "GET", &format!("/api/notifications/{}", id), None).await;
    assert_eq!(fetched["status"], "failed");
}

#[tokio::test]
async fn test_list_user_notifications_paginates() {
    let app = app();
    for _ in 0..3 {
        create(&app, "u1", &["app"]).await;
    }
    create(&app, "u2", &["app"]).await;

    let (status, json) = call(&app, "GET", "/api/users/u1/notifications", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 3);

    let (_, json) = call(&app, "GET", "/api/users/u1/notifications?limit=2&offset=0", None).await;
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (_, json) = call(&app, "GET", "/api/users/u1/notifications?limit=2&offset=2", None).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_and_malformed_ids() {
    let app = app();
    let missing = uuid::Uuid::new_v4();

    let (status, _) = call(&app, "GET", &format!("/api/notifications/{}", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "POST", &format!("/api/notifications/{}/read", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "GET", "/api/notifications/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stream_receives_live_notification() {
    let app = app();
    let created = create(&app, "u1", &["app"]).await;
    let id = created["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/users/u1/notifications/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
    let mut frames = response.into_body().into_data_stream();

    let (status, _) = call(&app, "POST", &format!("/api/notifications/{}/send", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let frame = tokio::time::timeout(Duration::from_secs(2), frames.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("event: notification"), "unexpected frame: {}", text);
    assert!(text.contains(&id));
}

#[tokio::test]
async fn test_stream_subscription_ends_when_client_disconnects() {
    let publisher = RealtimePublisher::new(Broker::default());
    let app = build_app_with_publisher(&test_config(None), publisher.clone());
    let topic = user_topic("u1");

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/users/u1/notifications/stream")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(publisher.broker().subscriber_count(&topic), 1);

        drop(response);
        assert_eq!(publisher.broker().subscriber_count(&topic), 0);
    }

    // Nothing is left to deliver to once every client is gone.
    assert_eq!(publisher.broker().publish(&topic, json!({"type": "notification"})), 0);
}
