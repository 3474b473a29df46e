//! Notification routes.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use taskbell_common::error::AppError;
use taskbell_common::notification::Notification;
use taskbell_common::types::CreateNotificationInput;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", post(create_notification))
        .route("/api/notifications/{id}", get(get_notification))
        .route("/api/notifications/{id}/send", post(send_notification))
        .route("/api/notifications/{id}/read", post(mark_as_read))
        .route("/api/users/{user_id}/notifications", get(list_user_notifications))
        .route(
            "/api/users/{user_id}/notifications/unread-count",
            get(unread_count),
        )
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// POST /api/notifications: Create a pending notification.
async fn create_notification(
    State(state): State<AppState>,
    Json(input): Json<CreateNotificationInput>,
) -> Result<Json<Notification>, AppError> {
    let notification = state.orchestrator.create_notification(input).await?;
    Ok(Json(notification))
}

/// GET /api/notifications/:id
async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let notification = state.orchestrator.get_notification(id).await?;
    Ok(Json(notification))
}

/// POST /api/notifications/:id/send: Deliver over every channel.
async fn send_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let cancel = state.shutdown.child_token();
    let status = state.orchestrator.send_notification(id, &cancel).await?;
    Ok(Json(json!({ "status": status })))
}

/// POST /api/notifications/:id/read
async fn mark_as_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.orchestrator.mark_notification_as_read(id).await?;
    Ok(Json(json!({ "status": "read" })))
}

/// GET /api/users/:user_id/notifications?limit=&offset=
async fn list_user_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = state
        .orchestrator
        .get_user_notifications(&user_id, page.limit, page.offset)
        .await?;
    Ok(Json(notifications))
}

/// GET /api/users/:user_id/notifications/unread-count
async fn unread_count(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let count = state
        .orchestrator
        .get_unread_notification_count(&user_id)
        .await?;
    Ok(Json(json!({ "count": count })))
}
