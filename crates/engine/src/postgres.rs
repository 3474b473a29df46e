//! PostgreSQL adapters for the collaborator ports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use taskbell_common::error::AppError;
use taskbell_common::notification::Notification;
use taskbell_common::types::{
    Channel, Metadata, NotificationStatus, NotificationType, Task, TaskFilter,
};

use crate::ports::{NotificationRepository, TaskSource, UserValidator};

/// Row shape of the `notifications` table.
#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: String,
    #[sqlx(rename = "type")]
    notification_type: NotificationType,
    title: String,
    message: String,
    status: NotificationStatus,
    channels: Json<Vec<Channel>>,
    metadata: Json<Metadata>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
}

impl NotificationRow {
    /// Rebuild the aggregate, re-checking the construction invariants.
    fn into_notification(self) -> Result<Notification, AppError> {
        let builder = self
            .channels
            .0
            .into_iter()
            .fold(
                Notification::builder(
                    self.user_id,
                    self.notification_type,
                    self.title,
                    self.message,
                ),
                |builder, channel| builder.add_channel(channel),
            )
            .metadata(self.metadata.0);

        let mut notification = builder.build_at(self.created_at).map_err(|e| {
            AppError::Internal(format!("Stored notification {} is invalid: {}", self.id, e))
        })?;
        notification.id = self.id;
        notification.status = self.status;
        notification.updated_at = self.updated_at;
        notification.sent_at = self.sent_at;
        Ok(notification)
    }
}

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, type, title, message, status, channels, metadata, created_at, updated_at, sent_at";

pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn save(&self, notification: &Notification) -> Result<(), AppError> {
        // Channels and content are fixed at creation; only lifecycle columns change.
        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, user_id, type, title, message, status, channels, metadata, created_at, updated_at, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE
            SET status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at,
                sent_at = EXCLUDED.sent_at
            "#,
        )
        .bind(notification.id)
        .bind(&notification.user_id)
        .bind(notification.notification_type.to_string())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.status.to_string())
        .bind(Json(notification.channels()))
        .bind(Json(&notification.metadata))
        .bind(notification.created_at)
        .bind(notification.updated_at)
        .bind(notification.sent_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, AppError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM notifications WHERE id = $1",
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(NotificationRow::into_notification).transpose()
    }

    async fn update_status(&self, id: Uuid, status: NotificationStatus) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE notifications SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(status.to_string())
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(())
    }

    async fn record_send_outcome(
        &self,
        id: Uuid,
        expected: NotificationStatus,
        status: NotificationStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $1,
                updated_at = NOW(),
                sent_at = COALESCE(sent_at, $2)
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(status.to_string())
        .bind(sent_at)
        .bind(id)
        .bind(expected.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM notifications WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if !exists {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(false)
    }

    async fn find_by_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(NotificationRow::into_notification)
            .collect()
    }

    async fn count_unread(&self, user_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND status <> 'read'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserValidator for PgUserDirectory {
    async fn user_exists(&self, user_id: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }
}

pub struct PgTaskSource {
    pool: PgPool,
}

impl PgTaskSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskSource for PgTaskSource {
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
        let tasks: Vec<Task> = sqlx::query_as(
            r#"
            SELECT id, title, assignee_id, status, priority, due_date
            FROM tasks
            WHERE due_date >= $1
              AND due_date < $2
              AND ($3 = FALSE OR status <> 'done')
            ORDER BY due_date ASC, id ASC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.due_from)
        .bind(filter.due_until)
        .bind(filter.exclude_done)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(tasks)
    }
}
