//! Notification aggregate.
//!
//! A notification is built once through [`NotificationBuilder`], which rejects
//! empty identity fields and an empty channel list. After construction only the
//! status and timestamps change, through the transition methods below.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::types::{Channel, Metadata, NotificationStatus, NotificationType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub status: NotificationStatus,
    channels: Vec<Channel>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn builder(
        user_id: impl Into<String>,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> NotificationBuilder {
        NotificationBuilder {
            user_id: user_id.into(),
            notification_type,
            title: title.into(),
            message: message.into(),
            metadata: Metadata::new(),
            channels: Vec::new(),
        }
    }

    /// Channels fixed at construction.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Record a successful delivery. `sent_at` keeps the first delivery time.
    pub fn mark_sent(&mut self, now: DateTime<Utc>) {
        self.status = NotificationStatus::Sent;
        self.sent_at.get_or_insert(now);
        self.updated_at = now;
    }

    /// Record a delivery where at least one channel failed.
    pub fn mark_failed(&mut self, now: DateTime<Utc>) {
        self.status = NotificationStatus::Failed;
        self.updated_at = now;
    }

    /// Mark as read. Allowed from every status.
    pub fn mark_read(&mut self, now: DateTime<Utc>) {
        self.status = NotificationStatus::Read;
        self.updated_at = now;
    }
}

/// Staged construction of a [`Notification`].
#[derive(Debug, Clone)]
pub struct NotificationBuilder {
    user_id: String,
    notification_type: NotificationType,
    title: String,
    message: String,
    metadata: Metadata,
    channels: Vec<Channel>,
}

impl NotificationBuilder {
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn add_channel(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self
    }

    /// Finish construction as a fresh `Pending` notification.
    pub fn build(self) -> Result<Notification, AppError> {
        self.build_at(Utc::now())
    }

    pub fn build_at(self, now: DateTime<Utc>) -> Result<Notification, AppError> {
        if self.user_id.trim().is_empty() {
            return Err(AppError::Validation("user ID is required".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("title is required".to_string()));
        }
        if self.channels.is_empty() {
            return Err(AppError::Validation(
                "at least one channel is required".to_string(),
            ));
        }
        if self.message.trim().is_empty() {
            return Err(AppError::Validation("message is required".to_string()));
        }

        Ok(Notification {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            notification_type: self.notification_type,
            title: self.title,
            message: self.message,
            status: NotificationStatus::Pending,
            channels: self.channels,
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
            sent_at: None,
        })
    }
}
