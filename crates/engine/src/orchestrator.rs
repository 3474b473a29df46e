//! Notification orchestrator.
//!
//! Validates creation requests, persists notifications, and coordinates
//! delivery across the configured channel gateways:
//! 1. `create_notification` validates input and stores a `Pending` notification
//! 2. `send_notification` tries every channel, then records `Sent` or `Failed`
//!    unless the notification was read meanwhile
//! 3. `mark_notification_as_read` records `Read` and notifies live clients

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use taskbell_common::error::AppError;
use taskbell_common::notification::Notification;
use taskbell_common::types::{
    Channel, ChannelType, CreateNotificationInput, LINE_USER_ID_KEY, Metadata,
    NOTIFICATION_ID_KEY, NOTIFICATION_TYPE_KEY, NotificationStatus,
};
use taskbell_notifier::Gateways;

use crate::ports::{NotificationRepository, UserValidator};

/// Page size used when the caller gives none.
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

/// Largest page a caller may request.
pub const MAX_PAGE_LIMIT: i64 = 100;

pub struct NotificationOrchestrator {
    repository: Arc<dyn NotificationRepository>,
    users: Arc<dyn UserValidator>,
    gateways: Gateways,
}

impl NotificationOrchestrator {
    pub fn new(
        repository: Arc<dyn NotificationRepository>,
        users: Arc<dyn UserValidator>,
        gateways: Gateways,
    ) -> Self {
        Self {
            repository,
            users,
            gateways,
        }
    }

    /// Validate `input`, build the notification and store it as `Pending`.
    ///
    /// Input problems are reported before the user validator or the repository
    /// is called.
    pub async fn create_notification(
        &self,
        input: CreateNotificationInput,
    ) -> Result<Notification, AppError> {
        if input.user_id.trim().is_empty() {
            return Err(AppError::Validation("user ID is required".to_string()));
        }
        if input.title.trim().is_empty() {
            return Err(AppError::Validation("title is required".to_string()));
        }
        if input.channels.is_empty() {
            return Err(AppError::Validation(
                "at least one channel is required".to_string(),
            ));
        }
        if input.message.trim().is_empty() {
            return Err(AppError::Validation("message is required".to_string()));
        }
        let channel_types = Self::parse_channels(&input.channels)?;

        let exists = self.users.user_exists(&input.user_id).await.map_err(|e| {
            AppError::Dependency(format!("failed to validate user {}: {}", input.user_id, e))
        })?;
        if !exists {
            return Err(AppError::NotFound(format!("User {} not found", input.user_id)));
        }

        let notification = channel_types
            .into_iter()
            .map(|channel_type| Channel::resolve(channel_type, &input.user_id, &input.metadata))
            .fold(
                Notification::builder(
                    input.user_id.as_str(),
                    input.notification_type,
                    input.title.as_str(),
                    input.message.as_str(),
                ),
                |builder, channel| builder.add_channel(channel),
            )
            .metadata(input.metadata)
            .build()?;

        self.repository.save(&notification).await?;

        tracing::info!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            notification_type = %notification.notification_type,
            channels = notification.channels().len(),
            "Notification created"
        );

        Ok(notification)
    }

    /// Deliver a notification over every attached channel.
    ///
    /// Already delivered notifications (`Sent` or `Read`) are left untouched.
    /// Every channel is attempted; if any fails the notification is stored as
    /// `Failed` and `AppError::PartialDelivery` reports how many failed. A
    /// `Failed` notification may be sent again.
    ///
    /// The outcome is only recorded if the status is unchanged since it was
    /// loaded, so a read that lands mid-send is kept. Recorded outcomes are also
    /// pushed to the user's live clients.
    ///
    /// Once `cancel` fires no further channel is started. The notification then
    /// keeps its previous status and `AppError::Cancelled` is returned.
    pub async fn send_notification(
        &self,
        notification_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<NotificationStatus, AppError> {
        let mut notification = self.get_notification(notification_id).await?;

        if notification.status.is_delivered() {
            tracing::debug!(
                notification_id = %notification_id,
                status = %notification.status,
                "Notification already delivered, skipping send"
            );
            return Ok(notification.status);
        }

        let metadata = Self::dispatch_metadata(&notification);
        let total = notification.channels().len();
        let mut failed = 0usize;

        for channel in notification.channels() {
            if cancel.is_cancelled() {
                tracing::warn!(
                    notification_id = %notification_id,
                    "Send cancelled before all channels were attempted"
                );
                return Err(AppError::Cancelled);
            }

            let channel_type = channel.channel_type();
            let result = self
                .gateways
                .for_channel(channel_type)
                .send_notification(
                    &notification.user_id,
                    &notification.title,
                    &notification.message,
                    &metadata,
                )
                .await;

            match result {
                Ok(()) => {
                    tracing::debug!(
                        notification_id = %notification_id,
                        channel = %channel_type,
                        "Channel delivered"
                    );
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        notification_id = %notification_id,
                        channel = %channel_type,
                        error = %e,
                        "Channel delivery failed"
                    );
                }
            }
        }

        let loaded_status = notification.status;
        let now = Utc::now();
        if failed == 0 {
            notification.mark_sent(now);
        } else {
            notification.mark_failed(now);
        }

        let recorded = self
            .repository
            .record_send_outcome(
                notification_id,
                loaded_status,
                notification.status,
                notification.sent_at,
            )
            .await?;

        tracing::info!(
            notification_id = %notification_id,
            status = %notification.status,
            recorded,
            failed,
            total,
            "Notification send finished"
        );

        let status = if recorded {
            self.announce_status(&notification).await;
            notification.status
        } else {
            // Status moved on while channels were being tried, usually to Read.
            let current = self.get_notification(notification_id).await?.status;
            tracing::info!(
                notification_id = %notification_id,
                status = %current,
                "Status changed during send, outcome not recorded"
            );
            current
        };

        if failed > 0 {
            return Err(AppError::PartialDelivery { failed, total });
        }
        Ok(status)
    }

    /// Push the recorded outcome to the user's live clients. Best effort.
    async fn announce_status(&self, notification: &Notification) {
        if let Err(e) = self
            .gateways
            .app()
            .notify_status_change(&notification.user_id, notification.id, notification.status)
            .await
        {
            tracing::warn!(
                notification_id = %notification.id,
                error = %e,
                "Live status update failed"
            );
        }
    }

    /// Record the notification as read, whatever its current status.
    ///
    /// The in-app read acknowledgement is best effort: its failure is logged
    /// and the call still succeeds.
    pub async fn mark_notification_as_read(&self, notification_id: Uuid) -> Result<(), AppError> {
        self.repository
            .update_status(notification_id, NotificationStatus::Read)
            .await?;

        tracing::info!(notification_id = %notification_id, "Notification marked as read");

        match self.repository.find_by_id(notification_id).await {
            Ok(Some(notification)) => {
                if let Err(e) = self
                    .gateways
                    .app()
                    .acknowledge_read(&notification.user_id, notification_id)
                    .await
                {
                    tracing::warn!(
                        notification_id = %notification_id,
                        error = %e,
                        "In-app read acknowledgement failed"
                    );
                }
            }
            Ok(None) => {
                tracing::warn!(
                    notification_id = %notification_id,
                    "Notification vanished before read acknowledgement"
                );
            }
            Err(e) => {
                tracing::warn!(
                    notification_id = %notification_id,
                    error = %e,
                    "Could not load notification for read acknowledgement"
                );
            }
        }

        Ok(())
    }

    pub async fn get_notification(&self, notification_id: Uuid) -> Result<Notification, AppError> {
        self.repository
            .find_by_id(notification_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", notification_id)))
    }

    /// A page of the user's notifications, newest first.
    pub async fn get_user_notifications(
        &self,
        user_id: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Notification>, AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::Validation("user ID is required".to_string()));
        }
        let (limit, offset) = clamp_page(limit, offset);
        self.repository.find_by_user(user_id, limit, offset).await
    }

    pub async fn get_unread_notification_count(&self, user_id: &str) -> Result<i64, AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::Validation("user ID is required".to_string()));
        }
        self.repository.count_unread(user_id).await
    }

    /// Parse requested channel names, dropping repeats while keeping order.
    fn parse_channels(names: &[String]) -> Result<Vec<ChannelType>, AppError> {
        let mut channel_types = Vec::with_capacity(names.len());
        for name in names {
            let channel_type: ChannelType = name.parse()?;
            if !channel_types.contains(&channel_type) {
                channel_types.push(channel_type);
            }
        }
        Ok(channel_types)
    }

    /// Metadata handed to gateways: the notification's own metadata plus its id,
    /// its type, and the LINE recipient resolved at creation.
    fn dispatch_metadata(notification: &Notification) -> Metadata {
        let mut metadata = notification.metadata.clone();
        metadata.insert(NOTIFICATION_ID_KEY.to_string(), notification.id.to_string());
        metadata.insert(
            NOTIFICATION_TYPE_KEY.to_string(),
            notification.notification_type.to_string(),
        );
        for channel in notification.channels() {
            if let Channel::Line {
                line_user_id: Some(line_user_id),
            } = channel
            {
                metadata.insert(LINE_USER_ID_KEY.to_string(), line_user_id.clone());
            }
        }
        metadata
    }
}

/// Clamp pagination: limit into `1..=100` (missing or non-positive → 10),
/// offset to at least 0.
pub fn clamp_page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = match limit {
        Some(l) if l > 0 => l.min(MAX_PAGE_LIMIT),
        _ => DEFAULT_PAGE_LIMIT,
    };
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}
