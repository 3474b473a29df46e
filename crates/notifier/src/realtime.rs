//! Typed live-update publishing over the broker.
//!
//! Every user has one topic, `user.<user_id>.notifications`. Events are wrapped
//! in a small envelope: `{"type": ..., "data": ..., "timestamp": ...}`.

use std::future::Future;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use taskbell_common::types::{Metadata, NotificationStatus};

use crate::broker::{Broker, BrokerError, Subscription};

pub const EVENT_NOTIFICATION: &str = "notification";
pub const EVENT_NOTIFICATION_READ: &str = "notification_read";
pub const EVENT_NOTIFICATION_STATUS: &str = "notification_status";

/// Topic carrying live notification events for `user_id`.
pub fn user_topic(user_id: &str) -> String {
    format!("user.{}.notifications", user_id)
}

/// Notification as pushed to a live client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveNotification {
    pub notification_id: Option<String>,
    #[serde(rename = "type")]
    pub notification_type: Option<String>,
    pub title: String,
    pub message: String,
    pub metadata: Metadata,
}

/// Publishes per-user live events.
#[derive(Clone)]
pub struct RealtimePublisher {
    broker: Broker,
}

impl RealtimePublisher {
    pub fn new(broker: Broker) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Publish an arbitrary event to the user's topic.
    pub fn publish_to_user(&self, user_id: &str, event_type: &str, data: Value) -> usize {
        let envelope = json!({
            "type": event_type,
            "data": data,
            "timestamp": Utc::now().to_rfc3339(),
        });
        let queued = self.broker.publish(&user_topic(user_id), envelope);

        tracing::debug!(user_id, event_type, queued, "Published live event");
        queued
    }

    /// Push a new notification to the user's live feed.
    pub fn publish_notification(&self, user_id: &str, notification: &LiveNotification) -> usize {
        let data = json!({
            "notification_id": notification.notification_id,
            "type": notification.notification_type,
            "title": notification.title,
            "message": notification.message,
            "metadata": notification.metadata,
        });
        self.publish_to_user(user_id, EVENT_NOTIFICATION, data)
    }

    /// Tell the user's live clients that a notification was read.
    pub fn publish_notification_read(&self, user_id: &str, notification_id: Uuid) -> usize {
        self.publish_to_user(
            user_id,
            EVENT_NOTIFICATION_READ,
            json!({ "notification_id": notification_id }),
        )
    }

    /// Tell the user's live clients that a notification's delivery status changed.
    pub fn publish_status_change(
        &self,
        user_id: &str,
        notification_id: Uuid,
        status: NotificationStatus,
    ) -> usize {
        self.publish_to_user(
            user_id,
            EVENT_NOTIFICATION_STATUS,
            json!({ "notification_id": notification_id, "status": status }),
        )
    }

    /// Subscribe a handler to the user's topic.
    pub fn subscribe_user<F, Fut>(&self, user_id: &str, handler: F) -> Subscription
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BrokerError>> + Send + 'static,
    {
        self.broker.subscribe(user_topic(user_id), handler)
    }
}
