//! Outbound webhook gateway.
//!
//! POSTs `{"event", "payload", "timestamp"}` as JSON with the shared secret in
//! `X-Webhook-Secret`. Anything other than `200 OK` is a failure. Without a
//! configured endpoint the gateway does nothing.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use taskbell_common::types::{ChannelType, Metadata, NOTIFICATION_ID_KEY, NOTIFICATION_TYPE_KEY};

use crate::{GatewayError, NotificationGateway};

pub const SECRET_HEADER: &str = "X-Webhook-Secret";

#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
    /// Endpoint URL. `None` disables the gateway.
    pub url: Option<String>,
    pub secret: String,
}

pub struct WebhookGateway {
    config: WebhookConfig,
    client: Client,
}

impl WebhookGateway {
    pub fn new(config: WebhookConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn build_payload(
        user_id: &str,
        title: &str,
        message: &str,
        metadata: &Metadata,
        timestamp: i64,
    ) -> Value {
        let notification_type = metadata
            .get(NOTIFICATION_TYPE_KEY)
            .map(String::as_str)
            .unwrap_or("app_notification");

        json!({
            "event": format!("notification.{}", notification_type),
            "payload": {
                "notification_id": metadata.get(NOTIFICATION_ID_KEY),
                "user_id": user_id,
                "type": notification_type,
                "title": title,
                "message": message,
                "metadata": metadata,
            },
            "timestamp": timestamp,
        })
    }
}

#[async_trait]
impl NotificationGateway for WebhookGateway {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Webhook
    }

    async fn send_notification(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        metadata: &Metadata,
    ) -> Result<(), GatewayError> {
        let Some(url) = self.config.url.as_deref() else {
            tracing::debug!(user_id, "Webhook endpoint not configured, skipping");
            return Ok(());
        };

        let payload =
            Self::build_payload(user_id, title, message, metadata, Utc::now().timestamp());

        let response = self
            .client
            .post(url)
            .header(SECRET_HEADER, &self.config.secret)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(user_id, status = status.as_u16(), "Webhook delivery failed");
            return Err(GatewayError::Status {
                gateway: "webhook",
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(user_id, "Webhook delivered");
        Ok(())
    }
}
