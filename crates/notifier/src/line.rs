//! LINE Messaging API push gateway.
//!
//! Sends `POST /v2/bot/message/push` with a single text message. The recipient
//! is the LINE account id carried in the notification metadata; users without a
//! linked account are skipped rather than failed.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use taskbell_common::types::{ChannelType, LINE_USER_ID_KEY, Metadata};

use crate::{GatewayError, NotificationGateway, truncate_text};

/// LINE text message limit (characters).
const LINE_TEXT_LIMIT: usize = 5000;

#[derive(Debug, Clone)]
pub struct LineConfig {
    /// Channel access token. `None` disables the gateway.
    pub access_token: Option<String>,
    pub api_base_url: String,
}

pub struct LineGateway {
    config: LineConfig,
    client: Client,
}

impl LineGateway {
    pub fn new(config: LineConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn push_url(&self) -> String {
        format!(
            "{}/v2/bot/message/push",
            self.config.api_base_url.trim_end_matches('/')
        )
    }

    fn build_payload(to: &str, title: &str, message: &str) -> Value {
        let text = truncate_text(&format!("{}\n{}", title, message), LINE_TEXT_LIMIT);
        json!({
            "to": to,
            "messages": [{ "type": "text", "text": text }],
        })
    }
}

#[async_trait]
impl NotificationGateway for LineGateway {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Line
    }

    async fn send_notification(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        metadata: &Metadata,
    ) -> Result<(), GatewayError> {
        let Some(token) = self.config.access_token.as_deref() else {
            tracing::debug!(user_id, "LINE channel not configured, skipping");
            return Ok(());
        };

        let Some(to) = metadata
            .get(LINE_USER_ID_KEY)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
        else {
            tracing::debug!(user_id, "User has no linked LINE account, skipping");
            return Ok(());
        };

        let response = self
            .client
            .post(self.push_url())
            .bearer_auth(token)
            .json(&Self::build_payload(to, title, message))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(user_id, status = status.as_u16(), "LINE push failed");
            return Err(GatewayError::Status {
                gateway: "line",
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(user_id, "LINE push sent");
        Ok(())
    }
}
