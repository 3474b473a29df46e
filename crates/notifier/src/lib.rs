//! Notification delivery.
//!
//! One [`NotificationGateway`] per transport:
//! - In-app feed, pushed live through the pub/sub [`broker::Broker`]
//! - LINE Messaging API push messages
//! - Outbound webhook (JSON POST with a shared secret)
//!
//! Gateways never retry. Every failure is returned to the caller, which decides
//! what to record.

pub mod app;
pub mod broker;
pub mod line;
pub mod realtime;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use taskbell_common::config::AppConfig;
use taskbell_common::types::{ChannelType, Metadata, NotificationStatus};

use crate::app::AppGateway;
use crate::line::{LineConfig, LineGateway};
use crate::realtime::RealtimePublisher;
use crate::webhook::{WebhookConfig, WebhookGateway};

/// Errors raised while transmitting over a single channel.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{gateway} responded with {status}: {body}")]
    Status {
        gateway: &'static str,
        status: u16,
        body: String,
    },

    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

/// Adapter that transmits a notification over one transport.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// The channel type this gateway serves.
    fn channel_type(&self) -> ChannelType;

    /// Transmit a notification to `user_id`.
    ///
    /// A channel that does not apply (no linked account, no endpoint configured)
    /// returns `Ok(())` without sending anything.
    async fn send_notification(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        metadata: &Metadata,
    ) -> Result<(), GatewayError>;

    /// Acknowledge that the user read a notification. Only the in-app feed reacts.
    async fn acknowledge_read(
        &self,
        _user_id: &str,
        _notification_id: Uuid,
    ) -> Result<(), GatewayError> {
        Ok(())
    }

    /// Report a delivery outcome (`Sent` or `Failed`). Only the in-app feed reacts.
    async fn notify_status_change(
        &self,
        _user_id: &str,
        _notification_id: Uuid,
        _status: NotificationStatus,
    ) -> Result<(), GatewayError> {
        Ok(())
    }
}

/// Closed dispatch table: exactly one gateway per [`ChannelType`].
#[derive(Clone)]
pub struct Gateways {
    app: Arc<dyn NotificationGateway>,
    line: Arc<dyn NotificationGateway>,
    webhook: Arc<dyn NotificationGateway>,
}

impl Gateways {
    pub fn new(
        app: Arc<dyn NotificationGateway>,
        line: Arc<dyn NotificationGateway>,
        webhook: Arc<dyn NotificationGateway>,
    ) -> Self {
        Self { app, line, webhook }
    }

    /// Build the production gateways from configuration, sharing one HTTP client.
    pub fn from_config(
        config: &AppConfig,
        publisher: RealtimePublisher,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.gateway_timeout_secs))
            .build()?;

        if config.line_channel_access_token.is_none() {
            tracing::info!("LINE_CHANNEL_ACCESS_TOKEN not set, LINE channel disabled");
        }
        if config.webhook_url.is_none() {
            tracing::info!("WEBHOOK_URL not set, webhook channel disabled");
        }

        let line = LineGateway::new(
            LineConfig {
                access_token: config.line_channel_access_token.clone(),
                api_base_url: config.line_api_base_url.clone(),
            },
            client.clone(),
        );
        let webhook = WebhookGateway::new(
            WebhookConfig {
                url: config.webhook_url.clone(),
                secret: config.webhook_secret.clone(),
            },
            client,
        );

        Ok(Self::new(
            Arc::new(AppGateway::new(publisher)),
            Arc::new(line),
            Arc::new(webhook),
        ))
    }

    /// Gateway serving `channel_type`.
    pub fn for_channel(&self, channel_type: ChannelType) -> &dyn NotificationGateway {
        match channel_type {
            ChannelType::App => self.app.as_ref(),
            ChannelType::Line => self.line.as_ref(),
            ChannelType::Webhook => self.webhook.as_ref(),
        }
    }

    /// The in-app gateway, which also receives read acknowledgements.
    pub fn app(&self) -> &dyn NotificationGateway {
        self.app.as_ref()
    }
}

/// Cut `text` to at most `limit` characters, marking the cut with an ellipsis.
pub(crate) fn truncate_text(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdef", 4), "abc…");
        assert_eq!(truncate_text("日本語テキスト", 3).chars().count(), 3);
    }

    #[test]
    fn test_dispatch_table_matches_channel_type() {
        let publisher = RealtimePublisher::new(broker::Broker::default());
        let config = AppConfig {
            database_url: String::new(),
            redis_url: None,
            db_max_connections: 1,
            api_port: 0,
            line_channel_access_token: None,
            line_api_base_url: "http://localhost".to_string(),
            webhook_url: None,
            webhook_secret: String::new(),
            gateway_timeout_secs: 1,
            scheduler_enabled: false,
            scheduler_interval_secs: 3600,
            scheduler_lookahead_hours: 12,
            broker_handler_timeout_ms: 100,
            broker_queue_capacity: 4,
        };
        let gateways = Gateways::from_config(&config, publisher).unwrap();

        for channel_type in [ChannelType::App, ChannelType::Line, ChannelType::Webhook] {
            assert_eq!(gateways.for_channel(channel_type).channel_type(), channel_type);
        }
        assert_eq!(gateways.app().channel_type(), ChannelType::App);
    }
}
