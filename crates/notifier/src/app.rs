//! In-app feed gateway.
//!
//! The notification itself is already stored by the time this gateway runs, so
//! delivery means pushing it to the user's live clients. Having no connected
//! client is not a failure.

use async_trait::async_trait;
use uuid::Uuid;

use taskbell_common::types::{
    ChannelType, Metadata, NOTIFICATION_ID_KEY, NOTIFICATION_TYPE_KEY, NotificationStatus,
};

use crate::realtime::{LiveNotification, RealtimePublisher};
use crate::{GatewayError, NotificationGateway};

pub struct AppGateway {
    publisher: RealtimePublisher,
}

impl AppGateway {
    pub fn new(publisher: RealtimePublisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl NotificationGateway for AppGateway {
    fn channel_type(&self) -> ChannelType {
        ChannelType::App
    }

    async fn send_notification(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        metadata: &Metadata,
    ) -> Result<(), GatewayError> {
        let live = LiveNotification {
            notification_id: metadata.get(NOTIFICATION_ID_KEY).cloned(),
            notification_type: metadata.get(NOTIFICATION_TYPE_KEY).cloned(),
            title: title.to_string(),
            message: message.to_string(),
            metadata: metadata.clone(),
        };
        let queued = self.publisher.publish_notification(user_id, &live);

        tracing::debug!(user_id, live_clients = queued, "In-app notification delivered");
        Ok(())
    }

    async fn acknowledge_read(
        &self,
        user_id: &str,
        notification_id: Uuid,
    ) -> Result<(), GatewayError> {
        self.publisher
            .publish_notification_read(user_id, notification_id);
        Ok(())
    }

    async fn notify_status_change(
        &self,
        user_id: &str,
        notification_id: Uuid,
        status: NotificationStatus,
    ) -> Result<(), GatewayError> {
        self.publisher
            .publish_status_change(user_id, notification_id, status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::Broker;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_send_pushes_to_owner_topic() {
        let publisher = RealtimePublisher::new(Broker::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        publisher.subscribe_user("u1", move |payload| {
            let _ = tx.send(payload);
            async { Ok(()) }
        });

        let gateway = AppGateway::new(publisher);
        let mut metadata = Metadata::new();
        metadata.insert(NOTIFICATION_ID_KEY.to_string(), "abc".to_string());
        metadata.insert(NOTIFICATION_TYPE_KEY.to_string(), "system_notice".to_string());

        gateway
            .send_notification("u1", "Maintenance", "Tonight at 2am", &metadata)
            .await
            .unwrap();

        let envelope = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(envelope["data"]["notification_id"], "abc");
        assert_eq!(envelope["data"]["type"], "system_notice");
        assert_eq!(envelope["data"]["message"], "Tonight at 2am");
    }

    #[tokio::test]
    async fn test_send_without_live_clients_succeeds() {
        let gateway = AppGateway::new(RealtimePublisher::new(Broker::default()));
        let result = gateway
            .send_notification("offline", "T", "M", &Metadata::new())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_acknowledge_read_publishes_read_event() {
        let publisher = RealtimePublisher::new(Broker::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        publisher.subscribe_user("u1", move |payload| {
            let _ = tx.send(payload);
            async { Ok(()) }
        });

        let gateway = AppGateway::new(publisher);
        let id = Uuid::new_v4();
        gateway.acknowledge_read("u1", id).await.unwrap();

        let envelope = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(envelope["type"], crate::realtime::EVENT_NOTIFICATION_READ);
        assert_eq!(envelope["data"]["notification_id"], id.to_string());
    }

    #[tokio::test]
    async fn test_notify_status_change_publishes_status_event() {
        let publisher = RealtimePublisher::new(Broker::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        publisher.subscribe_user("u1", move |payload| {
            let _ = tx.send(payload);
            async { Ok(()) }
        });

        let gateway = AppGateway::new(publisher);
        let id = Uuid::new_v4();
        gateway
            .notify_status_change("u1", id, NotificationStatus::Sent)
            .await
            .unwrap();

        let envelope = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(envelope["type"], crate::realtime::EVENT_NOTIFICATION_STATUS);
        assert_eq!(envelope["data"]["notification_id"], id.to_string());
        assert_eq!(envelope["data"]["status"], "sent");
    }
}
