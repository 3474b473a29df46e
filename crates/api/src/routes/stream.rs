//! Live notification stream over Server-Sent Events.
//!
//! Each connection subscribes to the user's broker topic. Envelopes are sent as
//! SSE events named after their `type`. The broker subscription lives exactly as
//! long as the response stream: it is removed when the client disconnects or the
//! server shuts down.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use taskbell_notifier::broker::{BrokerError, SubscriptionGuard};

use crate::state::AppState;

/// Events buffered per connection before the broker starts dropping them.
const STREAM_BUFFER: usize = 32;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/users/{user_id}/notifications/stream",
        get(stream_notifications),
    )
}

/// GET /api/users/:user_id/notifications/stream
async fn stream_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Value>(STREAM_BUFFER);

    let subscription = state.publisher.subscribe_user(&user_id, move |envelope| {
        let tx = tx.clone();
        async move {
            tx.send(envelope)
                .await
                .map_err(|_| BrokerError::SubscriberClosed)
        }
    });

    tracing::debug!(user_id = %user_id, "Live stream opened");

    let events = ReceiverStream::new(rx)
        .map(|envelope| Ok::<_, Infallible>(to_event(&envelope)))
        .take_until(state.shutdown.clone().cancelled_owned())
        .boxed();

    let stream = LiveStream {
        events,
        _subscription: subscription.unsubscribe_on_drop(),
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// SSE body that holds the broker subscription until the response is dropped.
struct LiveStream {
    events: BoxStream<'static, Result<Event, Infallible>>,
    _subscription: SubscriptionGuard,
}

impl Stream for LiveStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_next_unpin(cx)
    }
}

fn to_event(envelope: &Value) -> Event {
    let name = envelope["type"].as_str().unwrap_or("message");
    Event::default().event(name).data(envelope.to_string())
}
