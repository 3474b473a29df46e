//! HTTP surface of the notification service.
//!
//! Routes:
//! - `GET  /health`
//! - `POST /api/notifications`: create a notification
//! - `GET  /api/notifications/{id}`
//! - `POST /api/notifications/{id}/send`: deliver over every channel
//! - `POST /api/notifications/{id}/read`
//! - `GET  /api/users/{user_id}/notifications`: paginated, newest first
//! - `GET  /api/users/{user_id}/notifications/unread-count`
//! - `GET  /api/users/{user_id}/notifications/stream`: live events over SSE

pub mod routes;
pub mod state;
