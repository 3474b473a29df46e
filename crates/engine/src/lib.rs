//! Notification core: collaborator ports, their adapters, and the orchestrator.

pub mod memory;
pub mod orchestrator;
pub mod ports;
pub mod postgres;

pub use orchestrator::NotificationOrchestrator;
