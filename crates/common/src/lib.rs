//! Shared domain types, errors and configuration for the taskbell services.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod notification;
pub mod types;
