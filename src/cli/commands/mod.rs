//! CLI command implementations

pub mod auth;
pub mod completions;
pub mod config;
pub mod dashboard;
pub mod items;
pub mod notifications;
pub mod users;
