//! Relay daemon library - exposes modules for testing.

pub mod cache;
pub mod chat;
pub mod completion_client;
pub mod config;
pub mod error;
pub mod keepalive;
pub mod knowledge_client;
pub mod notifier;
pub mod push_client;
pub mod resolver;
pub mod routes;
pub mod server;
pub mod upstream;
