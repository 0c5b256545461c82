//! HTTP server for relayd

use crate::cache::ResponseCache;
use crate::chat::ChatService;
use crate::completion_client::{CompletionClient, OpenAiClient};
use crate::config::RelayConfig;
use crate::knowledge_client::{DialogflowClient, KnowledgeBase};
use crate::notifier::Notifier;
use crate::push_client::{FcmClient, PushSender};
use crate::resolver::{Resolver, Sampling};
use crate::routes;
use crate::upstream::ServiceCredentials;
use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Maximum body size: 64 KiB
pub const MAX_BODY_SIZE: usize = 64 * 1024;

/// Ceiling on a whole request; upstream calls time out well before this
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across handlers
pub struct AppState {
    pub chat: ChatService,
    pub notifier: Notifier,
    pub cache: Arc<ResponseCache>,
    pub start_time: Instant,
    pub keep_alive_enabled: bool,
}

impl AppState {
    pub fn new(chat: ChatService, notifier: Notifier, cache: Arc<ResponseCache>) -> Self {
        Self {
            chat,
            notifier,
            cache,
            start_time: Instant::now(),
            keep_alive_enabled: false,
        }
    }

    /// Wire real upstream clients from config. Missing credentials disable features.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let cache = Arc::new(ResponseCache::new(
            config.cache.capacity,
            Duration::from_secs(config.cache.ttl_secs),
        ));

        let knowledge: Option<Arc<dyn KnowledgeBase>> = match ServiceCredentials::load_optional(
            config.knowledge.credentials_path.as_deref(),
            "knowledge base",
        ) {
            Some(creds) => Some(Arc::new(DialogflowClient::new(
                creds,
                Duration::from_secs(config.knowledge.timeout_secs),
            )?)),
            None => None,
        };

        let completion: Option<Arc<dyn CompletionClient>> =
            match OpenAiClient::from_config(&config.completion)? {
                Some(client) => {
                    info!("  Completion enabled (model {})", client.model());
                    Some(Arc::new(client))
                }
                None => {
                    warn!("  No completion API key, answers will not be enhanced");
                    None
                }
            };

        let push: Option<Arc<dyn PushSender>> = match ServiceCredentials::load_optional(
            config.push.credentials_path.as_deref(),
            "notifications",
        ) {
            Some(creds) => Some(Arc::new(FcmClient::new(
                creds,
                Duration::from_secs(config.push.timeout_secs),
            )?)),
            None => None,
        };

        let sampling = Sampling {
            temperature: config.completion.temperature,
            max_tokens: config.completion.max_tokens,
        };
        let chat = ChatService::new(
            knowledge,
            Resolver::new(completion, sampling),
            cache.clone(),
            &config.knowledge.default_language,
        );
        let notifier = Notifier::new(push, config.push.body_limit);

        let mut state = Self::new(chat, notifier, cache);
        state.keep_alive_enabled = config.keep_alive_enabled;
        Ok(state)
    }
}

/// Build the router with all routes and middleware
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::chat_routes())
        .merge(routes::notification_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until Ctrl-C
pub async fn run(state: AppState, port: u16) -> Result<()> {
    let app = router(Arc::new(state));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("  Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("  Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("  Shutting down gracefully");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_without_credentials() {
        let state = AppState::from_config(&RelayConfig::default()).unwrap();
        assert!(!state.chat.knowledge_available());
        assert!(!state.chat.completion_available());
        assert!(!state.notifier.is_enabled());
        assert!(!state.keep_alive_enabled);
    }

    #[test]
    fn test_from_config_with_api_key() {
        let mut config = RelayConfig::default();
        config.completion.api_key = Some("sk-test".to_string());
        config.keep_alive_enabled = true;
        let state = AppState::from_config(&config).unwrap();
        assert!(state.chat.completion_available());
        assert!(state.keep_alive_enabled);
    }
}
