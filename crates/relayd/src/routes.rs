//! API routes for relayd

use crate::error::{ApiError, ValidJson};
use crate::server::AppState;
use axum::{extract::State, routing::{get, post}, Json, Router};
use relay_shared::{AnswerSource, BatchReport, ChatNotification, KnowledgeAnswer};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

type AppStateArc = Arc<AppState>;

// ============================================================================
// Chat Routes
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectIntentRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub query: String,
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectIntentResponse {
    pub query_text: String,
    pub detected_intent: Option<String>,
    pub confidence: f32,
    pub fulfillment_text: String,
    pub answer_source: AnswerSource,
    pub knowledge_answers: Vec<KnowledgeAnswer>,
    pub cached: bool,
    /// Milliseconds spent serving this request
    pub response_time: u64,
}

pub fn chat_routes() -> Router<AppStateArc> {
    Router::new().route("/detectIntent", post(detect_intent))
}

async fn detect_intent(
    State(state): State<AppStateArc>,
    ValidJson(req): ValidJson<DetectIntentRequest>,
) -> Result<Json<DetectIntentResponse>, ApiError> {
    let reply = state
        .chat
        .detect(&req.session_id, &req.query, req.language_code.as_deref())
        .await?;

    let result = reply.result;
    Ok(Json(DetectIntentResponse {
        query_text: result.query_text,
        detected_intent: result.detected_intent,
        confidence: result.intent_confidence,
        fulfillment_text: result.fulfillment_text,
        answer_source: result.answer_source,
        knowledge_answers: result.knowledge_answers,
        cached: reply.cached,
        response_time: u64::try_from(reply.elapsed.as_millis()).unwrap_or(u64::MAX),
    }))
}

// ============================================================================
// Notification Routes
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchNotificationRequest {
    #[serde(default)]
    pub notifications: Vec<ChatNotification>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchNotificationResponse {
    /// True once the batch was processed; per-item outcomes are in `responses`
    pub success: bool,
    #[serde(flatten)]
    pub report: BatchReport,
}

pub fn notification_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/send-chat-notification", post(send_chat_notification))
        .route("/send-batch-notifications", post(send_batch_notifications))
}

async fn send_chat_notification(
    State(state): State<AppStateArc>,
    ValidJson(req): ValidJson<ChatNotification>,
) -> Result<Json<Value>, ApiError> {
    let message_id = state.notifier.send_one(&req).await?;
    Ok(Json(json!({ "success": true, "messageId": message_id })))
}

async fn send_batch_notifications(
    State(state): State<AppStateArc>,
    ValidJson(req): ValidJson<BatchNotificationRequest>,
) -> Result<Json<BatchNotificationResponse>, ApiError> {
    let report = state.notifier.send_batch(&req.notifications).await?;
    Ok(Json(BatchNotificationResponse {
        success: true,
        report,
    }))
}

// ============================================================================
// Health Routes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    /// Seconds since startup
    pub uptime: u64,
    pub cache_size: usize,
    pub timestamp: String,
}

pub fn health_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/ping", get(ping))
        .route("/", get(describe))
}

async fn ping(State(state): State<AppStateArc>) -> Json<PingResponse> {
    Json(PingResponse {
        status: "alive".to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        cache_size: state.cache.len().await,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Informational service descriptor
async fn describe(State(state): State<AppStateArc>) -> Json<Value> {
    Json(json!({
        "service": "kb-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "capabilities": {
            "knowledgeBase": state.chat.knowledge_available(),
            "completion": state.chat.completion_available(),
            "notifications": state.notifier.is_enabled(),
            "keepAlive": state.keep_alive_enabled,
        },
        "endpoints": [
            "POST /detectIntent",
            "POST /send-chat-notification",
            "POST /send-batch-notifications",
            "GET /ping",
        ],
    }))
}
