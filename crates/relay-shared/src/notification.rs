//! Chat push-notification payloads and delivery outcomes.

use crate::error::RelayError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Longest notification body sent, in characters, ellipsis included.
pub const MAX_BODY_CHARS: usize = 100;

const ELLIPSIS: &str = "...";

/// Truncate `body` to at most `limit` characters, ending in an ellipsis when cut.
pub fn truncate_body(body: &str, limit: usize) -> String {
    if body.chars().count() <= limit {
        return body.to_string();
    }
    let keep = limit.saturating_sub(ELLIPSIS.len());
    let mut out: String = body.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// One chat notification as posted by the app.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatNotification {
    #[serde(default)]
    pub recipient_token: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub message_text: String,
    pub chat_room_id: Option<String>,
    pub post_title: Option<String>,
}

impl ChatNotification {
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.recipient_token.trim().is_empty() {
            return Err(RelayError::validation("recipientToken", "is required"));
        }
        if self.message_text.trim().is_empty() {
            return Err(RelayError::validation("messageText", "is required"));
        }
        Ok(())
    }

    /// Build the push message, truncating the body to `body_limit` characters.
    pub fn to_push_message(&self, body_limit: usize) -> PushMessage {
        let sender = self.sender_name.trim();
        let title = if sender.is_empty() {
            "New message".to_string()
        } else {
            sender.to_string()
        };

        let mut data = BTreeMap::new();
        data.insert("type".to_string(), "chat_message".to_string());
        data.insert("senderName".to_string(), self.sender_name.clone());
        if let Some(room) = &self.chat_room_id {
            data.insert("chatRoomId".to_string(), room.clone());
        }
        if let Some(post) = &self.post_title {
            data.insert("postTitle".to_string(), post.clone());
        }

        PushMessage {
            token: self.recipient_token.trim().to_string(),
            title,
            body: truncate_body(&self.message_text, body_limit),
            data,
        }
    }
}

/// Fully built push payload handed to the delivery service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
    /// Push data maps only carry strings.
    pub data: BTreeMap<String, String>,
}

/// Why a single delivery failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// Target token is unknown or expired; callers may purge it.
    #[error("invalid or expired token: {0}")]
    InvalidToken(String),

    #[error("delivery failed: {0}")]
    DeliveryError(String),
}

impl DeliveryFailure {
    pub fn code(&self) -> &'static str {
        match self {
            DeliveryFailure::InvalidToken(_) => "invalid_token",
            DeliveryFailure::DeliveryError(_) => "delivery_error",
        }
    }
}

impl From<DeliveryFailure> for RelayError {
    fn from(failure: DeliveryFailure) -> Self {
        match failure {
            DeliveryFailure::InvalidToken(msg) => RelayError::InvalidToken(msg),
            DeliveryFailure::DeliveryError(msg) => RelayError::Delivery(msg),
        }
    }
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    pub token: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl DeliveryResult {
    pub fn delivered(token: &str, message_id: String) -> Self {
        Self {
            token: token.to_string(),
            success: true,
            message_id: Some(message_id),
            error: None,
            code: None,
        }
    }

    pub fn failed(token: &str, failure: &DeliveryFailure) -> Self {
        Self {
            token: token.to_string(),
            success: false,
            message_id: None,
            error: Some(failure.to_string()),
            code: Some(failure.code().to_string()),
        }
    }
}

/// Aggregate of a batch send; items are independent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub responses: Vec<DeliveryResult>,
}

impl BatchReport {
    pub fn from_results(responses: Vec<DeliveryResult>) -> Self {
        let success_count = responses.iter().filter(|r| r.success).count();
        Self {
            success_count,
            failure_count: responses.len() - success_count,
            responses,
        }
    }
}
