//! Push-delivery adapter (FCM HTTP v1).

use crate::upstream::{self, ServiceCredentials};
use async_trait::async_trait;
use relay_shared::{DeliveryFailure, PushMessage};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://fcm.googleapis.com";

#[async_trait]
pub trait PushSender: Send + Sync {
    /// Deliver one message; returns the service-assigned message id.
    async fn send(&self, message: &PushMessage) -> Result<String, DeliveryFailure>;
}

// ============================================================================
// FCM client (production)
// ============================================================================

pub struct FcmClient {
    http: reqwest::Client,
    creds: ServiceCredentials,
    endpoint: String,
}

impl FcmClient {
    pub fn new(creds: ServiceCredentials, timeout: Duration) -> anyhow::Result<Self> {
        let endpoint = creds
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            http: upstream::http_client(timeout)?,
            creds,
            endpoint,
        })
    }
}

#[async_trait]
impl PushSender for FcmClient {
    async fn send(&self, message: &PushMessage) -> Result<String, DeliveryFailure> {
        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.endpoint, self.creds.project_id
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.creds.access_token)
            .json(&fcm_payload(message))
            .send()
            .await
            .map_err(|e| DeliveryFailure::DeliveryError(upstream::map_reqwest_error(e).to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DeliveryFailure::DeliveryError(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(classify_fcm_error(status, &body));
        }

        let sent: SendResponse = serde_json::from_str(&body)
            .map_err(|e| DeliveryFailure::DeliveryError(format!("unexpected response: {}", e)))?;
        Ok(sent.name)
    }
}

pub fn fcm_payload(message: &PushMessage) -> serde_json::Value {
    json!({
        "message": {
            "token": message.token,
            "notification": {
                "title": message.title,
                "body": message.body
            },
            "data": message.data,
            "android": { "priority": "high" },
            "apns": { "payload": { "aps": { "sound": "default" } } }
        }
    })
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    #[serde(default)]
    error_code: Option<String>,
}

/// Split rejected tokens from every other delivery error.
pub fn classify_fcm_error(status: u16, body: &str) -> DeliveryFailure {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let err = envelope.error;
    let codes: Vec<&str> = err
        .details
        .iter()
        .filter_map(|d| d.error_code.as_deref())
        .chain(std::iter::once(err.status.as_str()))
        .collect();

    let message = if err.message.is_empty() {
        format!("status {}: {}", status, upstream::excerpt(body))
    } else {
        err.message.clone()
    };

    let unregistered = status == 404 || codes.contains(&"UNREGISTERED");
    let bad_token = codes.contains(&"INVALID_ARGUMENT")
        && err.message.to_lowercase().contains("token");

    if unregistered || bad_token {
        DeliveryFailure::InvalidToken(message)
    } else {
        DeliveryFailure::DeliveryError(message)
    }
}

// ============================================================================
// Fake push sender (testing)
// ============================================================================

#[derive(Default)]
pub struct FakePushSender {
    invalid_tokens: HashSet<String>,
    broken_tokens: HashSet<String>,
    sent: Mutex<Vec<PushMessage>>,
    counter: AtomicUsize,
}

impl FakePushSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries to `token` fail as unregistered.
    pub fn with_invalid_token(mut self, token: &str) -> Self {
        self.invalid_tokens.insert(token.to_string());
        self
    }

    /// Deliveries to `token` fail with a generic error.
    pub fn with_broken_token(mut self, token: &str) -> Self {
        self.broken_tokens.insert(token.to_string());
        self
    }

    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PushSender for FakePushSender {
    async fn send(&self, message: &PushMessage) -> Result<String, DeliveryFailure> {
        if self.invalid_tokens.contains(&message.token) {
            return Err(DeliveryFailure::InvalidToken(
                "Requested entity was not found.".to_string(),
            ));
        }
        if self.broken_tokens.contains(&message.token) {
            return Err(DeliveryFailure::DeliveryError("quota exceeded".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("projects/fake/messages/{}", n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_unregistered_is_invalid_token() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND",
            "details":[{"@type":"type.googleapis.com/google.firebase.fcm.v1.FcmError","errorCode":"UNREGISTERED"}]}}"#;
        assert!(matches!(classify_fcm_error(404, body), DeliveryFailure::InvalidToken(_)));
    }

    #[test]
    fn test_malformed_token_is_invalid_token() {
        let body = r#"{"error":{"code":400,"message":"The registration token is not a valid FCM registration token","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(classify_fcm_error(400, body), DeliveryFailure::InvalidToken(_)));
    }

    #[test]
    fn test_other_errors_are_delivery_errors() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let failure = classify_fcm_error(429, body);
        assert_eq!(failure, DeliveryFailure::DeliveryError("Quota exceeded".to_string()));

        let body = r#"{"error":{"code":400,"message":"Invalid JSON payload","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(classify_fcm_error(400, body), DeliveryFailure::DeliveryError(_)));

        assert!(matches!(classify_fcm_error(502, "Bad Gateway"), DeliveryFailure::DeliveryError(_)));
    }

    #[test]
    fn test_payload_shape() {
        let mut data = BTreeMap::new();
        data.insert("chatRoomId".to_string(), "room-1".to_string());
        let message = PushMessage {
            token: "tok".to_string(),
            title: "Maria".to_string(),
            body: "Hi".to_string(),
            data,
        };
        let payload = fcm_payload(&message);
        assert_eq!(payload["message"]["token"], "tok");
        assert_eq!(payload["message"]["notification"]["title"], "Maria");
        assert_eq!(payload["message"]["data"]["chatRoomId"], "room-1");
        assert_eq!(payload["message"]["android"]["priority"], "high");
    }
}
