//! Knowledge-base adapter.
//!
//! `DialogflowClient` issues one detect-intent call per lookup against a
//! Dialogflow-style REST endpoint with knowledge connectors enabled.
//! `FakeKnowledgeBase` serves canned results for tests.

use crate::upstream::{self, ServiceCredentials};
use async_trait::async_trait;
use relay_shared::{ConfidenceLevel, KnowledgeAnswer, KnowledgeBaseResult, UpstreamError};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://dialogflow.googleapis.com";

/// Upstream session ids are limited to 36 characters
const MAX_SESSION_ID: usize = 36;

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Look up `query` for `session_id`. Failures are returned once, never retried.
    async fn lookup(
        &self,
        session_id: &str,
        query: &str,
        language_code: &str,
    ) -> Result<KnowledgeBaseResult, UpstreamError>;
}

// ============================================================================
// Dialogflow client (production)
// ============================================================================

pub struct DialogflowClient {
    http: reqwest::Client,
    creds: ServiceCredentials,
    endpoint: String,
}

impl DialogflowClient {
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

    fn session_url(&self, session_id: &str) -> String {
        format!(
            "{}/v2beta1/projects/{}/agent/sessions/{}:detectIntent",
            self.endpoint,
            self.creds.project_id,
            sanitize_session_id(session_id)
        )
    }
}

#[async_trait]
impl KnowledgeBase for DialogflowClient {
    async fn lookup(
        &self,
        session_id: &str,
        query: &str,
        language_code: &str,
    ) -> Result<KnowledgeBaseResult, UpstreamError> {
        let body = json!({
            "queryInput": {
                "text": { "text": query, "languageCode": language_code }
            },
            "queryParams": {
                "knowledgeBaseNames": self.creds.knowledge_base_names
            }
        });

        let response = self
            .http
            .post(self.session_url(session_id))
            .bearer_auth(&self.creds.access_token)
            .json(&body)
            .send()
            .await
            .map_err(upstream::map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(upstream::status_error(response).await);
        }

        let text = response.text().await.map_err(upstream::map_reqwest_error)?;
        debug!("[KB]  detectIntent returned {} bytes", text.len());
        parse_detect_intent(&text)
    }
}

/// Replace characters the session path segment cannot carry and cap the length.
pub fn sanitize_session_id(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(MAX_SESSION_ID)
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentResponse {
    query_result: Option<QueryResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResult {
    #[serde(default)]
    query_text: String,
    intent: Option<Intent>,
    #[serde(default)]
    intent_detection_confidence: f32,
    #[serde(default)]
    fulfillment_text: String,
    knowledge_answers: Option<WireKnowledgeAnswers>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Intent {
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct WireKnowledgeAnswers {
    #[serde(default)]
    answers: Vec<WireAnswer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAnswer {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    match_confidence: f32,
    match_confidence_level: Option<String>,
}

/// Normalize a detect-intent response body.
pub fn parse_detect_intent(body: &str) -> Result<KnowledgeBaseResult, UpstreamError> {
    let response: DetectIntentResponse = serde_json::from_str(body)?;
    let result = response
        .query_result
        .ok_or_else(|| UpstreamError::malformed("response has no queryResult"))?;

    let answers = result
        .knowledge_answers
        .map(|ka| ka.answers)
        .unwrap_or_default()
        .into_iter()
        .map(|a| {
            KnowledgeAnswer::new(
                a.answer,
                a.match_confidence,
                ConfidenceLevel::from_label(a.match_confidence_level.as_deref()),
            )
        })
        .collect();

    Ok(KnowledgeBaseResult {
        query_text: result.query_text,
        intent_name: result
            .intent
            .map(|i| i.display_name)
            .filter(|name| !name.is_empty()),
        intent_confidence: result.intent_detection_confidence,
        fulfillment_text: result.fulfillment_text,
        answers,
    })
}

// ============================================================================
// Fake knowledge base (testing)
// ============================================================================

/// Canned knowledge base; unknown queries return a result with no answers.
#[derive(Default)]
pub struct FakeKnowledgeBase {
    responses: HashMap<String, KnowledgeBaseResult>,
    failure: Option<UpstreamError>,
    calls: AtomicUsize,
}

impl FakeKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, query: &str, result: KnowledgeBaseResult) -> Self {
        self.responses.insert(query.to_string(), result);
        self
    }

    /// Every lookup fails with `err`.
    pub fn failing(err: UpstreamError) -> Self {
        Self {
            failure: Some(err),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeBase for FakeKnowledgeBase {
    async fn lookup(
        &self,
        _session_id: &str,
        query: &str,
        _language_code: &str,
    ) -> Result<KnowledgeBaseResult, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(self
            .responses
            .get(query)
            .cloned()
            .unwrap_or_else(|| KnowledgeBaseResult::new(query)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_shared::UpstreamErrorKind;

    #[test]
    fn test_parse_full_response() {
        let body = r#"{
            "responseId": "abc",
            "queryResult": {
                "queryText": "how much sun do tomatoes need",
                "intent": { "name": "projects/p/agent/intents/1", "displayName": "Knowledge.KnowledgeBase.MTIz" },
                "intentDetectionConfidence": 0.92,
                "fulfillmentText": "Tomatoes need full sun",
                "knowledgeAnswers": {
                    "answers": [
                        { "answer": "Tomatoes need full sun", "matchConfidence": 0.87, "matchConfidenceLevel": "HIGH" },
                        { "answer": "Peppers like warmth", "matchConfidence": 0.31, "matchConfidenceLevel": "LOW" }
                    ]
                }
            }
        }"#;

        let result = parse_detect_intent(body).unwrap();
        assert_eq!(result.query_text, "how much sun do tomatoes need");
        assert_eq!(result.intent_name.as_deref(), Some("Knowledge.KnowledgeBase.MTIz"));
        assert!((result.intent_confidence - 0.92).abs() < f32::EPSILON);
        assert_eq!(result.answers.len(), 2);
        assert_eq!(result.answers[0].confidence_level, ConfidenceLevel::High);
        assert_eq!(result.answers[1].text, "Peppers like warmth");
        assert_eq!(result.answers[1].confidence_level, ConfidenceLevel::Low);
    }

    #[test]
    fn test_parse_without_knowledge_answers() {
        let body = r#"{ "queryResult": { "queryText": "hi", "fulfillmentText": "Hello!" } }"#;
        let result = parse_detect_intent(body).unwrap();
        assert!(result.answers.is_empty());
        assert!(result.intent_name.is_none());
        assert_eq!(result.fulfillment_text, "Hello!");
    }

    #[test]
    fn test_missing_level_is_no_match() {
        let body = r#"{ "queryResult": { "knowledgeAnswers": { "answers": [ { "answer": "x" } ] } } }"#;
        let result = parse_detect_intent(body).unwrap();
        assert_eq!(result.answers[0].confidence_level, ConfidenceLevel::NoMatch);
    }

    #[test]
    fn test_missing_query_result_is_malformed() {
        let err = parse_detect_intent(r#"{ "responseId": "abc" }"#).unwrap_err();
        assert_eq!(err.kind, UpstreamErrorKind::Malformed);

        let err = parse_detect_intent("<html>").unwrap_err();
        assert_eq!(err.kind, UpstreamErrorKind::Malformed);
    }

    #[test]
    fn test_sanitize_session_id() {
        assert_eq!(sanitize_session_id("user-42_abc"), "user-42_abc");
        assert_eq!(sanitize_session_id("a/b c"), "a_b_c");
        assert_eq!(sanitize_session_id(&"x".repeat(80)).len(), MAX_SESSION_ID);
    }

    #[tokio::test]
    async fn test_fake_counts_calls() {
        let kb = FakeKnowledgeBase::new().with_result(
            "tomatoes",
            KnowledgeBaseResult::new("tomatoes").with_answer(KnowledgeAnswer::new(
                "Full sun",
                0.9,
                ConfidenceLevel::High,
            )),
        );

        let hit = kb.lookup("s", "tomatoes", "en").await.unwrap();
        assert_eq!(hit.answers.len(), 1);
        let miss = kb.lookup("s", "okra", "en").await.unwrap();
        assert!(miss.answers.is_empty());
        assert_eq!(kb.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fake_failure() {
        let kb = FakeKnowledgeBase::failing(UpstreamError::unavailable("down"));
        assert!(kb.lookup("s", "q", "en").await.is_err());
        assert_eq!(kb.call_count(), 1);
    }
}
