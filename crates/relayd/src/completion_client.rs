//! Completion adapter.
//!
//! One chat-completion call per request with a fixed timeout; the caller
//! applies its own output validation and never retries.

use crate::config::CompletionConfig;
use crate::upstream;
use async_trait::async_trait;
use relay_shared::UpstreamError;
use serde::Deserialize;
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate text for the given prompts. The returned text is trimmed.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, UpstreamError>;
}

// ============================================================================
// OpenAI-compatible client (production)
// ============================================================================

pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiClient {
    /// Returns `None` when no API key is configured.
    pub fn from_config(config: &CompletionConfig) -> anyhow::Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone().filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };
        Ok(Some(Self {
            http: upstream::http_client(Duration::from_secs(config.timeout_secs))?,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        }))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, UpstreamError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt }
            ],
            "temperature": temperature,
            "max_tokens": max_tokens
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(upstream::map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(upstream::status_error(response).await);
        }

        let text = response.text().await.map_err(upstream::map_reqwest_error)?;
        debug!("[LLM] completion returned {} bytes", text.len());
        parse_chat_completion(&text)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Extract the first choice's text, trimmed.
///
/// A reply without content yields empty text, which the policy rejects as
/// too short. Only an unparseable body is `Malformed`.
pub fn parse_chat_completion(body: &str) -> Result<String, UpstreamError> {
    let completion: ChatCompletion = serde_json::from_str(body)?;
    Ok(completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .map(|t| t.trim().to_string())
        .unwrap_or_default())
}

// ============================================================================
// Fake completion client (testing)
// ============================================================================

/// Recorded call: (system prompt, user prompt)
pub type RecordedPrompt = (String, String);

pub struct FakeCompletionClient {
    reply: Result<String, UpstreamError>,
    calls: Mutex<Vec<RecordedPrompt>>,
}

impl FakeCompletionClient {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: UpstreamError) -> Self {
        Self {
            reply: Err(err),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedPrompt> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

#[async_trait]
impl CompletionClient for FakeCompletionClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, UpstreamError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((system_prompt.to_string(), user_prompt.to_string()));
        }
        self.reply.clone().map(|t| t.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_shared::UpstreamErrorKind;

    #[test]
    fn test_parse_chat_completion() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "  Plant in full sun.  " }, "finish_reason": "stop" }
            ]
        }"#;
        assert_eq!(parse_chat_completion(body).unwrap(), "Plant in full sun.");
    }

    #[test]
    fn test_missing_content_is_empty_text() {
        assert_eq!(parse_chat_completion(r#"{ "choices": [] }"#).unwrap(), "");
        assert_eq!(
            parse_chat_completion(r#"{ "choices": [ { "message": { "content": "   " } } ] }"#).unwrap(),
            ""
        );
        assert_eq!(
            parse_chat_completion(r#"{ "choices": [ { "message": { "content": null } } ] }"#).unwrap(),
            ""
        );
    }

    #[test]
    fn test_unparseable_body_malformed() {
        let err = parse_chat_completion("<html>Bad Gateway</html>").unwrap_err();
        assert_eq!(err.kind, UpstreamErrorKind::Malformed);
        let err = parse_chat_completion(r#"{ "choices": "none" }"#).unwrap_err();
        assert_eq!(err.kind, UpstreamErrorKind::Malformed);
    }

    #[test]
    fn test_blank_rewrite_keeps_original_snippet() {
        use relay_shared::policy::{self, Plan};
        use relay_shared::{AnswerSource, ConfidenceLevel, KnowledgeAnswer, KnowledgeBaseResult};

        let lookup = KnowledgeBaseResult::new("How much sun do tomatoes need?").with_answer(
            KnowledgeAnswer::new("Tomatoes need full sun", 0.9, ConfidenceLevel::High),
        );
        let Plan::Complete(step) = policy::plan(&lookup, true) else {
            panic!("HIGH answer with completion should plan a rewrite");
        };
        let outcome = parse_chat_completion(r#"{"choices":[{"message":{"content":""}}]}"#);
        let decision = policy::finish(step, outcome);

        assert_eq!(decision.source, AnswerSource::KbOriginal);
        assert_eq!(decision.text, "Tomatoes need full sun");
    }

    #[test]
    fn test_no_key_means_no_client() {
        let config = CompletionConfig::default();
        assert!(OpenAiClient::from_config(&config).unwrap().is_none());

        let config = CompletionConfig {
            api_key: Some("sk-test".to_string()),
            ..CompletionConfig::default()
        };
        let client = OpenAiClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.model(), "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn test_fake_records_prompts() {
        let fake = FakeCompletionClient::replying("  hello world  ");
        let text = fake.complete("sys", "user", 0.3, 100).await.unwrap();
        assert_eq!(text, "hello world");
        assert_eq!(fake.calls(), vec![("sys".to_string(), "user".to_string())]);
    }
}
