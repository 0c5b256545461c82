//! Chat query flow: normalize, consult cache, look up, resolve, store.

use crate::cache::ResponseCache;
use crate::knowledge_client::KnowledgeBase;
use crate::resolver::Resolver;
use relay_shared::{RelayError, ResolutionResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Answer to one chat query
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub result: ResolutionResult,
    pub cached: bool,
    pub elapsed: Duration,
}

pub struct ChatService {
    knowledge: Option<Arc<dyn KnowledgeBase>>,
    resolver: Resolver,
    cache: Arc<ResponseCache>,
    default_language: String,
}

impl ChatService {
    pub fn new(
        knowledge: Option<Arc<dyn KnowledgeBase>>,
        resolver: Resolver,
        cache: Arc<ResponseCache>,
        default_language: &str,
    ) -> Self {
        Self {
            knowledge,
            resolver,
            cache,
            default_language: default_language.to_string(),
        }
    }

    pub fn knowledge_available(&self) -> bool {
        self.knowledge.is_some()
    }

    pub fn completion_available(&self) -> bool {
        self.resolver.completion_available()
    }

    /// Answer `query` for `session_id`.
    ///
    /// Knowledge-base failures are the one hard error; completion failures
    /// are absorbed by the resolver.
    pub async fn detect(
        &self,
        session_id: &str,
        query: &str,
        language_code: Option<&str>,
    ) -> Result<ChatReply, RelayError> {
        let start = Instant::now();

        if session_id.trim().is_empty() {
            return Err(RelayError::validation("sessionId", "is required"));
        }
        if query.trim().is_empty() {
            return Err(RelayError::validation("query", "is required"));
        }

        info!("[Q]   {}", query.trim());

        if let Some(result) = self.cache.get(query).await {
            info!("[C]   Cache hit");
            return Ok(ChatReply {
                result,
                cached: true,
                elapsed: start.elapsed(),
            });
        }

        let knowledge = self.knowledge.as_ref().ok_or_else(|| {
            RelayError::UpstreamUnavailable("knowledge base is not configured".to_string())
        })?;

        let language = language_code
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(self.default_language.as_str());

        let mut lookup = knowledge
            .lookup(session_id.trim(), query.trim(), language)
            .await
            .map_err(|e| {
                error!("[KB]  Lookup failed: {}", e);
                RelayError::from(e)
            })?;
        info!(
            "[KB]  {} answer(s), intent={:?}",
            lookup.answers.len(),
            lookup.intent_name
        );
        lookup.query_text = query.to_string();

        let result = self.resolver.resolve(lookup).await;
        self.cache.put(query, result.clone()).await;

        Ok(ChatReply {
            result,
            cached: false,
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion_client::{CompletionClient, FakeCompletionClient};
    use crate::knowledge_client::FakeKnowledgeBase;
    use crate::resolver::Sampling;
    use relay_shared::{AnswerSource, ConfidenceLevel, KnowledgeAnswer, KnowledgeBaseResult, UpstreamError};

    fn garden_kb() -> FakeKnowledgeBase {
        FakeKnowledgeBase::new().with_result(
            "How much sun do tomatoes need?",
            KnowledgeBaseResult::new("how much sun do tomatoes need")
                .with_intent("Knowledge.KnowledgeBase.garden", 0.9)
                .with_answer(KnowledgeAnswer::new(
                    "Tomatoes need full sun",
                    0.9,
                    ConfidenceLevel::High,
                )),
        )
    }

    fn service(
        kb: Arc<FakeKnowledgeBase>,
        completion: Option<Arc<FakeCompletionClient>>,
    ) -> ChatService {
        let completion = completion.map(|c| c as Arc<dyn CompletionClient>);
        ChatService::new(
            Some(kb as Arc<dyn KnowledgeBase>),
            Resolver::new(completion, Sampling::default()),
            Arc::new(ResponseCache::default()),
            "en",
        )
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let kb = Arc::new(garden_kb());
        let llm = Arc::new(FakeCompletionClient::replying("Plant in full sun and water weekly."));
        let svc = service(kb.clone(), Some(llm.clone()));

        let first = svc
            .detect("s1", "How much sun do tomatoes need?", None)
            .await
            .unwrap();
        assert!(!first.cached);
        assert_eq!(first.result.answer_source, AnswerSource::KbEnhanced);

        let second = svc
            .detect("s2", "  how much sun do tomatoes need?  ", Some("en"))
            .await
            .unwrap();
        assert!(second.cached);
        assert_eq!(second.result, first.result);
        assert_eq!(kb.call_count(), 1);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_query_text_echoes_user_input() {
        let kb = Arc::new(garden_kb());
        let svc = service(kb, None);
        let reply = svc
            .detect("s1", "How much sun do tomatoes need?", None)
            .await
            .unwrap();
        assert_eq!(reply.result.query_text, "How much sun do tomatoes need?");
        assert_eq!(reply.result.answer_source, AnswerSource::KbOnly);
    }

    #[tokio::test]
    async fn test_validation_skips_upstream() {
        let kb = Arc::new(garden_kb());
        let svc = service(kb.clone(), None);

        let err = svc.detect("s1", "   ", None).await.unwrap_err();
        assert!(matches!(err, RelayError::Validation { ref field, .. } if field == "query"));
        let err = svc.detect("", "hello", None).await.unwrap_err();
        assert!(matches!(err, RelayError::Validation { ref field, .. } if field == "sessionId"));
        assert_eq!(kb.call_count(), 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_hard_error() {
        let kb = Arc::new(FakeKnowledgeBase::failing(UpstreamError::timeout("10s")));
        let svc = service(kb, None);
        let err = svc.detect("s1", "hello", None).await.unwrap_err();
        assert!(matches!(err, RelayError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let kb = Arc::new(FakeKnowledgeBase::failing(UpstreamError::unavailable("down")));
        let svc = service(kb.clone(), None);
        assert!(svc.detect("s1", "hello", None).await.is_err());
        assert!(svc.detect("s1", "hello", None).await.is_err());
        assert_eq!(kb.call_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_knowledge_base() {
        let svc = ChatService::new(
            None,
            Resolver::without_completion(),
            Arc::new(ResponseCache::default()),
            "en",
        );
        assert!(!svc.knowledge_available());
        let err = svc.detect("s1", "hello", None).await.unwrap_err();
        assert!(matches!(err, RelayError::UpstreamUnavailable(_)));
    }
}
