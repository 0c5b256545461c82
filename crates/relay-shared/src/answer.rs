//! Final answers returned to callers and stored in the response cache.

use crate::knowledge::{KnowledgeAnswer, KnowledgeBaseResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provenance tag: which policy branch produced the final text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// No knowledge answer, completion disabled.
    NoCompletionFallback,
    /// No knowledge answer, completion produced a valid answer.
    GeneralKnowledge,
    /// No knowledge answer, completion output rejected.
    DefaultFallback,
    /// No knowledge answer, completion call failed.
    GeneralErrorFallback,
    /// Raw snippet, completion disabled.
    KbOnly,
    /// Trusted snippet rewritten by completion.
    KbEnhanced,
    /// Trusted snippet, rewrite rejected.
    KbOriginal,
    /// Trusted snippet, rewrite call failed.
    KbErrorFallback,
    /// Partial snippet supplemented by completion.
    Hybrid,
    /// Partial snippet, supplement rejected.
    KbFallback,
    /// Partial snippet, supplement call failed.
    HybridErrorFallback,
    /// Snippet labelled NO_MATCH, returned verbatim.
    KbNoMatch,
}

impl AnswerSource {
    pub const ALL: [AnswerSource; 12] = [
        AnswerSource::NoCompletionFallback,
        AnswerSource::GeneralKnowledge,
        AnswerSource::DefaultFallback,
        AnswerSource::GeneralErrorFallback,
        AnswerSource::KbOnly,
        AnswerSource::KbEnhanced,
        AnswerSource::KbOriginal,
        AnswerSource::KbErrorFallback,
        AnswerSource::Hybrid,
        AnswerSource::KbFallback,
        AnswerSource::HybridErrorFallback,
        AnswerSource::KbNoMatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::NoCompletionFallback => "no_completion_fallback",
            AnswerSource::GeneralKnowledge => "general_knowledge",
            AnswerSource::DefaultFallback => "default_fallback",
            AnswerSource::GeneralErrorFallback => "general_error_fallback",
            AnswerSource::KbOnly => "kb_only",
            AnswerSource::KbEnhanced => "kb_enhanced",
            AnswerSource::KbOriginal => "kb_original",
            AnswerSource::KbErrorFallback => "kb_error_fallback",
            AnswerSource::Hybrid => "hybrid",
            AnswerSource::KbFallback => "kb_fallback",
            AnswerSource::HybridErrorFallback => "hybrid_error_fallback",
            AnswerSource::KbNoMatch => "kb_no_match",
        }
    }

    /// True when the final text came out of the completion service.
    pub fn is_generated(&self) -> bool {
        matches!(
            self,
            AnswerSource::GeneralKnowledge | AnswerSource::KbEnhanced | AnswerSource::Hybrid
        )
    }

    pub fn is_error_fallback(&self) -> bool {
        matches!(
            self,
            AnswerSource::GeneralErrorFallback
                | AnswerSource::KbErrorFallback
                | AnswerSource::HybridErrorFallback
        )
    }
}

impl fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit returned to the caller and cached by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub query_text: String,
    pub detected_intent: Option<String>,
    pub intent_confidence: f32,
    /// Never empty.
    pub fulfillment_text: String,
    pub answer_source: AnswerSource,
    pub knowledge_answers: Vec<KnowledgeAnswer>,
}

impl ResolutionResult {
    /// Assemble the final result from a lookup and the policy's chosen text.
    pub fn from_lookup(lookup: KnowledgeBaseResult, text: String, source: AnswerSource) -> Self {
        Self {
            query_text: lookup.query_text,
            detected_intent: lookup.intent_name,
            intent_confidence: lookup.intent_confidence,
            fulfillment_text: text,
            answer_source: source,
            knowledge_answers: lookup.answers,
        }
    }
}
