//! Answer resolution policy.
//!
//! Confidence is a trust gate. HIGH/MEDIUM snippets may only be restated by
//! the completion service, LOW snippets may be supplemented, NO_MATCH
//! snippets are returned verbatim. The policy is split into two pure steps:
//! [`plan`] decides whether a completion call is needed and with which
//! prompt, [`finish`] maps the outcome of that call to the final text and
//! provenance tag. The caller performs the call in between.

use crate::answer::{AnswerSource, ResolutionResult};
use crate::error::UpstreamError;
use crate::knowledge::{ConfidenceLevel, KnowledgeBaseResult};
use crate::prompts::{self, Prompt, PromptKind};

/// Final text plus the branch that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub text: String,
    pub source: AnswerSource,
}

impl Decision {
    fn new(text: impl Into<String>, source: AnswerSource) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

/// A pending completion call together with the text to use if it does not pan out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionStep {
    pub prompt: Prompt,
    fallback_text: String,
}

impl CompletionStep {
    pub fn fallback_text(&self) -> &str {
        &self.fallback_text
    }

    /// (accepted, rejected, failed) tags for this prompt.
    fn tags(&self) -> (AnswerSource, AnswerSource, AnswerSource) {
        match self.prompt.kind {
            PromptKind::GeneralKnowledge => (
                AnswerSource::GeneralKnowledge,
                AnswerSource::DefaultFallback,
                AnswerSource::GeneralErrorFallback,
            ),
            PromptKind::Rewrite => (
                AnswerSource::KbEnhanced,
                AnswerSource::KbOriginal,
                AnswerSource::KbErrorFallback,
            ),
            PromptKind::Hybrid => (
                AnswerSource::Hybrid,
                AnswerSource::KbFallback,
                AnswerSource::HybridErrorFallback,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Answer is known without calling the completion service.
    Direct(Decision),
    /// Exactly one completion call is required.
    Complete(CompletionStep),
}

pub fn plan(lookup: &KnowledgeBaseResult, completion_available: bool) -> Plan {
    let Some(top) = lookup.top_answer() else {
        if !completion_available {
            return Plan::Direct(Decision::new(
                prompts::NO_COMPLETION_FALLBACK,
                AnswerSource::NoCompletionFallback,
            ));
        }
        return Plan::Complete(CompletionStep {
            prompt: prompts::general_knowledge_prompt(&lookup.query_text),
            fallback_text: prompts::DEFAULT_FALLBACK.to_string(),
        });
    };

    match (top.confidence_level, completion_available) {
        (ConfidenceLevel::NoMatch, _) => {
            Plan::Direct(Decision::new(top.text.clone(), AnswerSource::KbNoMatch))
        }
        // LOW without completion shows the snippet as-is, same as HIGH/MEDIUM.
        (_, false) => Plan::Direct(Decision::new(top.text.clone(), AnswerSource::KbOnly)),
        (ConfidenceLevel::High | ConfidenceLevel::Medium, true) => {
            Plan::Complete(CompletionStep {
                prompt: prompts::rewrite_prompt(&lookup.query_text, &top.text),
                fallback_text: top.text.clone(),
            })
        }
        (ConfidenceLevel::Low, true) => Plan::Complete(CompletionStep {
            prompt: prompts::hybrid_prompt(&lookup.query_text, &top.text),
            fallback_text: top.text.clone(),
        }),
    }
}

pub fn finish(step: CompletionStep, outcome: Result<String, UpstreamError>) -> Decision {
    let (accepted, rejected, failed) = step.tags();
    match outcome {
        Ok(text) => {
            let text = text.trim();
            if step.prompt.kind.accepts(text) {
                Decision::new(text, accepted)
            } else {
                Decision::new(step.fallback_text, rejected)
            }
        }
        Err(_) => Decision::new(step.fallback_text, failed),
    }
}

/// Run the whole policy with a synchronous completion function.
pub fn resolve<F>(lookup: KnowledgeBaseResult, completion_available: bool, complete: F) -> ResolutionResult
where
    F: FnOnce(&Prompt) -> Result<String, UpstreamError>,
{
    let decision = match plan(&lookup, completion_available) {
        Plan::Direct(decision) => decision,
        Plan::Complete(step) => {
            let outcome = complete(&step.prompt);
            finish(step, outcome)
        }
    };
    ResolutionResult::from_lookup(lookup, decision.text, decision.source)
}
