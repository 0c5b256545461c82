//! Prompt variants sent to the completion service and the validators
//! applied to what comes back.

/// Completion output shorter than this (in characters, after trimming) is rejected.
pub const MIN_COMPLETION_CHARS: usize = 10;

/// Lower-cased phrases that mark a rewrite as a refusal.
pub const REFUSAL_PHRASES: &[&str] = &["i don't have", "i cannot find"];

/// Returned when no knowledge answer exists and completion is disabled.
pub const NO_COMPLETION_FALLBACK: &str =
    "I'm sorry, I couldn't find an answer to that. Could you try rephrasing your question?";

/// Returned when no knowledge answer exists and completion did not help.
pub const DEFAULT_FALLBACK: &str =
    "I'm not sure about that one yet. Please try asking in a different way.";

const SYSTEM_PROMPT: &str = "You are a friendly, concise assistant for a community help app. \
Answer in plain language, in at most a few sentences.";

/// Which question the completion service is being asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// No knowledge answer: answer from general knowledge.
    GeneralKnowledge,
    /// Trusted snippet: restate it, add nothing.
    Rewrite,
    /// Partial snippet: supplement it with general knowledge.
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub system: String,
    pub user: String,
}

pub fn general_knowledge_prompt(query: &str) -> Prompt {
    Prompt {
        kind: PromptKind::GeneralKnowledge,
        system: SYSTEM_PROMPT.to_string(),
        user: format!(
            "The knowledge base has no match for this question. \
Answer it from general knowledge. If you are unsure, say so briefly.\n\nQuestion: {}",
            query
        ),
    }
}

pub fn rewrite_prompt(query: &str, source: &str) -> Prompt {
    Prompt {
        kind: PromptKind::Rewrite,
        system: SYSTEM_PROMPT.to_string(),
        user: format!(
            "Rewrite the source text below as a natural answer to the question. \
Use ONLY the information in the source. Do not add facts.\n\nQuestion: {}\n\nSource: {}",
            query, source
        ),
    }
}

pub fn hybrid_prompt(query: &str, partial: &str) -> Prompt {
    Prompt {
        kind: PromptKind::Hybrid,
        system: SYSTEM_PROMPT.to_string(),
        user: format!(
            "The knowledge base only partially answers this question. \
Start from the partial information and supplement it with general knowledge.\n\n\
Question: {}\n\nPartial information: {}",
            query, partial
        ),
    }
}

pub fn is_too_short(text: &str) -> bool {
    text.trim().chars().count() < MIN_COMPLETION_CHARS
}

pub fn contains_refusal(text: &str) -> bool {
    let lowered = text.to_lowercase().replace('\u{2019}', "'");
    REFUSAL_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

impl PromptKind {
    /// Whether `text` may become the final answer for this prompt.
    pub fn accepts(&self, text: &str) -> bool {
        if is_too_short(text) {
            return false;
        }
        match self {
            PromptKind::Rewrite => !contains_refusal(text),
            PromptKind::GeneralKnowledge | PromptKind::Hybrid => true,
        }
    }
}
