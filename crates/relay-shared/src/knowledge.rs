//! Knowledge-base lookup results.
//!
//! Built fresh per request from the upstream detect-intent response and
//! never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse trust label attached by the knowledge source to each candidate answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "Option<String>")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    #[default]
    NoMatch,
}

impl ConfidenceLevel {
    /// Parse an upstream label. Absent or unrecognized labels are `NoMatch`.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_ascii_uppercase()).as_deref() {
            Some("HIGH") => ConfidenceLevel::High,
            Some("MEDIUM") => ConfidenceLevel::Medium,
            Some("LOW") => ConfidenceLevel::Low,
            _ => ConfidenceLevel::NoMatch,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "HIGH",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::Low => "LOW",
            ConfidenceLevel::NoMatch => "NO_MATCH",
        }
    }

    /// HIGH and MEDIUM answers may be restated but never extended.
    pub fn is_trusted(&self) -> bool {
        matches!(self, ConfidenceLevel::High | ConfidenceLevel::Medium)
    }
}

impl From<Option<String>> for ConfidenceLevel {
    fn from(label: Option<String>) -> Self {
        ConfidenceLevel::from_label(label.as_deref())
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate answer from the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeAnswer {
    pub text: String,
    /// Source-provided score; advisory only, never used for branching.
    #[serde(default)]
    pub match_confidence: f32,
    #[serde(default)]
    pub confidence_level: ConfidenceLevel,
}

impl KnowledgeAnswer {
    pub fn new(text: impl Into<String>, match_confidence: f32, confidence_level: ConfidenceLevel) -> Self {
        Self {
            text: text.into(),
            match_confidence,
            confidence_level,
        }
    }

    fn is_usable(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Normalized knowledge-base lookup result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseResult {
    pub query_text: String,
    pub intent_name: Option<String>,
    pub intent_confidence: f32,
    pub fulfillment_text: String,
    /// Upstream order is preserved.
    pub answers: Vec<KnowledgeAnswer>,
}

impl KnowledgeBaseResult {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            ..Default::default()
        }
    }

    pub fn with_answer(mut self, answer: KnowledgeAnswer) -> Self {
        self.answers.push(answer);
        self
    }

    pub fn with_intent(mut self, name: impl Into<String>, confidence: f32) -> Self {
        self.intent_name = Some(name.into());
        self.intent_confidence = confidence;
        self
    }

    /// First answer carrying non-blank text, in upstream order.
    pub fn top_answer(&self) -> Option<&KnowledgeAnswer> {
        self.answers.iter().find(|a| a.is_usable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parsing() {
        assert_eq!(ConfidenceLevel::from_label(Some("HIGH")), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_label(Some("medium")), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_label(Some(" Low ")), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_label(Some("NO_MATCH")), ConfidenceLevel::NoMatch);
        assert_eq!(ConfidenceLevel::from_label(Some("VERY_HIGH")), ConfidenceLevel::NoMatch);
        assert_eq!(ConfidenceLevel::from_label(None), ConfidenceLevel::NoMatch);
    }

    #[test]
    fn test_unknown_label_deserializes_as_no_match() {
        let answer: KnowledgeAnswer =
            serde_json::from_str(r#"{"text":"x","confidenceLevel":"CONFIDENCE_LEVEL_UNSPECIFIED"}"#)
                .unwrap();
        assert_eq!(answer.confidence_level, ConfidenceLevel::NoMatch);
        assert_eq!(answer.match_confidence, 0.0);
    }

    #[test]
    fn test_null_or_missing_label_is_no_match() {
        let answer: KnowledgeAnswer =
            serde_json::from_str(r#"{"text":"x","confidenceLevel":null}"#).unwrap();
        assert_eq!(answer.confidence_level, ConfidenceLevel::NoMatch);

        let answer: KnowledgeAnswer = serde_json::from_str(r#"{"text":"x"}"#).unwrap();
        assert_eq!(answer.confidence_level, ConfidenceLevel::NoMatch);

        let answer: KnowledgeAnswer =
            serde_json::from_str(r#"{"text":"x","confidenceLevel":"LOW"}"#).unwrap();
        assert_eq!(answer.confidence_level, ConfidenceLevel::Low);
    }

    #[test]
    fn test_serializes_screaming_case() {
        let json = serde_json::to_string(&ConfidenceLevel::NoMatch).unwrap();
        assert_eq!(json, "\"NO_MATCH\"");
    }

    #[test]
    fn test_top_answer_skips_blank_text() {
        let result = KnowledgeBaseResult::new("q")
            .with_answer(KnowledgeAnswer::new("   ", 0.9, ConfidenceLevel::High))
            .with_answer(KnowledgeAnswer::new("Water weekly", 0.5, ConfidenceLevel::Low));
        let top = result.top_answer().unwrap();
        assert_eq!(top.text, "Water weekly");
        assert_eq!(top.confidence_level, ConfidenceLevel::Low);
    }

    #[test]
    fn test_top_answer_none_when_empty() {
        assert!(KnowledgeBaseResult::new("q").top_answer().is_none());
    }
}
