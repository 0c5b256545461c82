//! Shared types and decision logic for the knowledge-base relay.
//!
//! Everything in this crate is free of I/O: the daemon (`relayd`) owns the
//! network clients, the cache and the HTTP surface, and feeds upstream
//! results through the policy defined here.

pub mod answer;
pub mod error;
pub mod knowledge;
pub mod notification;
pub mod policy;
pub mod prompts;

pub use answer::{AnswerSource, ResolutionResult};
pub use error::{RelayError, UpstreamError, UpstreamErrorKind};
pub use knowledge::{ConfidenceLevel, KnowledgeAnswer, KnowledgeBaseResult};
pub use notification::{BatchReport, ChatNotification, DeliveryFailure, DeliveryResult, PushMessage};
pub use policy::{CompletionStep, Decision, Plan};
pub use prompts::{Prompt, PromptKind};
