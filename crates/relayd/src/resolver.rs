//! Async driver for the answer resolution policy.
//!
//! Performs at most one completion call per request; a failed call is
//! recovered here and never surfaces to the caller.

use crate::completion_client::CompletionClient;
use relay_shared::policy::{self, Plan};
use relay_shared::{KnowledgeBaseResult, ResolutionResult, UpstreamError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Sampling parameters passed to every completion call
#[derive(Debug, Clone, Copy)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 300,
        }
    }
}

pub struct Resolver {
    completion: Option<Arc<dyn CompletionClient>>,
    sampling: Sampling,
}

impl Resolver {
    pub fn new(completion: Option<Arc<dyn CompletionClient>>, sampling: Sampling) -> Self {
        Self {
            completion,
            sampling,
        }
    }

    /// Resolver that never calls the completion service
    pub fn without_completion() -> Self {
        Self::new(None, Sampling::default())
    }

    pub fn completion_available(&self) -> bool {
        self.completion.is_some()
    }

    pub async fn resolve(&self, lookup: KnowledgeBaseResult) -> ResolutionResult {
        let decision = match policy::plan(&lookup, self.completion_available()) {
            Plan::Direct(decision) => decision,
            Plan::Complete(step) => {
                let start = Instant::now();
                let outcome = match &self.completion {
                    Some(client) => {
                        client
                            .complete(
                                &step.prompt.system,
                                &step.prompt.user,
                                self.sampling.temperature,
                                self.sampling.max_tokens,
                            )
                            .await
                    }
                    None => Err(UpstreamError::unavailable("completion not configured")),
                };
                match &outcome {
                    Ok(_) => info!(
                        "[LLM] {:?} completion in {}ms",
                        step.prompt.kind,
                        start.elapsed().as_millis()
                    ),
                    Err(e) => warn!("[LLM] {:?} completion failed: {}", step.prompt.kind, e),
                }
                policy::finish(step, outcome)
            }
        };

        info!("[A]   answer_source={}", decision.source);
        ResolutionResult::from_lookup(lookup, decision.text, decision.source)
    }
}
