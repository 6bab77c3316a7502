//! [`Llm`] — the provider-agnostic language-model boundary used by
//! extraction, summarization, and goal-completion self-checks.
//!
//! Grounded on `neuron_turn::provider::Provider`'s trait boundary: the
//! specific wire protocol (spec.md §1 Non-goals) never leaks past this
//! trait into `memstack-extraction`, `memstack-community`, or
//! `memstack-session`.

use async_trait::async_trait;

/// Errors from an LLM call.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The call failed in a way that might succeed on retry.
    #[error("transient llm error: {0}")]
    Transient(String),
    /// The call failed in a way retrying won't fix.
    #[error("llm error: {0}")]
    NonTransient(String),
}

/// A single completion request: system prompt + user content. Tool
/// schemas are out of scope here — this trait backs text/JSON generation
/// calls (extraction prompts, summarization, self-checks), not the full
/// tool-calling loop (that lives behind `memstack-session`'s own model
/// call, which this trait also backs for plain text turns).
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// System/instruction prompt.
    pub system: String,
    /// User-turn content.
    pub prompt: String,
    /// Model identifier override.
    pub model: Option<String>,
}

/// Provider-agnostic language-model boundary.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Run a completion and return the raw text response.
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError>;
}
