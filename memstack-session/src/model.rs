//! [`SessionModel`] — the tool-calling completion boundary the session
//! processor drives (spec.md §4.10).
//!
//! Kept separate from `memstack_core::Llm` (which backs plain text/JSON
//! completions for extraction, summarization, and goal self-checks):
//! this trait additionally carries tool schemas and a stop reason,
//! mirroring `neuron_turn::provider::Provider` / `ProviderRequest` /
//! `ProviderResponse`, but object-safe (`async_trait`, not RPITIT) since
//! `SessionProcessor` is built fresh per resume and stored behind `Arc`.

use async_trait::async_trait;
use memstack_core::model::ChatMessage;
use serde::{Deserialize, Serialize};

/// JSON Schema description of a tool, as handed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input.
    pub input_schema: serde_json::Value,
}

/// One completion request: full message history plus the tools in scope
/// for this step (already filtered for forced-skill restriction, spec.md
/// §4.10 "Forced-skill tool filtering").
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Model identifier.
    pub model: String,
    /// Ordered message history, including the system message.
    pub messages: Vec<ChatMessage>,
    /// Tools the model may call this step.
    pub tools: Vec<ToolSchema>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A final response with no further tool calls.
    EndTurn,
    /// The model wants to call one or more tools.
    ToolUse,
    /// The response was truncated at the token limit.
    MaxTokens,
    /// The response was blocked by a content filter.
    ContentFilter,
}

/// A tool call the model requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUseRequest {
    /// Provider-assigned call id.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Arguments.
    pub input: serde_json::Value,
}

/// One part of a model response (spec.md §4.10: text deltas, thoughts,
/// tool calls). The wire-level streaming protocol itself is out of scope
/// per spec.md §1 — a part here is the complete fragment the driver
/// would have streamed, not a partial token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePart {
    /// Assistant-visible text.
    Text {
        /// The text.
        text: String,
    },
    /// A model "thinking" fragment, when the provider exposes one.
    Thought {
        /// The thought text.
        text: String,
    },
    /// A tool call request.
    ToolUse(ToolUseRequest),
}

/// A completion response.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    /// Response parts, in emission order.
    pub parts: Vec<ResponsePart>,
    /// Why the model stopped.
    pub stop_reason: StopReason,
}

impl ModelResponse {
    /// Concatenated text of every [`ResponsePart::Text`] part.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ResponsePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Every tool call requested in this response, in order.
    pub fn tool_uses(&self) -> Vec<&ToolUseRequest> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ResponsePart::ToolUse(t) => Some(t),
                _ => None,
            })
            .collect()
    }
}

/// Errors from a model completion call. Distinct from
/// `memstack_core::error::SessionError` only in that it's the trait's
/// narrow error surface; `SessionProcessor` folds this into
/// `SessionError::Model`.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The call itself failed (network, auth, rate limit — wire details
    /// out of scope per spec.md §1).
    #[error("model call failed: {0}")]
    CallFailed(String),
}

/// The tool-calling completion boundary (spec.md §4.10). Never imports a
/// concrete provider SDK; the specific wire protocol is out of scope.
#[async_trait]
pub trait SessionModel: Send + Sync {
    /// Run one completion.
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;
}
