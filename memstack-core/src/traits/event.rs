//! [`EventBus`] and [`SessionEvent`] — the external event-stream boundary
//! (spec.md §6 "Event stream").

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One emitted event. Carries a monotonic `sequence_number` per
/// conversation (spec.md §5, §8 "Sequence continuity").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Monotonically increasing per-conversation sequence number.
    pub sequence_number: u64,
    /// The conversation this event belongs to.
    pub conversation_id: String,
    /// Event type + payload.
    pub kind: SessionEventKind,
}

/// Event type + payload (spec.md §6's type list).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEventKind {
    /// Turn started.
    Start,
    /// A streamed text fragment.
    TextDelta {
        /// The text fragment.
        delta: String,
    },
    /// The model requested a tool call.
    Act {
        /// Tool name.
        tool_name: String,
        /// Tool call id.
        tool_call_id: String,
        /// Arguments passed to the tool.
        arguments: serde_json::Value,
    },
    /// A tool call's result.
    Observe {
        /// Tool call id this answers.
        tool_call_id: String,
        /// Result value, if the call succeeded.
        result: Option<serde_json::Value>,
        /// Error message, if the call failed. The loop continues
        /// regardless (spec.md §7).
        error: Option<String>,
        /// Duration of the tool call, in milliseconds.
        duration_ms: u64,
        /// UI metadata, present for MCP-UI tool calls.
        ui_metadata: Option<serde_json::Value>,
    },
    /// A model "thinking" fragment, when the provider exposes one.
    Thought {
        /// The thought text.
        text: String,
    },
    /// A clarification request was raised.
    ClarificationAsked {
        /// The HITL request id.
        request_id: String,
    },
    /// A clarification request was answered.
    ClarificationAnswered {
        /// The HITL request id.
        request_id: String,
    },
    /// A decision request was raised.
    DecisionAsked {
        /// The HITL request id.
        request_id: String,
    },
    /// A decision request was answered.
    DecisionAnswered {
        /// The HITL request id.
        request_id: String,
    },
    /// An environment-variable request was raised.
    EnvVarRequested {
        /// The HITL request id.
        request_id: String,
    },
    /// An environment-variable request was answered.
    EnvVarProvided {
        /// The HITL request id.
        request_id: String,
    },
    /// A permission request was raised.
    PermissionAsked {
        /// The HITL request id.
        request_id: String,
    },
    /// An MCP-UI tool produced a UI result.
    McpAppResult {
        /// Tool call id this answers.
        tool_call_id: String,
        /// Resource URI (normalized to `resource_uri`, spec.md §4.10).
        resource_uri: String,
    },
    /// A forced-skill execution completed.
    SkillExecutionComplete {
        /// Name of the skill.
        skill_name: String,
    },
    /// The turn finished.
    Finish {
        /// Free-text reason the turn ended.
        reason: String,
    },
    /// The turn ended due to an error.
    Error {
        /// Error message.
        message: String,
    },
}

/// Publishes [`SessionEvent`]s for downstream SSE/WebSocket transports
/// (out of scope per spec.md §1).
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish one event for a conversation.
    async fn publish(&self, event: SessionEvent);
}
