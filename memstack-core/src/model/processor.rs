//! [`ProcessorState`] — the minimum needed to resume a [`crate`]-driven
//! agent session after a HITL suspension (spec.md §3, §4.10).

use crate::scoping::Scoping;
use serde::{Deserialize, Serialize};

/// Chat message role, mirroring the provider wire format the session
/// processor speaks to (kept minimal — the actual LLM wire protocol is
/// out of scope per spec.md §1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// System/instruction message.
    System,
    /// Human-authored message.
    User,
    /// Model-authored message.
    Assistant,
    /// A tool's result, tied back to a `tool_call_id`.
    Tool,
}

/// A single tool-call the model asked to make, recorded on an assistant
/// message so it can be replayed/resumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallDescriptor {
    /// Provider-assigned call id (used to correlate the tool-result message).
    pub tool_call_id: String,
    /// Name of the tool invoked.
    pub tool_name: String,
    /// Arguments passed to the tool.
    pub arguments: serde_json::Value,
}

/// One entry in the message list the session processor drives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who authored this message.
    pub role: MessageRole,
    /// Text content (empty string is valid, e.g. a pure tool-call message).
    pub content: String,
    /// Tool calls this assistant message requested, if any.
    #[serde(default)]
    pub tool_calls: Vec<ToolCallDescriptor>,
    /// For `Tool`-role messages: the call this responds to.
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// An assistant message, optionally carrying tool calls.
    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCallDescriptor>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// A tool-result message answering `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// The minimum state needed to resume an agent session after a HITL
/// suspension, across a process restart (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorState {
    /// Ordered message history.
    pub messages: Vec<ChatMessage>,
    /// The tool-call id the HITL suspension is waiting on.
    pub pending_tool_call_id: String,
    /// Last event sequence number emitted before suspension — the driver
    /// resumes numbering from `last_sequence_number + 1` (spec.md §4.10,
    /// §5, §8).
    pub last_sequence_number: u64,
    /// Step counter at the point of suspension.
    pub step_count: u32,
    /// Name of the forced skill in effect, if any.
    pub forced_skill_name: Option<String>,
    /// Tool names the forced skill restricts execution to.
    pub forced_skill_tools: Option<std::collections::HashSet<String>>,
    /// Conversation/tenant/project scoping.
    pub conversation_id: String,
    /// Tenant/project/user scoping.
    pub scoping: Scoping,
    /// A HITL response pre-injected for the next matching handler call,
    /// if the session is being resumed after an answer arrived.
    pub preinjected_hitl_response: Option<crate::model::hitl::HitlResponse>,
}

impl ProcessorState {
    /// Construct the state captured at the moment a turn suspends on
    /// `HITLPending` (spec.md §4.10 "Suspension & resume").
    pub fn suspend(
        messages: Vec<ChatMessage>,
        pending_tool_call_id: impl Into<String>,
        last_sequence_number: u64,
        step_count: u32,
        forced_skill_name: Option<String>,
        forced_skill_tools: Option<std::collections::HashSet<String>>,
        conversation_id: impl Into<String>,
        scoping: Scoping,
    ) -> Self {
        Self {
            messages,
            pending_tool_call_id: pending_tool_call_id.into(),
            last_sequence_number,
            step_count,
            forced_skill_name,
            forced_skill_tools,
            conversation_id: conversation_id.into(),
            scoping,
            preinjected_hitl_response: None,
        }
    }

    /// Attach the HITL response a resumed session should pre-inject.
    pub fn with_preinjected_response(mut self, response: crate::model::hitl::HitlResponse) -> Self {
        self.preinjected_hitl_response = Some(response);
        self
    }
}
