//! The HITL envelope: [`HitlRequest`], [`HitlResponse`], and their typed
//! payloads (spec.md §3, §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four kinds of Human-in-the-Loop prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlType {
    /// Ask the user to clarify intent among options (or free text).
    Clarification,
    /// Ask the user to choose among risk-rated decisions.
    Decision,
    /// Ask the user to supply one or more environment-variable values.
    EnvVar,
    /// Ask the user to approve or deny a risky tool action.
    Permission,
}

impl HitlType {
    /// The `request_id` prefix for this type (spec.md §3, §6):
    /// `clar_` / `deci_` / `env_` / `perm_`.
    pub fn id_prefix(self) -> &'static str {
        match self {
            HitlType::Clarification => "clar_",
            HitlType::Decision => "deci_",
            HitlType::EnvVar => "env_",
            HitlType::Permission => "perm_",
        }
    }
}

/// Lifecycle status of a pending HITL request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlStatus {
    /// Waiting on the user.
    Pending,
    /// A response was delivered but not yet consumed by the handler.
    Answered,
    /// The response was consumed; the tool call resumed.
    Completed,
    /// `expires_at` passed with no response.
    Timeout,
    /// The request was explicitly cancelled.
    Cancelled,
}

/// One clarification option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationOption {
    /// Stable option id.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Whether this option is the recommended default.
    pub recommended: Option<bool>,
}

/// One decision option, risk-rated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOption {
    /// Stable option id.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Optional risk tier (implementation-defined string, e.g. "low").
    pub risk_level: Option<String>,
    /// Concrete risks associated with this option.
    #[serde(default)]
    pub risks: Vec<String>,
    /// Optional human-readable time estimate.
    pub estimated_time: Option<String>,
    /// Optional human-readable cost estimate.
    pub estimated_cost: Option<String>,
    /// Whether this option is the recommended default.
    pub recommended: Option<bool>,
}

/// One field of an environment-variable request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVarField {
    /// Variable name.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Whether this field must be supplied.
    pub required: bool,
    /// Whether the value should be treated/encrypted as a secret.
    pub secret: bool,
    /// Input widget hint (e.g. "password", "text", "url").
    pub input_type: String,
    /// Optional default value.
    pub default_value: Option<String>,
    /// Optional placeholder text.
    pub placeholder: Option<String>,
}

/// Typed request payload, one variant per [`HitlType`] (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "hitl_type", rename_all = "snake_case")]
pub enum HitlRequestPayload {
    /// Clarification request.
    Clarification {
        /// The question posed to the user.
        question: String,
        /// Free-text categorization of the clarification.
        clarification_type: String,
        /// Candidate options.
        options: Vec<ClarificationOption>,
        /// Whether a free-text custom answer is accepted.
        allow_custom: bool,
        /// Default value if the user doesn't answer.
        default_value: Option<String>,
        /// Opaque context payload.
        context: Option<serde_json::Value>,
    },
    /// Decision request.
    Decision {
        /// The question posed to the user.
        question: String,
        /// Free-text categorization of the decision.
        decision_type: String,
        /// Candidate options.
        options: Vec<DecisionOption>,
        /// Whether a free-text custom answer is accepted.
        allow_custom: bool,
        /// Default option id if the user doesn't answer.
        default_option: Option<String>,
        /// Opaque context payload.
        context: Option<serde_json::Value>,
    },
    /// Environment-variable request.
    EnvVar {
        /// The tool that needs these variables.
        tool_name: String,
        /// Fields to collect.
        fields: Vec<EnvVarField>,
        /// Optional message shown above the fields.
        message: Option<String>,
        /// Whether the user may opt to persist these values for reuse.
        allow_save: bool,
    },
    /// Permission request.
    Permission {
        /// The tool requesting permission.
        tool_name: String,
        /// The action it wants to perform.
        action: String,
        /// Risk tier of the action.
        risk_level: String,
        /// Optional longer description.
        description: Option<String>,
        /// Optional structured details.
        details: Option<serde_json::Value>,
        /// Whether the user may opt to remember this decision.
        allow_remember: bool,
    },
}

impl HitlRequestPayload {
    /// The [`HitlType`] this payload belongs to.
    pub fn hitl_type(&self) -> HitlType {
        match self {
            HitlRequestPayload::Clarification { .. } => HitlType::Clarification,
            HitlRequestPayload::Decision { .. } => HitlType::Decision,
            HitlRequestPayload::EnvVar { .. } => HitlType::EnvVar,
            HitlRequestPayload::Permission { .. } => HitlType::Permission,
        }
    }
}

/// A pending user-input prompt (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlRequest {
    /// Prefixed identifier (`clar_…`/`deci_…`/`env_…`/`perm_…`).
    pub request_id: String,
    /// Conversation this request belongs to.
    pub conversation_id: String,
    /// Message the request is attached to, if any.
    pub message_id: Option<String>,
    /// The tool call that raised this request, for UI grouping
    /// (supplemented from `original_source/.../hitl_types.py`).
    pub tool_name: Option<String>,
    /// Timeout in seconds from `created_at`.
    pub timeout_secs: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// `created_at + timeout_secs`. Invariant: `expires_at - now <= timeout_secs`.
    pub expires_at: DateTime<Utc>,
    /// Current status.
    pub status: HitlStatus,
    /// The typed payload matching `hitl_type`.
    pub payload: HitlRequestPayload,
}

impl HitlRequest {
    /// Construct a new pending request, deriving `request_id` from the
    /// type's prefix plus a UUID tail and `expires_at` from `timeout_secs`.
    pub fn new(
        conversation_id: impl Into<String>,
        message_id: Option<String>,
        tool_name: Option<String>,
        timeout_secs: u64,
        created_at: DateTime<Utc>,
        payload: HitlRequestPayload,
    ) -> Self {
        let prefix = payload.hitl_type().id_prefix();
        let request_id = format!("{prefix}{}", uuid::Uuid::new_v4().simple());
        Self {
            request_id,
            conversation_id: conversation_id.into(),
            message_id,
            tool_name,
            timeout_secs,
            created_at,
            expires_at: created_at + chrono::Duration::seconds(timeout_secs as i64),
            status: HitlStatus::Pending,
            payload,
        }
    }

    /// The request's HITL type.
    pub fn hitl_type(&self) -> HitlType {
        self.payload.hitl_type()
    }

    /// Whether `now` is past this request's expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// The user's typed answer, matching the request's [`HitlType`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "hitl_type", rename_all = "snake_case")]
pub enum HitlResponsePayload {
    /// Answer to a clarification.
    Clarification {
        /// The chosen option id, or free text if `allow_custom`.
        answer: String,
    },
    /// Answer to a decision.
    Decision {
        /// The chosen option id.
        decision: String,
    },
    /// Answer to an environment-variable request.
    EnvVar {
        /// Supplied `name -> value` pairs.
        values: std::collections::HashMap<String, String>,
    },
    /// Answer to a permission request.
    Permission {
        /// Whether the action is approved.
        action: String,
        /// Whether to remember this decision for future calls.
        remember: Option<bool>,
    },
}

impl HitlResponsePayload {
    /// The [`HitlType`] this payload answers.
    pub fn hitl_type(&self) -> HitlType {
        match self {
            HitlResponsePayload::Clarification { .. } => HitlType::Clarification,
            HitlResponsePayload::Decision { .. } => HitlType::Decision,
            HitlResponsePayload::EnvVar { .. } => HitlType::EnvVar,
            HitlResponsePayload::Permission { .. } => HitlType::Permission,
        }
    }
}

/// The user's answer to a [`HitlRequest`] (spec.md §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlResponse {
    /// The request this answers.
    pub request_id: String,
    /// Typed response payload.
    pub payload: HitlResponsePayload,
    /// Optional id of the user who answered.
    pub user_id: Option<String>,
    /// When the response was recorded.
    pub timestamp: DateTime<Utc>,
}

impl HitlResponse {
    /// The response's HITL type.
    pub fn hitl_type(&self) -> HitlType {
        self.payload.hitl_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_prefixes_match_hitl_type() {
        let now = Utc::now();
        let req = HitlRequest::new(
            "conv-1",
            None,
            None,
            60,
            now,
            HitlRequestPayload::Permission {
                tool_name: "shell".into(),
                action: "rm -rf".into(),
                risk_level: "high".into(),
                description: None,
                details: None,
                allow_remember: false,
            },
        );
        assert!(req.request_id.starts_with("perm_"));
    }

    #[test]
    fn expires_at_minus_now_never_exceeds_timeout() {
        let now = Utc::now();
        let req = HitlRequest::new(
            "conv-1",
            None,
            None,
            30,
            now,
            HitlRequestPayload::Clarification {
                question: "which one?".into(),
                clarification_type: "generic".into(),
                options: vec![],
                allow_custom: true,
                default_value: None,
                context: None,
            },
        );
        assert!((req.expires_at - req.created_at).num_seconds() <= 30);
    }
}
