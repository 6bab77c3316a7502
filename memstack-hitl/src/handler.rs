//! [`HitlHandler`] — the suspension primitive invoked on every HITL tool
//! call (spec.md §4.9).

use memstack_core::error::HitlError;
use memstack_core::model::hitl::{ClarificationOption, DecisionOption, EnvVarField};
use memstack_core::model::{
    HitlRequest, HitlRequestPayload, HitlResponse, HitlResponsePayload, HitlStatus, HitlType,
};
use memstack_core::scoping::Scoping;
use memstack_core::traits::{Clock, EventBus, RelationalStore, SessionEvent, SessionEventKind};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// What a resumed handler was pre-seeded with, for the next HITL call
/// whose type matches (spec.md §4.9, §4.10). `ProcessorState` only
/// carries an answered [`HitlResponse`]; when the driver resumes a
/// session whose request instead expired or was cancelled, it looks up
/// the persisted `HitlRequest` status and constructs `Unanswered` so the
/// handler still short-circuits to the strategy's default response
/// instead of raising a second, identical request.
#[derive(Debug, Clone)]
pub enum PreinjectedAnswer {
    /// The user answered; the handler should extract and return the
    /// typed value without re-persisting or re-emitting anything.
    Answered(HitlResponse),
    /// The request expired or was cancelled before an answer arrived.
    Unanswered {
        /// The HITL type the (now moot) request was.
        hitl_type: HitlType,
    },
}

impl PreinjectedAnswer {
    fn hitl_type(&self) -> HitlType {
        match self {
            PreinjectedAnswer::Answered(response) => response.hitl_type(),
            PreinjectedAnswer::Unanswered { hitl_type } => *hitl_type,
        }
    }
}

/// What a HITL tool call produced: either an immediate value (resolved
/// from a pre-injected answer) or a request the turn must suspend on.
#[derive(Debug, Clone)]
pub enum HitlOutcome<T> {
    /// The call resolved without suspending.
    Resolved(T),
    /// A new request was raised; the caller must suspend the turn.
    Pending(HitlPendingInfo),
}

/// Everything the driver needs to suspend a turn and, later, resume it
/// (spec.md §4.10 "Suspension & resume").
#[derive(Debug, Clone)]
pub struct HitlPendingInfo {
    /// The newly raised request's id.
    pub request_id: String,
    /// Its HITL type.
    pub hitl_type: HitlType,
    /// The request payload, serialized for wire transport.
    pub request_data: serde_json::Value,
    /// Conversation the request belongs to.
    pub conversation_id: String,
    /// Message the request is attached to, if any.
    pub message_id: Option<String>,
    /// Seconds until the request expires.
    pub timeout_secs: u64,
}

/// Approve/deny outcome for a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionOutcome {
    /// Whether the action was approved.
    pub approved: bool,
    /// Whether the user asked to remember this decision.
    pub remember: bool,
}

fn asked_kind(hitl_type: HitlType, request_id: String) -> SessionEventKind {
    match hitl_type {
        HitlType::Clarification => SessionEventKind::ClarificationAsked { request_id },
        HitlType::Decision => SessionEventKind::DecisionAsked { request_id },
        HitlType::EnvVar => SessionEventKind::EnvVarRequested { request_id },
        HitlType::Permission => SessionEventKind::PermissionAsked { request_id },
    }
}

fn answered_kind(hitl_type: HitlType, request_id: String) -> SessionEventKind {
    match hitl_type {
        HitlType::Clarification => SessionEventKind::ClarificationAnswered { request_id },
        HitlType::Decision => SessionEventKind::DecisionAnswered { request_id },
        HitlType::EnvVar => SessionEventKind::EnvVarProvided { request_id },
        // Permission has no "answered" wire event distinct from "asked"
        // in spec.md §6's type list; re-emit the asked kind so a
        // cancellation is at least observable on the stream.
        HitlType::Permission => SessionEventKind::PermissionAsked { request_id },
    }
}

fn mismatched_payload(expected: &str) -> HitlError {
    HitlError::Other(Box::<dyn std::error::Error + Send + Sync>::from(format!(
        "expected a {expected} response payload"
    )))
}

/// Per-session HITL suspension state: `(conversation_id, scoping,
/// message_id)`, the default timeout, in-flight request ids, and at most
/// one pre-injected answer (spec.md §4.9 "Handler state").
pub struct HitlHandler {
    conversation_id: String,
    scoping: Scoping,
    message_id: Option<String>,
    default_timeout_secs: u64,
    relational: Arc<dyn RelationalStore>,
    events: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    in_flight: Mutex<HashSet<String>>,
    preinjected: Mutex<Option<PreinjectedAnswer>>,
}

impl HitlHandler {
    /// Construct a handler for one session. `preinjected` is `Some` only
    /// when resuming after a HITL answer (or expiry/cancellation).
    pub fn new(
        conversation_id: impl Into<String>,
        scoping: Scoping,
        message_id: Option<String>,
        default_timeout_secs: u64,
        relational: Arc<dyn RelationalStore>,
        events: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        preinjected: Option<PreinjectedAnswer>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            scoping,
            message_id,
            default_timeout_secs,
            relational,
            events,
            clock,
            in_flight: Mutex::new(HashSet::new()),
            preinjected: Mutex::new(preinjected),
        }
    }

    /// Peek the pre-injected answer iff its type matches `hitl_type`.
    /// Never consumes it (spec.md §4.9 "Peeking does not consume").
    pub async fn peek_preinjected_response(
        &self,
        hitl_type: HitlType,
    ) -> Option<PreinjectedAnswer> {
        let guard = self.preinjected.lock().await;
        guard
            .as_ref()
            .filter(|a| a.hitl_type() == hitl_type)
            .cloned()
    }

    async fn take_matching(&self, hitl_type: HitlType) -> Option<PreinjectedAnswer> {
        let mut guard = self.preinjected.lock().await;
        if guard.as_ref().map(|a| a.hitl_type()) == Some(hitl_type) {
            guard.take()
        } else {
            None
        }
    }

    /// The request ids this handler has raised and not yet seen answered
    /// or cancelled.
    pub async fn in_flight_request_ids(&self) -> HashSet<String> {
        self.in_flight.lock().await.clone()
    }

    /// The tenant/project/user scoping this handler's requests carry.
    pub fn scoping(&self) -> &Scoping {
        &self.scoping
    }

    /// Ask the user to clarify among `options` (or free text).
    #[allow(clippy::too_many_arguments)]
    pub async fn ask_clarification(
        &self,
        question: impl Into<String>,
        clarification_type: impl Into<String>,
        options: Vec<ClarificationOption>,
        allow_custom: bool,
        default_value: Option<String>,
        context: Option<serde_json::Value>,
        tool_name: Option<String>,
        timeout_secs: Option<u64>,
        sequence_number: u64,
    ) -> Result<HitlOutcome<String>, HitlError> {
        let fallback = default_value.clone().unwrap_or_default();
        let payload = HitlRequestPayload::Clarification {
            question: question.into(),
            clarification_type: clarification_type.into(),
            options,
            allow_custom,
            default_value,
            context,
        };
        self.resolve(
            payload,
            tool_name,
            timeout_secs,
            sequence_number,
            |response| match response {
                HitlResponsePayload::Clarification { answer } => Ok(answer.clone()),
                _ => Err(mismatched_payload("clarification")),
            },
            move || fallback,
        )
        .await
    }

    /// Ask the user to choose among risk-rated `options`.
    #[allow(clippy::too_many_arguments)]
    pub async fn ask_decision(
        &self,
        question: impl Into<String>,
        decision_type: impl Into<String>,
        options: Vec<DecisionOption>,
        allow_custom: bool,
        default_option: Option<String>,
        context: Option<serde_json::Value>,
        tool_name: Option<String>,
        timeout_secs: Option<u64>,
        sequence_number: u64,
    ) -> Result<HitlOutcome<String>, HitlError> {
        let fallback = default_option.clone().unwrap_or_default();
        let payload = HitlRequestPayload::Decision {
            question: question.into(),
            decision_type: decision_type.into(),
            options,
            allow_custom,
            default_option,
            context,
        };
        self.resolve(
            payload,
            tool_name,
            timeout_secs,
            sequence_number,
            |response| match response {
                HitlResponsePayload::Decision { decision } => Ok(decision.clone()),
                _ => Err(mismatched_payload("decision")),
            },
            move || fallback,
        )
        .await
    }

    /// Ask the user to supply values for one or more environment-variable
    /// `fields`.
    pub async fn ask_env_var(
        &self,
        tool_name: impl Into<String>,
        fields: Vec<EnvVarField>,
        message: Option<String>,
        allow_save: bool,
        timeout_secs: Option<u64>,
        sequence_number: u64,
    ) -> Result<HitlOutcome<HashMap<String, String>>, HitlError> {
        let tool_name = tool_name.into();
        let fallback: HashMap<String, String> = fields
            .iter()
            .filter_map(|f| f.default_value.clone().map(|v| (f.name.clone(), v)))
            .collect();
        let payload = HitlRequestPayload::EnvVar {
            tool_name: tool_name.clone(),
            fields,
            message,
            allow_save,
        };
        self.resolve(
            payload,
            Some(tool_name),
            timeout_secs,
            sequence_number,
            |response| match response {
                HitlResponsePayload::EnvVar { values } => Ok(values.clone()),
                _ => Err(mismatched_payload("env_var")),
            },
            move || fallback,
        )
        .await
    }

    /// Ask the user to approve or deny a risky tool action.
    #[allow(clippy::too_many_arguments)]
    pub async fn ask_permission(
        &self,
        tool_name: impl Into<String>,
        action: impl Into<String>,
        risk_level: impl Into<String>,
        description: Option<String>,
        details: Option<serde_json::Value>,
        allow_remember: bool,
        timeout_secs: Option<u64>,
        sequence_number: u64,
    ) -> Result<HitlOutcome<PermissionOutcome>, HitlError> {
        let tool_name = tool_name.into();
        let payload = HitlRequestPayload::Permission {
            tool_name: tool_name.clone(),
            action: action.into(),
            risk_level: risk_level.into(),
            description,
            details,
            allow_remember,
        };
        self.resolve(
            payload,
            Some(tool_name),
            timeout_secs,
            sequence_number,
            |response| match response {
                HitlResponsePayload::Permission { action, remember } => Ok(PermissionOutcome {
                    approved: action.eq_ignore_ascii_case("approve")
                        || action.eq_ignore_ascii_case("approved"),
                    remember: remember.unwrap_or(false),
                }),
                _ => Err(mismatched_payload("permission")),
            },
            // A request nobody answered is denied by default.
            || PermissionOutcome {
                approved: false,
                remember: false,
            },
        )
        .await
    }

    /// Cancel an in-flight request: removes it from the in-flight set,
    /// marks it cancelled in the relational store, and emits a
    /// cancellation-observable event (spec.md §4.9 "Cancellation").
    pub async fn cancel_request(
        &self,
        request_id: &str,
        hitl_type: HitlType,
        reason: Option<String>,
        sequence_number: u64,
    ) -> Result<(), HitlError> {
        self.in_flight.lock().await.remove(request_id);
        self.relational
            .update_hitl_status(request_id, HitlStatus::Cancelled)
            .await
            .map_err(|e| HitlError::PersistFailed(e.to_string()))?;
        if let Some(reason) = reason.as_deref() {
            tracing::info!(request_id, reason, "hitl request cancelled");
        } else {
            tracing::info!(request_id, "hitl request cancelled");
        }
        self.events
            .publish(SessionEvent {
                sequence_number,
                conversation_id: self.conversation_id.clone(),
                kind: answered_kind(hitl_type, request_id.to_string()),
            })
            .await;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn resolve<T>(
        &self,
        payload: HitlRequestPayload,
        tool_name: Option<String>,
        timeout_secs: Option<u64>,
        sequence_number: u64,
        extract: impl FnOnce(&HitlResponsePayload) -> Result<T, HitlError>,
        default_response: impl FnOnce() -> T,
    ) -> Result<HitlOutcome<T>, HitlError> {
        let hitl_type = payload.hitl_type();

        if let Some(preinjected) = self.take_matching(hitl_type).await {
            return match preinjected {
                PreinjectedAnswer::Answered(response) => {
                    extract(&response.payload).map(HitlOutcome::Resolved)
                }
                PreinjectedAnswer::Unanswered { .. } => {
                    Ok(HitlOutcome::Resolved(default_response()))
                }
            };
        }

        let now = self.clock.now();
        let request = HitlRequest::new(
            self.conversation_id.clone(),
            self.message_id.clone(),
            tool_name,
            timeout_secs.unwrap_or(self.default_timeout_secs),
            now,
            payload,
        );

        self.relational
            .save_hitl_request(&request)
            .await
            .map_err(|e| HitlError::PersistFailed(e.to_string()))?;
        self.in_flight
            .lock()
            .await
            .insert(request.request_id.clone());

        self.events
            .publish(SessionEvent {
                sequence_number,
                conversation_id: self.conversation_id.clone(),
                kind: asked_kind(hitl_type, request.request_id.clone()),
            })
            .await;

        let request_data = serde_json::to_value(&request.payload).unwrap_or(serde_json::Value::Null);
        Ok(HitlOutcome::Pending(HitlPendingInfo {
            request_id: request.request_id,
            hitl_type,
            request_data,
            conversation_id: self.conversation_id.clone(),
            message_id: self.message_id.clone(),
            timeout_secs: request.timeout_secs,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memstack_core::test_support::{FakeClock, FakeEventBus, FakeRelationalStore};

    fn handler(
        relational: Arc<dyn RelationalStore>,
        events: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        preinjected: Option<PreinjectedAnswer>,
    ) -> HitlHandler {
        HitlHandler::new(
            "conv-1",
            Scoping::new("tenant-1", "project-1"),
            Some("msg-1".into()),
            300,
            relational,
            events,
            clock,
            preinjected,
        )
    }

    #[tokio::test]
    async fn clarification_without_preinjection_persists_and_suspends() {
        let relational = Arc::new(FakeRelationalStore::new());
        let events = Arc::new(FakeEventBus::new());
        let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
        let h = handler(relational.clone(), events.clone(), clock, None);

        let outcome = h
            .ask_clarification(
                "which one?",
                "generic",
                vec![],
                true,
                None,
                None,
                Some("search".into()),
                None,
                1,
            )
            .await
            .unwrap();

        match outcome {
            HitlOutcome::Pending(info) => {
                assert!(info.request_id.starts_with("clar_"));
                assert_eq!(info.timeout_secs, 300);
                assert!(relational
                    .get_hitl_request(&info.request_id)
                    .await
                    .unwrap()
                    .is_some());
            }
            HitlOutcome::Resolved(_) => panic!("expected suspension"),
        }
        assert_eq!(events.events().len(), 1);
    }

    #[tokio::test]
    async fn preinjected_answer_resolves_without_persisting() {
        let relational = Arc::new(FakeRelationalStore::new());
        let events = Arc::new(FakeEventBus::new());
        let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
        let response = HitlResponse {
            request_id: "clar_abc".into(),
            payload: HitlResponsePayload::Clarification {
                answer: "option-a".into(),
            },
            user_id: None,
            timestamp: chrono::Utc::now(),
        };
        let h = handler(
            relational.clone(),
            events.clone(),
            clock,
            Some(PreinjectedAnswer::Answered(response)),
        );

        let outcome = h
            .ask_clarification("which?", "generic", vec![], true, None, None, None, None, 1)
            .await
            .unwrap();

        match outcome {
            HitlOutcome::Resolved(answer) => assert_eq!(answer, "option-a"),
            HitlOutcome::Pending(_) => panic!("expected resolution"),
        }
        assert!(events.events().is_empty());
        assert!(relational.list_pending_compensating_transactions().await.is_empty());
    }

    #[tokio::test]
    async fn preinjected_answer_is_non_destructive_until_consumed() {
        let relational = Arc::new(FakeRelationalStore::new());
        let events = Arc::new(FakeEventBus::new());
        let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
        let response = HitlResponse {
            request_id: "deci_abc".into(),
            payload: HitlResponsePayload::Decision {
                decision: "approve".into(),
            },
            user_id: None,
            timestamp: chrono::Utc::now(),
        };
        let h = handler(
            relational,
            events,
            clock,
            Some(PreinjectedAnswer::Answered(response)),
        );

        assert!(h
            .peek_preinjected_response(HitlType::Decision)
            .await
            .is_some());
        assert!(h
            .peek_preinjected_response(HitlType::Decision)
            .await
            .is_some());
        assert!(h
            .peek_preinjected_response(HitlType::Clarification)
            .await
            .is_none());

        let outcome = h
            .ask_decision(
                "proceed?",
                "generic",
                vec![],
                false,
                None,
                None,
                None,
                None,
                1,
            )
            .await
            .unwrap();
        assert!(matches!(outcome, HitlOutcome::Resolved(d) if d == "approve"));
        assert!(h
            .peek_preinjected_response(HitlType::Decision)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn unanswered_preinjection_returns_strategy_default() {
        let relational = Arc::new(FakeRelationalStore::new());
        let events = Arc::new(FakeEventBus::new());
        let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
        let h = handler(
            relational,
            events.clone(),
            clock,
            Some(PreinjectedAnswer::Unanswered {
                hitl_type: HitlType::Permission,
            }),
        );

        let outcome = h
            .ask_permission(
                "shell",
                "rm -rf /tmp/x",
                "high",
                None,
                None,
                true,
                None,
                1,
            )
            .await
            .unwrap();

        match outcome {
            HitlOutcome::Resolved(perm) => {
                assert!(!perm.approved);
                assert!(!perm.remember);
            }
            HitlOutcome::Pending(_) => panic!("expected default resolution"),
        }
        assert!(events.events().is_empty());
    }

    #[tokio::test]
    async fn cancel_request_marks_cancelled_and_emits_event() {
        let relational = Arc::new(FakeRelationalStore::new());
        let events = Arc::new(FakeEventBus::new());
        let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
        let h = handler(relational.clone(), events.clone(), clock, None);

        let outcome = h
            .ask_clarification(
                "q", "generic", vec![], true, None, None, None, None, 1,
            )
            .await
            .unwrap();
        let request_id = match outcome {
            HitlOutcome::Pending(info) => info.request_id,
            _ => unreachable!(),
        };
        assert!(h.in_flight_request_ids().await.contains(&request_id));

        h.cancel_request(&request_id, HitlType::Clarification, Some("user left".into()), 2)
            .await
            .unwrap();

        assert!(!h.in_flight_request_ids().await.contains(&request_id));
        assert_eq!(events.events().len(), 2);
    }
}
