//! Workspace-level integration test: a session turn suspends on a
//! clarification request and resumes once the answer is available,
//! crossing the `memstack-session` / `memstack-hitl` / `memstack-core`
//! boundary the same way a real deployment would persist the pending
//! request, restart, and replay it with a preinjected answer.

use async_trait::async_trait;
use memstack_core::model::{
    ChatMessage, HitlResponse, HitlResponsePayload, HitlType,
};
use memstack_core::scoping::Scoping;
use memstack_core::test_support::{FakeClock, FakeEventBus, FakeRelationalStore};
use memstack_hitl::{HitlHandler, PreinjectedAnswer};
use memstack_session::{
    ModelError, ModelRequest, ModelResponse, ResponsePart, SessionModel, SessionProcessor,
    StepOutcome, StopReason, ToolDefinition, ToolUseRequest,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

struct ScriptedModel {
    responses: Mutex<VecDeque<ModelResponse>>,
}

impl ScriptedModel {
    fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }
}

#[async_trait]
impl SessionModel for ScriptedModel {
    async fn complete(&self, _request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.responses
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| ModelError::CallFailed("script exhausted".into()))
    }
}

fn ask_user_tool() -> ToolDefinition {
    ToolDefinition::hitl(
        "ask_user",
        "ask the user a clarifying question",
        serde_json::json!({}),
        HitlType::Clarification,
    )
}

#[tokio::test]
async fn turn_suspends_then_resumes_to_completion() {
    let relational = Arc::new(FakeRelationalStore::new());
    let events = Arc::new(FakeEventBus::new());
    let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
    let scoping = Scoping::new("tenant-a", "project-a");

    let model = Arc::new(ScriptedModel::new(vec![
        ModelResponse {
            parts: vec![ResponsePart::ToolUse(ToolUseRequest {
                id: "call-1".into(),
                name: "ask_user".into(),
                input: serde_json::json!({"question": "which file?"}),
            })],
            stop_reason: StopReason::ToolUse,
        },
        ModelResponse {
            parts: vec![ResponsePart::Text {
                text: "done".into(),
            }],
            stop_reason: StopReason::EndTurn,
        },
    ]));

    let first_handler = HitlHandler::new(
        "conv-int-1",
        scoping.clone(),
        None,
        300,
        relational.clone(),
        events.clone(),
        clock.clone(),
        None,
    );
    let processor = SessionProcessor::new(
        model.clone(),
        "test-model",
        vec![ask_user_tool()],
        None,
        None,
        relational.clone(),
        events.clone(),
        first_handler,
        "conv-int-1",
        scoping.clone(),
        None,
        None,
        20,
        3,
    );

    let outcome = processor
        .run(vec![ChatMessage::user("please help")], 0, 0)
        .await
        .unwrap();
    let pending = match outcome {
        StepOutcome::Suspended(p) => p,
        StepOutcome::Finished { .. } => panic!("expected suspension on the clarification request"),
    };
    assert!(pending.info.request_id.starts_with("clar_"));
    assert_eq!(pending.pending_tool_call_id, "call-1");

    let response = HitlResponse {
        request_id: pending.info.request_id.clone(),
        payload: HitlResponsePayload::Clarification {
            answer: "config.rs".into(),
        },
        user_id: None,
        timestamp: chrono::Utc::now(),
    };
    let resumed_handler = HitlHandler::new(
        "conv-int-1",
        scoping.clone(),
        None,
        300,
        relational.clone(),
        events.clone(),
        clock,
        Some(PreinjectedAnswer::Answered(response)),
    );
    let resumed = SessionProcessor::new(
        model,
        "test-model",
        vec![ask_user_tool()],
        None,
        None,
        relational,
        events,
        resumed_handler,
        "conv-int-1",
        scoping,
        None,
        None,
        20,
        3,
    );

    let outcome = resumed
        .resume(pending.messages, pending.step_count, pending.last_sequence_number)
        .await
        .unwrap();
    match outcome {
        StepOutcome::Finished {
            last_sequence_number,
            ..
        } => {
            assert!(last_sequence_number > pending.last_sequence_number);
        }
        StepOutcome::Suspended(_) => panic!("expected the resumed turn to finish"),
    }
}
