//! [`SessionProcessor`] — the tool-calling step loop (spec.md §4.10),
//! generalized from `neuron_op_react::ReactOperator::execute`'s
//! assemble/call/dispatch/loop shape with one added exit: suspension on
//! a HITL request instead of only ever finishing.

use crate::goal::evaluate_goal_completion;
use crate::model::{ModelRequest, ResponsePart, SessionModel, StopReason, ToolSchema};
use crate::outcome::{HitlPending, StepOutcome};
use crate::tool::{
    restrict_for_forced_skill, MemoryBackend, MemoryOperation, TaskListSource, ToolDefinition,
    ToolKind,
};

use memstack_core::error::SessionError;
use memstack_core::model::hitl::{ClarificationOption, DecisionOption, EnvVarField};
use memstack_core::model::{ChatMessage, HitlType, MessageRole, ToolCallDescriptor};
use memstack_core::scoping::Scoping;
use memstack_core::traits::{EventBus, RelationalStore, SessionEvent, SessionEventKind};
use memstack_hitl::{HitlHandler, HitlOutcome};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Everything the step loop needs beyond the model and tool set itself.
pub struct SessionProcessor {
    model: Arc<dyn SessionModel>,
    model_id: String,
    tools: Vec<ToolDefinition>,
    memory: Option<Arc<dyn MemoryBackend>>,
    task_list: Option<Arc<dyn TaskListSource>>,
    relational: Arc<dyn RelationalStore>,
    events: Arc<dyn EventBus>,
    hitl: HitlHandler,
    conversation_id: String,
    scoping: Scoping,
    forced_skill_name: Option<String>,
    forced_skill_tools: Option<HashSet<String>>,
    max_steps: u32,
    max_no_progress_steps: u32,
}

impl SessionProcessor {
    /// Construct a processor for one run. Whether this is a fresh start
    /// or a HITL resume is decided entirely by `hitl` (pre-seeded with a
    /// [`memstack_hitl::PreinjectedAnswer`] on resume) and by which of
    /// [`Self::run`]/[`Self::resume`] the caller invokes.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: Arc<dyn SessionModel>,
        model_id: impl Into<String>,
        tools: Vec<ToolDefinition>,
        memory: Option<Arc<dyn MemoryBackend>>,
        task_list: Option<Arc<dyn TaskListSource>>,
        relational: Arc<dyn RelationalStore>,
        events: Arc<dyn EventBus>,
        hitl: HitlHandler,
        conversation_id: impl Into<String>,
        scoping: Scoping,
        forced_skill_name: Option<String>,
        forced_skill_tools: Option<HashSet<String>>,
        max_steps: u32,
        max_no_progress_steps: u32,
    ) -> Self {
        Self {
            model,
            model_id: model_id.into(),
            tools,
            memory,
            task_list,
            relational,
            events,
            hitl,
            conversation_id: conversation_id.into(),
            scoping,
            forced_skill_name,
            forced_skill_tools,
            max_steps,
            max_no_progress_steps,
        }
    }

    /// Conversation id this processor drives.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Tenant/project/user scoping, for building a `ProcessorState` to
    /// persist on suspension.
    pub fn scoping(&self) -> &Scoping {
        &self.scoping
    }

    /// Name of the forced skill in effect, if any.
    pub fn forced_skill_name(&self) -> Option<&str> {
        self.forced_skill_name.as_deref()
    }

    /// Tool names the forced skill restricts execution to, if any.
    pub fn forced_skill_tools(&self) -> Option<&HashSet<String>> {
        self.forced_skill_tools.as_ref()
    }

    /// Drive a fresh turn from `messages` until it suspends on a HITL
    /// request or finishes.
    pub async fn run(
        &self,
        messages: Vec<ChatMessage>,
        step_count: u32,
        sequence_number: u64,
    ) -> Result<StepOutcome, SessionError> {
        self.step_loop(messages, step_count, sequence_number, false).await
    }

    /// Resume a turn previously suspended on a HITL request. `messages`
    /// must be the list captured at suspension (the assistant message
    /// that requested the still-unanswered tool call included); `hitl`
    /// must have been constructed with the matching
    /// [`memstack_hitl::PreinjectedAnswer`]. This first resolves the
    /// outstanding tool call(s) the suspension left dangling, then falls
    /// into the same loop [`Self::run`] uses (spec.md §4.10 "Suspension
    /// & resume").
    pub async fn resume(
        &self,
        messages: Vec<ChatMessage>,
        step_count: u32,
        sequence_number: u64,
    ) -> Result<StepOutcome, SessionError> {
        self.step_loop(messages, step_count, sequence_number, true).await
    }

    async fn emit(&self, sequence_number: u64, kind: SessionEventKind) {
        self.events
            .publish(SessionEvent {
                sequence_number,
                conversation_id: self.conversation_id.clone(),
                kind,
            })
            .await;
    }

    /// `sequence_number` is the last number already emitted — the driver
    /// owns continuity across suspend/resume cycles (spec.md §4.10, §8
    /// "Sequence continuity"); this call numbers everything it emits
    /// starting from `sequence_number + 1`.
    async fn step_loop(
        &self,
        mut messages: Vec<ChatMessage>,
        mut step_count: u32,
        mut sequence_number: u64,
        resuming: bool,
    ) -> Result<StepOutcome, SessionError> {
        let mut no_progress_steps = 0u32;

        if resuming {
            let pending_calls = pending_tool_calls(&messages);
            if !pending_calls.is_empty() {
                let allowed = restrict_for_forced_skill(&self.tools, self.forced_skill_tools.as_ref());
                match self
                    .process_tool_batch(&mut messages, &allowed, &pending_calls, &mut sequence_number, step_count)
                    .await
                {
                    BatchOutcome::Suspended(outcome) => return Ok(outcome),
                    BatchOutcome::Continue { any_success } => {
                        if let Some(outcome) = self
                            .after_batch(&mut sequence_number, &mut no_progress_steps, any_success, &messages)
                            .await?
                        {
                            return Ok(outcome);
                        }
                    }
                }
            }
        }

        loop {
            if step_count >= self.max_steps {
                return Ok(self
                    .finish(&mut sequence_number, "max_steps_reached", messages)
                    .await);
            }
            step_count += 1;

            let allowed = restrict_for_forced_skill(&self.tools, self.forced_skill_tools.as_ref());
            let mut step_messages = messages.clone();
            if step_count > 1 {
                if let Some(reminder) = self.forced_skill_reminder(&allowed) {
                    step_messages.push(ChatMessage::system(reminder));
                }
            }

            let tool_schemas: Vec<ToolSchema> = allowed
                .iter()
                .map(|t| ToolSchema {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.input_schema.clone(),
                })
                .collect();

            let request = ModelRequest {
                model: self.model_id.clone(),
                messages: step_messages,
                tools: tool_schemas,
            };
            let response = self
                .model
                .complete(request)
                .await
                .map_err(|e| SessionError::Model(e.to_string()))?;

            for part in &response.parts {
                match part {
                    ResponsePart::Text { text } if !text.is_empty() => {
                        sequence_number += 1;
                        self.emit(
                            sequence_number,
                            SessionEventKind::TextDelta {
                                delta: text.clone(),
                            },
                        )
                        .await;
                    }
                    ResponsePart::Thought { text } => {
                        sequence_number += 1;
                        self.emit(sequence_number, SessionEventKind::Thought { text: text.clone() })
                            .await;
                    }
                    _ => {}
                }
            }

            match response.stop_reason {
                StopReason::MaxTokens | StopReason::ContentFilter => {
                    messages.push(ChatMessage::assistant(response.text(), vec![]));
                    sequence_number += 1;
                    self.emit(
                        sequence_number,
                        SessionEventKind::Error {
                            message: format!("turn stopped: {:?}", response.stop_reason),
                        },
                    )
                    .await;
                    return Ok(self
                        .finish(&mut sequence_number, "stop_reason_error", messages)
                        .await);
                }
                StopReason::EndTurn => {
                    messages.push(ChatMessage::assistant(response.text(), vec![]));
                    let goal = evaluate_goal_completion(
                        &self.model,
                        &self.model_id,
                        &messages,
                        self.task_list.as_ref(),
                    )
                    .await
                    .map_err(|e| SessionError::Model(e.to_string()))?;
                    let reason = if goal.should_stop { "goal_failed" } else { "end_turn" };
                    return Ok(self.finish(&mut sequence_number, reason, messages).await);
                }
                StopReason::ToolUse => {
                    let descriptors: Vec<ToolCallDescriptor> = response
                        .tool_uses()
                        .iter()
                        .map(|t| ToolCallDescriptor {
                            tool_call_id: t.id.clone(),
                            tool_name: t.name.clone(),
                            arguments: t.input.clone(),
                        })
                        .collect();
                    messages.push(ChatMessage::assistant(response.text(), descriptors.clone()));

                    match self
                        .process_tool_batch(&mut messages, &allowed, &descriptors, &mut sequence_number, step_count)
                        .await
                    {
                        BatchOutcome::Suspended(outcome) => return Ok(outcome),
                        BatchOutcome::Continue { any_success } => {
                            if let Some(outcome) = self
                                .after_batch(&mut sequence_number, &mut no_progress_steps, any_success, &messages)
                                .await?
                            {
                                return Ok(outcome);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Dispatch one batch of tool calls in order, stopping (and
    /// returning [`BatchOutcome::Suspended`]) the instant one of them
    /// raises a HITL request.
    async fn process_tool_batch(
        &self,
        messages: &mut Vec<ChatMessage>,
        allowed: &[&ToolDefinition],
        descriptors: &[ToolCallDescriptor],
        sequence_number: &mut u64,
        step_count: u32,
    ) -> BatchOutcome {
        let mut any_success = false;
        for call in descriptors {
            *sequence_number += 1;
            self.emit(
                *sequence_number,
                SessionEventKind::Act {
                    tool_name: call.tool_name.clone(),
                    tool_call_id: call.tool_call_id.clone(),
                    arguments: call.arguments.clone(),
                },
            )
            .await;

            let Some(def) = allowed.iter().find(|t| t.name == call.tool_name) else {
                *sequence_number += 1;
                self.emit(
                    *sequence_number,
                    SessionEventKind::Observe {
                        tool_call_id: call.tool_call_id.clone(),
                        result: None,
                        error: Some(format!("unknown tool: {}", call.tool_name)),
                        duration_ms: 0,
                        ui_metadata: None,
                    },
                )
                .await;
                messages.push(ChatMessage::tool_result(
                    call.tool_call_id.clone(),
                    format!("Error: unknown tool {}", call.tool_name),
                ));
                continue;
            };

            let started = Instant::now();
            match self
                .dispatch(def, &call.tool_call_id, call.arguments.clone(), *sequence_number)
                .await
            {
                Dispatch::Suspend { info, next_sequence } => {
                    *sequence_number = next_sequence;
                    return BatchOutcome::Suspended(StepOutcome::Suspended(HitlPending {
                        info,
                        messages: messages.clone(),
                        pending_tool_call_id: call.tool_call_id.clone(),
                        last_sequence_number: next_sequence,
                        step_count,
                    }));
                }
                Dispatch::Resolved {
                    result,
                    ui_metadata,
                    next_sequence,
                } => {
                    *sequence_number = next_sequence;
                    any_success = true;
                    let duration_ms = started.elapsed().as_millis() as u64;
                    *sequence_number += 1;
                    self.emit(
                        *sequence_number,
                        SessionEventKind::Observe {
                            tool_call_id: call.tool_call_id.clone(),
                            result: Some(result.clone()),
                            error: None,
                            duration_ms,
                            ui_metadata,
                        },
                    )
                    .await;
                    messages.push(ChatMessage::tool_result(call.tool_call_id.clone(), result.to_string()));
                }
                Dispatch::Failed { error, next_sequence } => {
                    *sequence_number = next_sequence;
                    let duration_ms = started.elapsed().as_millis() as u64;
                    *sequence_number += 1;
                    self.emit(
                        *sequence_number,
                        SessionEventKind::Observe {
                            tool_call_id: call.tool_call_id.clone(),
                            result: None,
                            error: Some(error.clone()),
                            duration_ms,
                            ui_metadata: None,
                        },
                    )
                    .await;
                    messages.push(ChatMessage::tool_result(
                        call.tool_call_id.clone(),
                        format!("Error: {error}"),
                    ));
                }
            }
        }
        BatchOutcome::Continue { any_success }
    }

    /// No-progress accounting and goal-completion evaluation, run after
    /// every tool-call batch (spec.md §4.10 "Goal-completion evaluation":
    /// "called opportunistically ... after each batch"). Returns
    /// `Some(outcome)` when the turn should finish, `None` to keep
    /// looping.
    async fn after_batch(
        &self,
        sequence_number: &mut u64,
        no_progress_steps: &mut u32,
        any_success: bool,
        messages: &[ChatMessage],
    ) -> Result<Option<StepOutcome>, SessionError> {
        *no_progress_steps = if any_success { 0 } else { *no_progress_steps + 1 };
        if *no_progress_steps >= self.max_no_progress_steps {
            return Ok(Some(
                self.finish(sequence_number, "no_progress", messages.to_vec()).await,
            ));
        }

        let goal = evaluate_goal_completion(&self.model, &self.model_id, messages, self.task_list.as_ref())
            .await
            .map_err(|e| SessionError::Model(e.to_string()))?;
        if goal.should_stop {
            return Ok(Some(
                self.finish(sequence_number, "goal_failed", messages.to_vec()).await,
            ));
        }
        if goal.achieved {
            return Ok(Some(
                self.finish(sequence_number, "goal_achieved", messages.to_vec()).await,
            ));
        }
        Ok(None)
    }

    async fn finish(&self, sequence_number: &mut u64, reason: &str, messages: Vec<ChatMessage>) -> StepOutcome {
        *sequence_number += 1;
        self.emit(
            *sequence_number,
            SessionEventKind::Finish {
                reason: reason.to_string(),
            },
        )
        .await;
        StepOutcome::Finished {
            reason: reason.to_string(),
            messages,
            last_sequence_number: *sequence_number,
        }
    }

    /// The per-step reminder message injected while a forced skill is in
    /// effect (spec.md §4.10 "Forced-skill tool filtering"); `None` when
    /// no skill is forced.
    fn forced_skill_reminder(&self, allowed: &[&ToolDefinition]) -> Option<String> {
        let name = self.forced_skill_name.as_ref()?;
        let mut names: Vec<&str> = allowed.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        let tools_clause = if names.is_empty() {
            String::new()
        } else {
            format!(" Use ONLY these tools: {}.", names.join(", "))
        };
        Some(format!(
            "[SKILL REMINDER] You are executing forced skill \"/{name}\". \
Follow the skill instructions from the system prompt precisely.{tools_clause}"
        ))
    }

    async fn dispatch(
        &self,
        def: &ToolDefinition,
        tool_call_id: &str,
        args: Value,
        sequence_number: u64,
    ) -> Dispatch {
        match &def.kind {
            ToolKind::External(tool) => match tool.execute(args).await {
                Ok(result) => Dispatch::Resolved {
                    result,
                    ui_metadata: None,
                    next_sequence: sequence_number,
                },
                Err(error) => Dispatch::Failed {
                    error,
                    next_sequence: sequence_number,
                },
            },
            ToolKind::McpUi {
                tool,
                resource_uri,
                app_id,
            } => match tool.execute(args).await {
                Ok(result) => {
                    let resolved_uri = match resource_uri.clone() {
                        Some(uri) => Some(uri),
                        None => self.lookup_resource_uri(app_id.as_deref()).await,
                    };
                    let mut next_sequence = sequence_number;
                    let ui_metadata = resolved_uri.map(|uri| {
                        next_sequence += 1;
                        serde_json::json!({ "resource_uri": uri })
                    });
                    if let Some(meta) = &ui_metadata {
                        if let Some(uri) = meta.get("resource_uri").and_then(|v| v.as_str()) {
                            self.emit(
                                next_sequence,
                                SessionEventKind::McpAppResult {
                                    tool_call_id: tool_call_id.to_string(),
                                    resource_uri: uri.to_string(),
                                },
                            )
                            .await;
                        }
                    }
                    Dispatch::Resolved {
                        result,
                        ui_metadata,
                        next_sequence,
                    }
                }
                Err(error) => Dispatch::Failed {
                    error,
                    next_sequence: sequence_number,
                },
            },
            ToolKind::Memory(operation) => self.dispatch_memory(*operation, args, sequence_number).await,
            ToolKind::Hitl(hitl_type) => self.dispatch_hitl(*hitl_type, &def.name, args, sequence_number).await,
        }
    }

    async fn dispatch_memory(&self, operation: MemoryOperation, args: Value, sequence_number: u64) -> Dispatch {
        let Some(memory) = &self.memory else {
            return Dispatch::Failed {
                error: "memory backend not configured".to_string(),
                next_sequence: sequence_number,
            };
        };
        let result = match operation {
            MemoryOperation::AddEpisode => memory.add_episode(args).await,
            MemoryOperation::Search => memory.search(args).await,
            MemoryOperation::RemoveEpisode => memory.remove_episode(args).await,
        };
        match result {
            Ok(result) => Dispatch::Resolved {
                result,
                ui_metadata: None,
                next_sequence: sequence_number,
            },
            Err(error) => Dispatch::Failed {
                error,
                next_sequence: sequence_number,
            },
        }
    }

    async fn lookup_resource_uri(&self, app_id: Option<&str>) -> Option<String> {
        let app_id = app_id?;
        let metadata = self.relational.get_metadata("mcp_ui", app_id).await.ok()??;
        metadata
            .get("resource_uri")
            .or_else(|| metadata.get("resourceUri"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    async fn dispatch_hitl(
        &self,
        hitl_type: HitlType,
        tool_name: &str,
        args: Value,
        sequence_number: u64,
    ) -> Dispatch {
        let outcome = match hitl_type {
            HitlType::Clarification => {
                let a: ClarificationArgs = serde_json::from_value(args).unwrap_or_default();
                self.hitl
                    .ask_clarification(
                        a.question,
                        a.clarification_type,
                        a.options,
                        a.allow_custom,
                        a.default_value,
                        a.context,
                        Some(tool_name.to_string()),
                        a.timeout_secs,
                        sequence_number + 1,
                    )
                    .await
                    .map(|o| map_resolved(o, |answer| serde_json::json!({ "answer": answer })))
            }
            HitlType::Decision => {
                let a: DecisionArgs = serde_json::from_value(args).unwrap_or_default();
                self.hitl
                    .ask_decision(
                        a.question,
                        a.decision_type,
                        a.options,
                        a.allow_custom,
                        a.default_option,
                        a.context,
                        Some(tool_name.to_string()),
                        a.timeout_secs,
                        sequence_number + 1,
                    )
                    .await
                    .map(|o| map_resolved(o, |decision| serde_json::json!({ "decision": decision })))
            }
            HitlType::EnvVar => {
                let a: EnvVarArgs = serde_json::from_value(args).unwrap_or_default();
                self.hitl
                    .ask_env_var(
                        tool_name.to_string(),
                        a.fields,
                        a.message,
                        a.allow_save,
                        a.timeout_secs,
                        sequence_number + 1,
                    )
                    .await
                    .map(|o| map_resolved(o, |values| serde_json::json!({ "values": values })))
            }
            HitlType::Permission => {
                let a: PermissionArgs = serde_json::from_value(args).unwrap_or_default();
                self.hitl
                    .ask_permission(
                        tool_name.to_string(),
                        a.action,
                        a.risk_level,
                        a.description,
                        a.details,
                        a.allow_remember,
                        a.timeout_secs,
                        sequence_number + 1,
                    )
                    .await
                    .map(|o| {
                        map_resolved(o, |p| {
                            serde_json::json!({ "approved": p.approved, "remember": p.remember })
                        })
                    })
            }
        };

        match outcome {
            // A preinjected answer resolves without the handler ever
            // calling `events.publish` (spec.md §4.9) — no sequence
            // number was actually consumed, so the count doesn't move.
            Ok(HitlOutcome::Resolved(value)) => Dispatch::Resolved {
                result: value,
                ui_metadata: None,
                next_sequence: sequence_number,
            },
            // A freshly raised request consumed `sequence_number + 1` for
            // its `*Asked` event; the suspension carries that forward so
            // `last_sequence_number` matches what was actually emitted.
            Ok(HitlOutcome::Pending(info)) => Dispatch::Suspend {
                info,
                next_sequence: sequence_number + 1,
            },
            Err(e) => Dispatch::Failed {
                error: e.to_string(),
                next_sequence: sequence_number,
            },
        }
    }
}

/// The tool calls the last assistant message raised that have no
/// matching `Tool`-role message yet — what a resumed turn must resolve
/// before the model is asked for anything new (spec.md §4.10).
fn pending_tool_calls(messages: &[ChatMessage]) -> Vec<ToolCallDescriptor> {
    let Some((idx, last_assistant)) = messages
        .iter()
        .enumerate()
        .rev()
        .find(|(_, m)| m.role == MessageRole::Assistant)
    else {
        return Vec::new();
    };
    if last_assistant.tool_calls.is_empty() {
        return Vec::new();
    }
    let answered: HashSet<&str> = messages[idx + 1..]
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    last_assistant
        .tool_calls
        .iter()
        .filter(|tc| !answered.contains(tc.tool_call_id.as_str()))
        .cloned()
        .collect()
}

fn map_resolved<T>(outcome: HitlOutcome<T>, to_value: impl FnOnce(T) -> Value) -> HitlOutcome<Value> {
    match outcome {
        HitlOutcome::Resolved(v) => HitlOutcome::Resolved(to_value(v)),
        HitlOutcome::Pending(info) => HitlOutcome::Pending(info),
    }
}

enum BatchOutcome {
    Suspended(StepOutcome),
    Continue { any_success: bool },
}

enum Dispatch {
    Resolved {
        result: Value,
        ui_metadata: Option<Value>,
        next_sequence: u64,
    },
    Failed {
        error: String,
        next_sequence: u64,
    },
    Suspend {
        info: memstack_hitl::HitlPendingInfo,
        next_sequence: u64,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClarificationArgs {
    question: String,
    clarification_type: String,
    options: Vec<ClarificationOption>,
    allow_custom: bool,
    default_value: Option<String>,
    context: Option<Value>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DecisionArgs {
    question: String,
    decision_type: String,
    options: Vec<DecisionOption>,
    allow_custom: bool,
    default_option: Option<String>,
    context: Option<Value>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EnvVarArgs {
    fields: Vec<EnvVarField>,
    message: Option<String>,
    allow_save: bool,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PermissionArgs {
    action: String,
    risk_level: String,
    description: Option<String>,
    details: Option<Value>,
    allow_remember: bool,
    timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{TaskItem, TaskStatus, ToolDefinition};
    use async_trait::async_trait;
    use memstack_core::model::{HitlResponse, HitlResponsePayload};
    use memstack_core::test_support::{FakeClock, FakeEventBus, FakeRelationalStore};
    use memstack_hitl::PreinjectedAnswer;
    use tokio::sync::Mutex as TokioMutex;

    use crate::model::{ModelError, ModelResponse, ResponsePart, ToolUseRequest};

    /// A task list that's already all-done, so goal-completion evaluation
    /// resolves from the task-list path without another model call.
    struct DoneTaskList;

    #[async_trait]
    impl TaskListSource for DoneTaskList {
        async fn list(&self) -> Result<Vec<TaskItem>, String> {
            Ok(vec![TaskItem {
                id: "task-1".into(),
                status: TaskStatus::Completed,
            }])
        }
    }

    struct ScriptedModel {
        responses: TokioMutex<std::collections::VecDeque<ModelResponse>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<ModelResponse>) -> Self {
            Self {
                responses: TokioMutex::new(responses.into_iter().collect()),
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

    fn clarification_tool() -> ToolDefinition {
        ToolDefinition::hitl(
            "ask_user",
            "ask the user a clarifying question",
            serde_json::json!({}),
            HitlType::Clarification,
        )
    }

    fn new_handler(
        relational: Arc<dyn RelationalStore>,
        events: Arc<dyn EventBus>,
        preinjected: Option<PreinjectedAnswer>,
    ) -> HitlHandler {
        HitlHandler::new(
            "conv-1",
            Scoping::new("tenant-1", "project-1"),
            None,
            300,
            relational,
            events,
            Arc::new(FakeClock::new(chrono::Utc::now())),
            preinjected,
        )
    }

    #[tokio::test]
    async fn suspends_on_hitl_then_resumes_with_preinjected_answer() {
        let relational = Arc::new(FakeRelationalStore::new());
        let events = Arc::new(FakeEventBus::new());

        let first = ModelResponse {
            parts: vec![ResponsePart::ToolUse(ToolUseRequest {
                id: "call-1".into(),
                name: "ask_user".into(),
                input: serde_json::json!({"question": "which file?"}),
            })],
            stop_reason: StopReason::ToolUse,
        };
        let model = Arc::new(ScriptedModel::new(vec![first]));

        let processor = SessionProcessor::new(
            model.clone(),
            "test-model",
            vec![clarification_tool()],
            None,
            Some(Arc::new(DoneTaskList) as Arc<dyn TaskListSource>),
            relational.clone(),
            events.clone(),
            new_handler(relational.clone(), events.clone(), None),
            "conv-1",
            Scoping::new("tenant-1", "project-1"),
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
            StepOutcome::Finished { .. } => panic!("expected suspension"),
        };
        assert_eq!(pending.pending_tool_call_id, "call-1");
        assert!(pending.info.request_id.starts_with("clar_"));
        assert_eq!(events.events().len(), 2); // Act + ClarificationAsked

        let response = HitlResponse {
            request_id: pending.info.request_id.clone(),
            payload: HitlResponsePayload::Clarification {
                answer: "A".into(),
            },
            user_id: None,
            timestamp: chrono::Utc::now(),
        };
        let resumed = SessionProcessor::new(
            model,
            "test-model",
            vec![clarification_tool()],
            None,
            Some(Arc::new(DoneTaskList) as Arc<dyn TaskListSource>),
            relational.clone(),
            events.clone(),
            new_handler(
                relational,
                events.clone(),
                Some(PreinjectedAnswer::Answered(response)),
            ),
            "conv-1",
            Scoping::new("tenant-1", "project-1"),
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
                reason,
                messages,
                last_sequence_number,
            } => {
                assert_eq!(reason, "goal_achieved");
                // Sequence continues from where suspension left off, not
                // from zero (spec.md §8 "Sequence continuity").
                assert!(last_sequence_number > pending.last_sequence_number);
                let tool_result = messages
                    .iter()
                    .find(|m| m.role == MessageRole::Tool)
                    .expect("tool result message present");
                assert!(tool_result.content.contains('A'));
            }
            StepOutcome::Suspended(_) => panic!("expected the resumed turn to finish"),
        }
        // Resume only re-raises Act + Observe + Finish — no second
        // *Asked* event, since the answer resolved from preinjection.
        assert_eq!(events.events().len(), 5);
    }
}
