#![deny(missing_docs)]
//! # memstack-session — tool-calling session processor with HITL suspend/resume
//!
//! Drives one agent turn: assemble context, call the model, dispatch any
//! tool calls it requests, and loop until the goal is achieved, the turn
//! is bounded out, or a Human-in-the-Loop tool suspends the turn
//! (spec.md §4.10, §7, §9).
//!
//! HITL suspension is the one hard invariant this crate exists to
//! enforce: it is a [`StepOutcome::Suspended`] return value, never an
//! `Err`, so a caller using `?` on [`SessionProcessor::run`] cannot
//! accidentally swallow it — the only way to observe a suspension is to
//! match on the outcome.

mod goal;
mod model;
mod outcome;
mod processor;
mod tool;

pub use goal::{evaluate_goal_completion, GoalCheckResult, GoalCheckSource};
pub use model::{
    ModelError, ModelRequest, ModelResponse, ResponsePart, SessionModel, StopReason, ToolSchema,
    ToolUseRequest,
};
pub use outcome::{HitlPending, StepOutcome};
pub use processor::SessionProcessor;
pub use tool::{
    restrict_for_forced_skill, ExternalTool, MemoryBackend, MemoryOperation, TaskItem,
    TaskListSource, TaskStatus, ToolDefinition, ToolKind, ESSENTIAL_TOOL_NAMES,
    SKILL_LOADER_TOOL_NAME,
};
