//! [`StepOutcome`] — how one session run ends: suspended on a HITL
//! request, or finished (spec.md §7: HITL-pending is a suspension
//! signal, never an ordinary error; it is structurally impossible for a
//! `?`-based handler to swallow it because it never lives inside
//! `Result::Err`).

use memstack_core::model::ChatMessage;
use memstack_hitl::HitlPendingInfo;

/// Everything the driver needs to persist a `ProcessorState` and resume
/// later (spec.md §4.10 "Suspension & resume").
#[derive(Debug, Clone)]
pub struct HitlPending {
    /// The newly raised (or, on a pre-injected cancel/timeout, the moot)
    /// request.
    pub info: HitlPendingInfo,
    /// The message list at the moment of suspension, including the
    /// assistant message that requested the tool call.
    pub messages: Vec<ChatMessage>,
    /// The tool-call id the suspension is waiting on.
    pub pending_tool_call_id: String,
    /// Last event sequence number emitted before suspending.
    pub last_sequence_number: u64,
    /// Step count at the point of suspension.
    pub step_count: u32,
}

/// How one `SessionProcessor::run` call ended.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// The turn suspended on a HITL request; persist `ProcessorState`
    /// from the fields here and resume later.
    Suspended(HitlPending),
    /// The turn finished without suspending (goal achieved, bounded by
    /// `max_steps`, or ended in error).
    Finished {
        /// Free-text reason (mirrors the `finish` event's `reason`).
        reason: String,
        /// The final message list.
        messages: Vec<ChatMessage>,
        /// Last event sequence number emitted.
        last_sequence_number: u64,
    },
}
