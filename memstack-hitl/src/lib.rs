#![deny(missing_docs)]
//! Human-in-the-Loop suspension primitive (spec.md §4.8, §4.9).
//!
//! Two collaborators live here:
//!
//! - [`HitlRegistry`] — a process-local waiter map, keyed by request id
//!   and indexed by conversation, for callers that want to block an
//!   in-process task on a human answer without a full session suspend.
//!   Grounded on `neuron-hooks::HookRegistry`'s ordered-dispatch shape,
//!   generalized to a keyed map of one-shot waiters.
//! - [`HitlHandler`] — the actual suspension primitive a
//!   [`memstack_core::traits::queue`]-style tool dispatcher calls on
//!   every HITL tool invocation. It is the thing that decides, per call,
//!   whether a pre-injected answer resolves the call immediately or a
//!   fresh request must be raised and the turn suspended. Grounded on
//!   `neuron-secret::SecretValue`'s peek/consume discipline, generalized
//!   from "one secret" to "one pending answer per HITL type".

mod handler;
mod registry;

pub use handler::{HitlHandler, HitlOutcome, HitlPendingInfo, PermissionOutcome, PreinjectedAnswer};
pub use registry::{HitlRegistryStats, HitlRegistry, WaiterInfo};
