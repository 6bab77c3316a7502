#![deny(missing_docs)]
#![allow(clippy::needless_lifetimes)]
//! Two-phase commit coordinator across the SQL, graph, and cache stores
//! (spec.md §4.2).
//!
//! Grounded on `neuron-orch-local`'s dispatch pattern and the teacher's
//! `Effect`-deferred write model: a scope populates a [`TxHandle`] with
//! queued operations instead of running them inline, and the coordinator
//! commits the queue in the fixed SQL → graph → cache order at the end of
//! the scope.

mod coordinator;
mod handle;
mod stats;

pub use coordinator::{TxCoordinator, TxOutcome};
pub use handle::TxHandle;
pub use stats::TxStats;
