//! Transaction statistics (spec.md §4.2 "Statistics").

use memstack_core::error::TxError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Counters {
    total: AtomicU64,
    committed: AtomicU64,
    failed: AtomicU64,
    rollback_count: AtomicU64,
    inconsistency_count: AtomicU64,
    reconciled_count: AtomicU64,
}

/// A snapshot of [`crate::TxCoordinator`]'s running counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxStats {
    /// Total transactions attempted.
    pub total: u64,
    /// Transactions that committed all three stores, or committed SQL+graph
    /// with a swallowed cache failure.
    pub committed: u64,
    /// Transactions that failed entirely (SQL failure) or surfaced a graph
    /// error after SQL committed.
    pub failed: u64,
    /// Transactions rolled back due to a SQL failure.
    pub rollback_count: u64,
    /// Transactions that produced a compensating-transaction record.
    pub inconsistency_count: u64,
    /// Compensating-transaction records successfully reconciled.
    pub reconciled_count: u64,
}

/// The live, shareable counter holder [`crate::TxCoordinator`] updates.
#[derive(Clone, Default)]
pub(crate) struct LiveStats(Arc<Counters>);

impl LiveStats {
    pub(crate) fn record_outcome(&self, result: &Result<crate::TxOutcome, TxError>) {
        self.0.total.fetch_add(1, Ordering::Relaxed);
        match result {
            Ok(_) => {
                self.0.committed.fetch_add(1, Ordering::Relaxed);
            }
            Err(TxError::SqlFailed(_)) => {
                self.0.failed.fetch_add(1, Ordering::Relaxed);
            }
            Err(TxError::GraphFailed(_)) => {
                self.0.failed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.0.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn record_timeout(&self) {
        self.0.total.fetch_add(1, Ordering::Relaxed);
        self.0.failed.fetch_add(1, Ordering::Relaxed);
        self.0.rollback_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.0.rollback_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_inconsistency(&self) {
        self.0.inconsistency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconciled(&self) {
        self.0.reconciled_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> TxStats {
        TxStats {
            total: self.0.total.load(Ordering::Relaxed),
            committed: self.0.committed.load(Ordering::Relaxed),
            failed: self.0.failed.load(Ordering::Relaxed),
            rollback_count: self.0.rollback_count.load(Ordering::Relaxed),
            inconsistency_count: self.0.inconsistency_count.load(Ordering::Relaxed),
            reconciled_count: self.0.reconciled_count.load(Ordering::Relaxed),
        }
    }
}
