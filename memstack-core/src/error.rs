//! Error taxonomy for MemStack.
//!
//! One enum per protocol concern, following `layer0::error`'s shape: every
//! enum is `#[non_exhaustive]`, carries a catch-all `Other` arm, and never
//! mixes "this is a bug" with "this is an expected outcome." Notably absent
//! here: a `HitlPending` variant anywhere. HITL suspension is not an error
//! (spec.md §7) — it is `memstack_session::StepOutcome::Suspended`, which
//! cannot be accidentally caught by a `?`-based error handler.

use thiserror::Error;

/// Errors from the data-access substrate (retry, circuit breaker, query
/// monitor, health checks, cached-repository mixin).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SubstrateError {
    /// All retry attempts were exhausted.
    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// Number of attempts made (including the first).
        attempts: u32,
        /// Stringified cause of the final attempt.
        last_error: String,
    },

    /// The circuit breaker for this dependency is open.
    #[error("circuit '{breaker}' is open, retry after {retry_after_secs}s")]
    CircuitOpen {
        /// Name of the circuit breaker.
        breaker: String,
        /// Seconds until the breaker may transition to half-open.
        retry_after_secs: f64,
    },

    /// An operation exceeded its deadline.
    #[error("operation '{operation}' timed out after {elapsed_ms}ms")]
    Timeout {
        /// Name of the operation that timed out.
        operation: String,
        /// Elapsed time before the timeout fired.
        elapsed_ms: u64,
    },

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the graph store.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GraphError {
    /// A label, relationship type, or property key failed identifier
    /// validation (`^[A-Za-z_][A-Za-z0-9_]*$`).
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The requested node/edge was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A per-call deadline expired.
    #[error("graph operation timed out after {0}ms")]
    Timeout(u64),

    /// Underlying driver/transport error.
    #[error("backend error: {0}")]
    Backend(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the distributed-transaction coordinator.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TxError {
    /// SQL (the authoritative store) failed to commit; nothing else was
    /// attempted, and no compensating record is written.
    #[error("sql commit failed: {0}")]
    SqlFailed(String),

    /// SQL committed but graph did not. A compensating record was written;
    /// this error still surfaces to the caller.
    #[error("graph commit failed after sql commit: {0}")]
    GraphFailed(String),

    /// The transaction scope exceeded its deadline; full rollback ran.
    #[error("transaction timed out after {0}ms")]
    Timeout(u64),

    /// `reconcile` was called for an id with no pending compensating
    /// record.
    #[error("no pending compensating transaction: {0}")]
    NoSuchCompensation(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from envelope encryption of secret fields.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed (bad key, tampered ciphertext, wrong nonce length).
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The key material was malformed.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Errors from the extraction pipeline.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The LLM call itself failed.
    #[error("llm call failed: {0}")]
    Llm(String),

    /// The model's JSON output could not be parsed into the expected shape.
    /// Non-fatal in most call sites (entities/edges are dropped instead),
    /// surfaced here for callers that want to log it.
    #[error("unparseable model output: {0}")]
    UnparseableOutput(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the search engine. Individual sub-search failures are
/// swallowed internally (spec.md §4.5); this enum is for whole-pipeline
/// failures (e.g. embedder unavailable for every sub-search).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SearchError {
    /// Every sub-search failed; there is nothing to fuse.
    #[error("all sub-searches failed")]
    AllSubsearchesFailed,

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from community detection.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CommunityError {
    /// The accelerated (GDS) path failed; caller may fall back to native.
    #[error("accelerated detection failed: {0}")]
    AcceleratedFailed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from episode ingestion.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum IngestError {
    /// The episode could not be persisted.
    #[error("episode persistence failed: {0}")]
    PersistFailed(String),

    /// Enqueuing the async processing task failed.
    #[error("enqueue failed: {0}")]
    EnqueueFailed(String),

    /// Extraction failed during `process_episode`.
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the HITL registry/handler. Timeouts and cancellations are
/// NOT represented here — they are observable outcomes (a default
/// response, an event), not failures.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HitlError {
    /// No waiter is registered for this request id.
    #[error("no waiter registered for {0}")]
    NoSuchWaiter(String),

    /// The request could not be persisted to the relational store.
    #[error("persistence failed: {0}")]
    PersistFailed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the session processor that are genuinely exceptional
/// (not HITL suspension, not a caught tool error — those become `Observe`
/// events and the loop continues).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SessionError {
    /// The model stream itself failed.
    #[error("model error: {0}")]
    Model(String),

    /// Context assembly failed before the model could be called.
    #[error("context assembly failed: {0}")]
    ContextAssembly(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
