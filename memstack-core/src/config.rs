//! Session-processor configuration (spec.md §6 "Configuration options").
//!
//! Mirrors the teacher's split between `ReactConfig` (static, per-operator)
//! and `TurnConfig` (per-call override): [`MemstackConfig`] is the static
//! half; per-call overrides live alongside the session input in
//! `memstack-session`.

use serde::{Deserialize, Serialize};

/// Static configuration accepted by the session processor and the
/// substrate components it depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemstackConfig {
    /// Model identifier passed to the LLM provider.
    pub model: String,
    /// Maximum tool-calling steps before the turn ends.
    pub max_steps: u32,
    /// Consecutive no-progress steps before a goal-completion check runs.
    pub max_no_progress_steps: u32,
    /// Name of a caller-selected forced skill, if any.
    pub forced_skill_name: Option<String>,
    /// Tool names the forced skill restricts execution to (`None` means
    /// unrestricted).
    pub forced_skill_tools: Option<std::collections::HashSet<String>>,
    /// RRF fusion constant.
    pub rrf_k: u32,
    /// RRF weight given to the vector sub-search.
    pub vector_weight: f64,
    /// RRF weight given to the keyword sub-search.
    pub keyword_weight: f64,
    /// Whether MMR diversity re-ranking is enabled.
    pub mmr_enabled: bool,
    /// MMR relevance/diversity trade-off parameter.
    pub mmr_lambda: f64,
    /// Whether temporal-decay re-ranking is enabled.
    pub temporal_decay_enabled: bool,
    /// Half-life, in days, for temporal decay.
    pub temporal_half_life_days: f64,
    /// Whether query expansion (stopword removal, lemmatization) runs
    /// before fulltext search.
    pub query_expansion_enabled: bool,
    /// Duration, in milliseconds, above which a query is logged/counted
    /// as slow.
    pub slow_query_threshold_ms: u64,
    /// Consecutive-failure threshold before a circuit breaker opens.
    pub circuit_failure_threshold: u32,
    /// Consecutive-success threshold before a half-open breaker closes.
    pub circuit_success_threshold: u32,
    /// Seconds an open circuit stays open before trying half-open.
    pub circuit_timeout_seconds: u64,
}

impl Default for MemstackConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_steps: 20,
            max_no_progress_steps: 3,
            forced_skill_name: None,
            forced_skill_tools: None,
            rrf_k: 60,
            vector_weight: 0.6,
            keyword_weight: 0.4,
            mmr_enabled: false,
            mmr_lambda: 0.7,
            temporal_decay_enabled: false,
            temporal_half_life_days: 30.0,
            query_expansion_enabled: false,
            slow_query_threshold_ms: 100,
            circuit_failure_threshold: 5,
            circuit_success_threshold: 2,
            circuit_timeout_seconds: 60,
        }
    }
}
