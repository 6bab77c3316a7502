//! Query performance monitoring, ported from `query_monitor.py`'s
//! `QueryMonitor`/`QueryStats`/`QueryMonitorRegistry`. Tracks execution
//! count, duration percentiles, and slow-query history per named
//! monitor (one per store: `"postgres"`, `"neo4j"`, `"redis"`).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Tuning knobs for one query monitor.
#[derive(Debug, Clone, Copy)]
pub struct QueryMonitorConfig {
    /// Duration above which a query counts as slow.
    pub slow_query_threshold_ms: u64,
    /// Maximum number of entries kept in `query_history`.
    pub max_query_history: usize,
}

impl Default for QueryMonitorConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold_ms: 100,
            max_query_history: 1000,
        }
    }
}

/// One recorded query execution.
#[derive(Debug, Clone)]
pub struct QueryInfo {
    /// Truncated/normalized label for the query (e.g. operation name).
    pub label: String,
    /// How long the query took.
    pub duration_ms: f64,
    /// Whether the query failed.
    pub failed: bool,
}

impl QueryInfo {
    /// Whether this execution exceeded `threshold_ms`.
    pub fn is_slow(&self, threshold_ms: u64) -> bool {
        self.duration_ms >= threshold_ms as f64
    }
}

/// Running aggregate statistics over every recorded execution.
#[derive(Debug, Default, Clone)]
pub struct QueryStats {
    total_queries: u64,
    slow_queries: u64,
    failed_queries: u64,
    total_duration_ms: f64,
    min_duration_ms: f64,
    max_duration_ms: f64,
    durations: Vec<f64>,
    threshold_ms: u64,
}

impl QueryStats {
    fn new(threshold_ms: u64) -> Self {
        Self {
            min_duration_ms: f64::INFINITY,
            threshold_ms,
            ..Default::default()
        }
    }

    fn record(&mut self, duration_ms: f64, failed: bool) {
        self.total_queries += 1;
        self.total_duration_ms += duration_ms;
        self.min_duration_ms = self.min_duration_ms.min(duration_ms);
        self.max_duration_ms = self.max_duration_ms.max(duration_ms);
        self.durations.push(duration_ms);
        if duration_ms >= self.threshold_ms as f64 {
            self.slow_queries += 1;
        }
        if failed {
            self.failed_queries += 1;
        }
    }

    /// Total number of recorded executions.
    pub fn total_queries(&self) -> u64 {
        self.total_queries
    }

    /// Number of executions that exceeded the slow-query threshold.
    pub fn slow_queries(&self) -> u64 {
        self.slow_queries
    }

    /// Number of executions that failed.
    pub fn failed_queries(&self) -> u64 {
        self.failed_queries
    }

    /// Mean duration across every recorded execution.
    pub fn avg_duration_ms(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            self.total_duration_ms / self.total_queries as f64
        }
    }

    /// Shortest recorded duration, or `0.0` if nothing has been recorded.
    pub fn min_duration_ms(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            self.min_duration_ms
        }
    }

    /// Longest recorded duration, or `0.0` if nothing has been recorded.
    pub fn max_duration_ms(&self) -> f64 {
        self.max_duration_ms
    }

    /// Percentage (0-100) of recorded executions that were slow.
    pub fn slow_query_percentage(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            (self.slow_queries as f64 / self.total_queries as f64) * 100.0
        }
    }

    /// The `p`th percentile duration (0-100), using nearest-rank.
    pub fn percentile(&self, p: u32) -> f64 {
        if self.durations.is_empty() {
            return 0.0;
        }
        let mut sorted = self.durations.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).expect("duration is never NaN"));
        let index = (sorted.len() * p as usize / 100).min(sorted.len() - 1);
        sorted[index]
    }
}

/// Combined view over a monitor's statistics, slow-query history, and
/// per-label frequency — the shape a dashboard renders in one call
/// (spec.md §4.1 "a combined dashboard view").
#[derive(Debug, Clone)]
pub struct QueryDashboard {
    /// Monitor name.
    pub name: String,
    /// Aggregate statistics.
    pub stats: QueryStats,
    /// Slowest recorded executions, descending by duration.
    pub slowest: Vec<QueryInfo>,
    /// Most frequently recorded labels, descending by count.
    pub most_frequent: Vec<(String, u64)>,
}

/// Tracks query executions for one named dependency (e.g. `"postgres"`).
pub struct QueryMonitor {
    name: String,
    config: QueryMonitorConfig,
    stats: Mutex<QueryStats>,
    history: Mutex<Vec<QueryInfo>>,
    query_counts: Mutex<HashMap<String, u64>>,
}

impl QueryMonitor {
    /// Create a new monitor named `name`.
    pub fn new(name: impl Into<String>, config: QueryMonitorConfig) -> Self {
        Self {
            name: name.into(),
            stats: Mutex::new(QueryStats::new(config.slow_query_threshold_ms)),
            config,
            history: Mutex::new(Vec::new()),
            query_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Monitor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record one execution. Logs a warning if it was slow.
    pub fn record(&self, label: impl Into<String>, duration: Duration, failed: bool) {
        let duration_ms = duration.as_secs_f64() * 1000.0;
        let info = QueryInfo {
            label: label.into(),
            duration_ms,
            failed,
        };

        if info.is_slow(self.config.slow_query_threshold_ms) {
            tracing::warn!(
                monitor = %self.name,
                duration_ms,
                label = %info.label,
                "slow query"
            );
        }

        self.stats.lock().expect("lock poisoned").record(duration_ms, failed);

        *self
            .query_counts
            .lock()
            .expect("lock poisoned")
            .entry(info.label.clone())
            .or_insert(0) += 1;

        let mut history = self.history.lock().expect("lock poisoned");
        history.push(info);
        if history.len() > self.config.max_query_history {
            let overflow = history.len() - self.config.max_query_history;
            history.drain(0..overflow);
        }
    }

    /// Snapshot of current aggregate statistics.
    pub fn stats(&self) -> QueryStats {
        self.stats.lock().expect("lock poisoned").clone()
    }

    /// The `limit` slowest recorded executions, descending by duration.
    pub fn slowest(&self, limit: usize) -> Vec<QueryInfo> {
        let mut history = self.history.lock().expect("lock poisoned").clone();
        history.sort_by(|a, b| b.duration_ms.partial_cmp(&a.duration_ms).expect("duration is never NaN"));
        history.truncate(limit);
        history
    }

    /// The `limit` most frequently recorded labels, descending by count.
    pub fn most_frequent(&self, limit: usize) -> Vec<(String, u64)> {
        let counts = self.query_counts.lock().expect("lock poisoned");
        let mut entries: Vec<(String, u64)> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(limit);
        entries
    }

    /// Combined statistics + slowest-N + most-frequent-N view (spec.md
    /// §4.1 "a combined dashboard view"). Both sub-lists are capped at
    /// `limit`.
    pub fn dashboard(&self, limit: usize) -> QueryDashboard {
        QueryDashboard {
            name: self.name.clone(),
            stats: self.stats(),
            slowest: self.slowest(limit),
            most_frequent: self.most_frequent(limit),
        }
    }
}

/// A keyed collection of query monitors, one per named dependency.
#[derive(Default)]
pub struct QueryMonitorRegistry {
    monitors: Mutex<HashMap<String, std::sync::Arc<QueryMonitor>>>,
}

impl QueryMonitorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the monitor for `name`, creating it with `config` if absent.
    pub fn get_or_create(
        &self,
        name: &str,
        config: QueryMonitorConfig,
    ) -> std::sync::Arc<QueryMonitor> {
        let mut monitors = self.monitors.lock().expect("lock poisoned");
        monitors
            .entry(name.to_owned())
            .or_insert_with(|| std::sync::Arc::new(QueryMonitor::new(name, config)))
            .clone()
    }

    /// Fetch the monitor for `name`, if it exists.
    pub fn get(&self, name: &str) -> Option<std::sync::Arc<QueryMonitor>> {
        self.monitors.lock().expect("lock poisoned").get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_slow_queries_and_percentiles() {
        let monitor = QueryMonitor::new(
            "test",
            QueryMonitorConfig {
                slow_query_threshold_ms: 50,
                max_query_history: 10,
            },
        );
        for ms in [10, 20, 30, 200] {
            monitor.record("op", Duration::from_millis(ms), false);
        }
        let stats = monitor.stats();
        assert_eq!(stats.total_queries(), 4);
        assert_eq!(stats.slow_queries(), 1);
        assert!(stats.avg_duration_ms() > 0.0);
    }

    #[test]
    fn history_is_capped_at_max_size() {
        let monitor = QueryMonitor::new(
            "test",
            QueryMonitorConfig {
                slow_query_threshold_ms: 50,
                max_query_history: 2,
            },
        );
        for _ in 0..5 {
            monitor.record("op", Duration::from_millis(1), false);
        }
        assert_eq!(monitor.slowest(10).len(), 2);
    }

    #[test]
    fn min_max_and_slow_percentage() {
        let monitor = QueryMonitor::new(
            "test",
            QueryMonitorConfig {
                slow_query_threshold_ms: 50,
                max_query_history: 10,
            },
        );
        for ms in [10, 20, 30, 200] {
            monitor.record("op", Duration::from_millis(ms), false);
        }
        let stats = monitor.stats();
        assert_eq!(stats.min_duration_ms(), 10.0);
        assert_eq!(stats.max_duration_ms(), 200.0);
        assert_eq!(stats.slow_query_percentage(), 25.0);
    }

    #[test]
    fn most_frequent_ranks_by_label_count() {
        let monitor = QueryMonitor::new("test", QueryMonitorConfig::default());
        for _ in 0..3 {
            monitor.record("find_node", Duration::from_millis(1), false);
        }
        for _ in 0..1 {
            monitor.record("save_edge", Duration::from_millis(1), false);
        }
        let frequent = monitor.most_frequent(10);
        assert_eq!(frequent[0], ("find_node".to_string(), 3));
        assert_eq!(frequent[1], ("save_edge".to_string(), 1));
    }

    #[test]
    fn dashboard_combines_stats_slowest_and_frequent() {
        let monitor = QueryMonitor::new(
            "test",
            QueryMonitorConfig {
                slow_query_threshold_ms: 50,
                max_query_history: 10,
            },
        );
        monitor.record("find_node", Duration::from_millis(200), false);
        monitor.record("find_node", Duration::from_millis(10), false);

        let dashboard = monitor.dashboard(5);
        assert_eq!(dashboard.name, "test");
        assert_eq!(dashboard.stats.total_queries(), 2);
        assert_eq!(dashboard.slowest[0].duration_ms, 200.0);
        assert_eq!(dashboard.most_frequent[0], ("find_node".to_string(), 2));
    }
}
