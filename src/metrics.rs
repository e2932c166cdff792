//! Per-rule execution metrics for the external metrics/log collaborator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Default)]
struct RuleStats {
    matches: AtomicU64,
    non_matches: AtomicU64,
    failures: AtomicU64,
    executions: AtomicU64,
    execution_time_us: AtomicU64,
}

/// Point-in-time view of one rule's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleMetricsSnapshot {
    pub matches: u64,
    pub non_matches: u64,
    pub failures: u64,
    pub executions: u64,
    pub execution_time_us: u64,
}

/// Match, failure and execution-time counters keyed by rule name. Written by
/// evaluating workers, read concurrently by the metrics collaborator; when
/// disabled every recording call is a no-op.
pub struct EngineMetrics {
    enabled: bool,
    rules: DashMap<String, Arc<RuleStats>>,
}

impl EngineMetrics {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            rules: DashMap::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn stats(&self, rule: &str) -> Option<Arc<RuleStats>> {
        if !self.enabled {
            return None;
        }
        Some(
            self.rules
                .entry(rule.to_string())
                .or_default()
                .value()
                .clone(),
        )
    }

    pub fn mark_match(&self, rule: &str) {
        if let Some(stats) = self.stats(rule) {
            stats.matches.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn mark_non_match(&self, rule: &str) {
        if let Some(stats) = self.stats(rule) {
            stats.non_matches.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn mark_failure(&self, rule: &str) {
        if let Some(stats) = self.stats(rule) {
            stats.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_execution(&self, rule: &str, elapsed: Duration) {
        if let Some(stats) = self.stats(rule) {
            stats.executions.fetch_add(1, Ordering::Relaxed);
            stats
                .execution_time_us
                .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self, rule: &str) -> Option<RuleMetricsSnapshot> {
        self.rules.get(rule).map(|stats| RuleMetricsSnapshot {
            matches: stats.matches.load(Ordering::Relaxed),
            non_matches: stats.non_matches.load(Ordering::Relaxed),
            failures: stats.failures.load(Ordering::Relaxed),
            executions: stats.executions.load(Ordering::Relaxed),
            execution_time_us: stats.execution_time_us.load(Ordering::Relaxed),
        })
    }

    pub fn snapshot_all(&self) -> HashMap<String, RuleMetricsSnapshot> {
        self.rules
            .iter()
            .filter_map(|entry| {
                self.snapshot(entry.key())
                    .map(|snapshot| (entry.key().clone(), snapshot))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = EngineMetrics::new(true);
        metrics.mark_match("r");
        metrics.mark_match("r");
        metrics.mark_non_match("r");
        metrics.mark_failure("r");
        metrics.record_execution("r", Duration::from_micros(250));

        let snapshot = metrics.snapshot("r").unwrap();
        assert_eq!(snapshot.matches, 2);
        assert_eq!(snapshot.non_matches, 1);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.executions, 1);
        assert_eq!(snapshot.execution_time_us, 250);
    }

    #[test]
    fn test_disabled_metrics_record_nothing() {
        let metrics = EngineMetrics::new(false);
        metrics.mark_match("r");
        metrics.record_execution("r", Duration::from_micros(10));

        assert!(metrics.snapshot("r").is_none());
        assert!(metrics.snapshot_all().is_empty());
    }

    #[test]
    fn test_unknown_rule_has_no_snapshot() {
        let metrics = EngineMetrics::new(true);
        assert!(metrics.snapshot("never seen").is_none());
    }
}
