//! Low-overhead concurrent query counters.
//!
//! Every counter is an independent `AtomicU64`. `load` is consistent only
//! per field — a snapshot across all six fields is not an atomic cut, and
//! callers (including tests) must not assert cross-counter invariants.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Identifies one of the six tracked counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    PrimaryReads,
    PrimaryWrites,
    ReplicaReads,
    PrimaryFallbacks,
    ReplicaFailures,
    TotalQueries,
}

/// Bundle of atomic counters exposing per-target query counts.
#[derive(Default)]
pub struct Statistics {
    primary_reads: AtomicU64,
    primary_writes: AtomicU64,
    replica_reads: AtomicU64,
    primary_fallbacks: AtomicU64,
    replica_failures: AtomicU64,
    total_queries: AtomicU64,
}

/// Point-in-time snapshot of all six counters, for `health_check` and
/// periodic gauge publication. Not an atomic cut across fields.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub primary_reads: u64,
    pub primary_writes: u64,
    pub replica_reads: u64,
    pub primary_fallbacks: u64,
    pub replica_failures: u64,
    pub total_queries: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    fn field(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::PrimaryReads => &self.primary_reads,
            Counter::PrimaryWrites => &self.primary_writes,
            Counter::ReplicaReads => &self.replica_reads,
            Counter::PrimaryFallbacks => &self.primary_fallbacks,
            Counter::ReplicaFailures => &self.replica_failures,
            Counter::TotalQueries => &self.total_queries,
        }
    }

    /// Atomically increment a counter by 1.
    pub fn add(&self, counter: Counter) {
        self.field(counter).fetch_add(1, Ordering::Relaxed);
    }

    /// Atomically read a counter's current value.
    pub fn load(&self, counter: Counter) -> u64 {
        self.field(counter).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            primary_reads: self.load(Counter::PrimaryReads),
            primary_writes: self.load(Counter::PrimaryWrites),
            replica_reads: self.load(Counter::ReplicaReads),
            primary_fallbacks: self.load(Counter::PrimaryFallbacks),
            replica_failures: self.load(Counter::ReplicaFailures),
            total_queries: self.load(Counter::TotalQueries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let stats = Statistics::new();
        let snap = stats.snapshot();
        assert_eq!(snap.total_queries, 0);
        assert_eq!(snap.primary_reads, 0);
    }

    #[test]
    fn add_increments_only_the_targeted_counter() {
        let stats = Statistics::new();
        stats.add(Counter::ReplicaReads);
        assert_eq!(stats.load(Counter::ReplicaReads), 1);
        assert_eq!(stats.load(Counter::PrimaryReads), 0);
        assert_eq!(stats.load(Counter::PrimaryWrites), 0);
    }

    #[test]
    fn total_queries_equals_n_after_n_adds() {
        let stats = Statistics::new();
        for _ in 0..7 {
            stats.add(Counter::TotalQueries);
        }
        assert_eq!(stats.load(Counter::TotalQueries), 7);
    }

    #[test]
    fn concurrent_adds_are_not_lost() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(Statistics::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stats = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    stats.add(Counter::TotalQueries);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.load(Counter::TotalQueries), 800);
    }
}
