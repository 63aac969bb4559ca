//! Planning metrics
//!
//! Lock-free counters and bucketed histograms updated by the planner, with a
//! serializable snapshot for export.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Histogram over integer observations
#[derive(Debug)]
pub struct Histogram {
    /// Inclusive upper bound of each bucket
    bounds: Vec<u64>,
    /// Counts per bucket, plus one trailing overflow bucket
    counts: Vec<AtomicU64>,
    /// Sum of all values
    sum: AtomicU64,
    /// Total count
    count: AtomicU64,
}

impl Histogram {
    /// Create histogram with the given bucket bounds (ascending)
    pub fn with_buckets(bounds: Vec<u64>) -> Self {
        let counts = (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Buckets suited to group sizes
    pub fn group_sizes() -> Self {
        Self::with_buckets(vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024])
    }

    /// Buckets suited to planning latency in microseconds
    pub fn latency_micros() -> Self {
        Self::with_buckets(vec![
            10, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 50_000,
        ])
    }

    /// Record a value
    pub fn observe(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let bucket = self.bounds.partition_point(|bound| *bound < value);
        self.counts[bucket].fetch_add(1, Ordering::Relaxed);
    }

    /// Get mean value
    pub fn mean(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// Get total count
    pub fn total_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Per-bucket counts, the last entry being the overflow bucket
    pub fn bucket_counts(&self) -> Vec<u64> {
        self.counts
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    /// Summary for export
    pub fn summary(&self) -> HistogramSummary {
        HistogramSummary {
            mean: self.mean(),
            count: self.total_count(),
            bounds: self.bounds.clone(),
            buckets: self.bucket_counts(),
        }
    }
}

/// Counters and histograms for the planning pipeline
#[derive(Debug)]
pub struct SchedulerMetrics {
    plans: AtomicU64,
    transactions: AtomicU64,
    failed: AtomicU64,
    raw_groups: AtomicU64,
    groups: AtomicU64,
    batches: AtomicU64,
    invariant_violations: AtomicU64,
    group_size: Histogram,
    planning_micros: Histogram,
    /// Sizes of the most recent plan's groups
    last_group_sizes: RwLock<Vec<usize>>,
}

impl SchedulerMetrics {
    /// Create an empty metrics store
    pub fn new() -> Self {
        Self {
            plans: AtomicU64::new(0),
            transactions: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            raw_groups: AtomicU64::new(0),
            groups: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            invariant_violations: AtomicU64::new(0),
            group_size: Histogram::group_sizes(),
            planning_micros: Histogram::latency_micros(),
            last_group_sizes: RwLock::new(Vec::new()),
        }
    }

    /// Record a finished plan
    pub fn record_plan(
        &self,
        transactions: usize,
        failed: usize,
        raw_groups: usize,
        group_sizes: &[usize],
        elapsed_micros: u64,
    ) {
        self.plans.fetch_add(1, Ordering::Relaxed);
        self.transactions
            .fetch_add(transactions as u64, Ordering::Relaxed);
        self.failed.fetch_add(failed as u64, Ordering::Relaxed);
        self.raw_groups
            .fetch_add(raw_groups as u64, Ordering::Relaxed);
        self.groups
            .fetch_add(group_sizes.len() as u64, Ordering::Relaxed);
        for size in group_sizes {
            self.group_size.observe(*size as u64);
        }
        self.planning_micros.observe(elapsed_micros);
        *self.last_group_sizes.write() = group_sizes.to_vec();
    }

    /// Record a batching pass
    pub fn record_batches(&self, batches: usize) {
        self.batches.fetch_add(batches as u64, Ordering::Relaxed);
    }

    /// Record a plan aborted on a lost or duplicated transaction
    pub fn record_invariant_violation(&self) {
        self.invariant_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Plans produced so far
    pub fn plans(&self) -> u64 {
        self.plans.load(Ordering::Relaxed)
    }

    /// Group sizes of the most recent plan
    pub fn last_group_sizes(&self) -> Vec<usize> {
        self.last_group_sizes.read().clone()
    }

    /// Point-in-time copy of every metric
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            plans: self.plans.load(Ordering::Relaxed),
            transactions: self.transactions.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            raw_groups: self.raw_groups.load(Ordering::Relaxed),
            groups: self.groups.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            invariant_violations: self.invariant_violations.load(Ordering::Relaxed),
            group_size: self.group_size.summary(),
            planning_micros: self.planning_micros.summary(),
            last_group_sizes: self.last_group_sizes(),
        }
    }
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a histogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    /// Mean value
    pub mean: f64,
    /// Total observation count
    pub count: u64,
    /// Inclusive bucket upper bounds
    pub bounds: Vec<u64>,
    /// Counts per bucket, one longer than `bounds` (overflow last)
    pub buckets: Vec<u64>,
}

/// Snapshot of all scheduler metrics at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Plans produced
    pub plans: u64,
    /// Transactions scheduled into groups
    pub transactions: u64,
    /// Transactions whose resources could not be resolved
    pub failed: u64,
    /// Conflict groups before balancing
    pub raw_groups: u64,
    /// Groups after balancing
    pub groups: u64,
    /// Sender-ordered batches produced
    pub batches: u64,
    /// Plans aborted on a lost or duplicated transaction
    pub invariant_violations: u64,
    /// Distribution of balanced group sizes
    pub group_size: HistogramSummary,
    /// Distribution of planning latency (microseconds)
    pub planning_micros: HistogramSummary,
    /// Group sizes of the most recent plan
    pub last_group_sizes: Vec<usize>,
}

impl MetricsSnapshot {
    /// Export snapshot as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export snapshot as compact JSON string
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
