//! End-to-end planning: grouping followed by balancing
//!
//! The planner wires the grouper and the balancer together according to a
//! [`SchedulerConfig`], verifies that no transaction went missing, and
//! records [`SchedulerMetrics`].

use crate::balancer::{CoreAwareGroupBalancer, SmallestPairs, TwoPointerMerge};
use crate::batcher::{BatchSequence, SenderOrderBatcher};
use crate::config::{GroupStrategy, SchedulerConfig};
use crate::error::{SchedulerError, SchedulerResult};
use crate::grouper::{transaction_count, ConflictGroup, FailedTransaction, ResourceConflictGrouper};
use crate::metrics::SchedulerMetrics;
use crate::resource::{ChainContext, ResourceUsage, Transaction};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

/// Groups ready to hand to executors
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionPlan<T> {
    /// Balanced groups; each may run on its own executor
    pub groups: Vec<ConflictGroup<T>>,
    /// Transactions left out because their resources could not be resolved
    pub failed: Vec<FailedTransaction<T>>,
    /// Number of conflict groups before balancing
    pub raw_group_count: usize,
    /// Strategy that produced the plan
    pub strategy: GroupStrategy,
}

impl<T> ExecutionPlan<T> {
    /// Plan for an empty block
    pub fn empty(strategy: GroupStrategy) -> Self {
        Self {
            groups: Vec::new(),
            failed: Vec::new(),
            raw_group_count: 0,
            strategy,
        }
    }

    /// Number of transactions placed into groups
    pub fn total_transactions(&self) -> usize {
        transaction_count(&self.groups)
    }

    /// Size of each group, in group order
    pub fn group_sizes(&self) -> Vec<usize> {
        self.groups.iter().map(ConflictGroup::len).collect()
    }

    /// Size of the largest group (the critical path)
    pub fn max_group_size(&self) -> usize {
        self.groups.iter().map(ConflictGroup::len).max().unwrap_or(0)
    }

    /// Calculate parallelism ratio (higher = more parallel)
    ///
    /// Total grouped transactions divided by the largest group. A ratio of
    /// 1.0 means fully serial.
    pub fn parallelism_ratio(&self) -> f64 {
        let longest = self.max_group_size();
        if longest == 0 {
            return 0.0;
        }
        self.total_transactions() as f64 / longest as f64
    }
}

/// Configured grouping and balancing pipeline
#[derive(Debug)]
pub struct Planner<U> {
    grouper: ResourceConflictGrouper<U>,
    batcher: SenderOrderBatcher,
    config: SchedulerConfig,
    target: usize,
    metrics: Arc<SchedulerMetrics>,
}

impl<U> Planner<U> {
    /// Create a planner, validating `config`
    pub fn new(usage: U, config: SchedulerConfig) -> SchedulerResult<Self> {
        Self::with_metrics(usage, config, Arc::new(SchedulerMetrics::new()))
    }

    /// Create a planner that records into shared `metrics`
    pub fn with_metrics(
        usage: U,
        config: SchedulerConfig,
        metrics: Arc<SchedulerMetrics>,
    ) -> SchedulerResult<Self> {
        config.validate()?;
        let target = config.effective_parallelism();

        tracing::info!(
            "Scheduler planner using {:?} strategy, target parallelism {}",
            config.strategy,
            target
        );

        Ok(Self {
            grouper: ResourceConflictGrouper::new(usage),
            batcher: SenderOrderBatcher::new(),
            config,
            target,
            metrics,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Resolved target parallelism
    pub fn target_parallelism(&self) -> usize {
        self.target
    }

    /// Metrics store
    pub fn metrics(&self) -> &Arc<SchedulerMetrics> {
        &self.metrics
    }

    /// Group and balance `transactions` against `ctx`
    pub fn plan<T, R>(&self, ctx: &ChainContext, transactions: Vec<T>) -> SchedulerResult<ExecutionPlan<T>>
    where
        U: ResourceUsage<T, R>,
        R: Eq + Hash,
    {
        let strategy = self.config.strategy;
        if transactions.is_empty() {
            return Ok(ExecutionPlan::empty(strategy));
        }

        let start = Instant::now();
        let total = transactions.len();
        let outcome = self.grouper.group(ctx, transactions);
        let raw_group_count = outcome.groups.len();

        let balanced = match strategy {
            GroupStrategy::Naive => Ok(outcome.groups),
            GroupStrategy::TwoPointer => {
                CoreAwareGroupBalancer::new(TwoPointerMerge::new(self.config.safety_margin))
                    .balance(outcome.groups, self.target)
            }
            GroupStrategy::SmallestPairs => {
                CoreAwareGroupBalancer::new(SmallestPairs).balance(outcome.groups, self.target)
            }
        };
        let groups = match balanced {
            Ok(groups) => groups,
            Err(err) => {
                if err.is_fatal() {
                    self.metrics.record_invariant_violation();
                }
                return Err(err);
            }
        };

        let plan = ExecutionPlan {
            groups,
            failed: outcome.failed,
            raw_group_count,
            strategy,
        };

        let accounted = plan.total_transactions() + plan.failed.len();
        if accounted != total {
            tracing::error!(
                "Plan accounts for {} of {} transactions at height {}",
                accounted,
                total,
                ctx.block_height
            );
            self.metrics.record_invariant_violation();
            return Err(SchedulerError::InvariantViolation {
                stage: "plan",
                expected: total,
                actual: accounted,
            });
        }

        let elapsed = start.elapsed().as_micros() as u64;
        self.metrics.record_plan(
            plan.total_transactions(),
            plan.failed.len(),
            raw_group_count,
            &plan.group_sizes(),
            elapsed,
        );

        tracing::info!(
            "Planned {} transactions at height {} into {} groups (from {} raw) in {}us",
            total,
            ctx.block_height,
            plan.groups.len(),
            raw_group_count,
            elapsed
        );

        Ok(plan)
    }

    /// Split `transactions` into sender-ordered batches
    pub fn batch<T: Transaction>(&self, transactions: Vec<T>) -> BatchSequence<T> {
        let batches = self.batcher.batch(transactions);
        self.metrics.record_batches(batches.len());
        batches
    }
}
