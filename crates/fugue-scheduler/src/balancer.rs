//! Core-aware group balancing
//!
//! Raw conflict grouping can produce far more groups than there are
//! executors. Any two groups may be merged without breaking conflict safety,
//! since they never share a resource, so balancing is pure load
//! distribution. The merge policy sits behind [`BalanceStrategy`].

use crate::error::{SchedulerError, SchedulerResult};
use crate::grouper::{transaction_count, ConflictGroup};
use std::collections::VecDeque;

/// Default number of extra slots added to the target when computing the
/// merge threshold
pub const DEFAULT_SAFETY_MARGIN: usize = 2;

/// Policy deciding which groups get merged
pub trait BalanceStrategy {
    /// Merge `groups` down to at most `target` groups.
    ///
    /// Called only with `target >= 1` and more groups than `target`.
    /// Implementations must neither drop nor duplicate transactions.
    fn merge<T>(&self, groups: Vec<ConflictGroup<T>>, target: usize) -> Vec<ConflictGroup<T>>;
}

/// Smallest-with-largest two-pointer merge
///
/// Groups are sorted ascending by size. Starting from the smallest, the
/// largest remaining groups are appended while the result stays at or below
/// `total / (target + safety_margin)`. Whatever still exceeds the target
/// afterwards is folded with [`SmallestPairs`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TwoPointerMerge {
    safety_margin: usize,
}

impl TwoPointerMerge {
    /// Create with an explicit safety margin
    pub fn new(safety_margin: usize) -> Self {
        Self { safety_margin }
    }

    /// Configured safety margin
    pub fn safety_margin(&self) -> usize {
        self.safety_margin
    }
}

impl Default for TwoPointerMerge {
    fn default() -> Self {
        Self::new(DEFAULT_SAFETY_MARGIN)
    }
}

impl BalanceStrategy for TwoPointerMerge {
    fn merge<T>(&self, mut groups: Vec<ConflictGroup<T>>, target: usize) -> Vec<ConflictGroup<T>> {
        let threshold = transaction_count(&groups) / target.saturating_add(self.safety_margin);
        groups.sort_by_key(ConflictGroup::len);

        let merged = two_pointer_pass(groups, threshold);
        tracing::debug!(
            "Two-pointer pass produced {} groups at threshold {}",
            merged.len(),
            threshold
        );
        merge_smallest_pairs(merged, target)
    }
}

/// Repeatedly merge the two smallest groups until the target is met
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SmallestPairs;

impl BalanceStrategy for SmallestPairs {
    fn merge<T>(&self, groups: Vec<ConflictGroup<T>>, target: usize) -> Vec<ConflictGroup<T>> {
        merge_smallest_pairs(groups, target)
    }
}

/// One two-pointer sweep over groups sorted ascending by size
fn two_pointer_pass<T>(sorted: Vec<ConflictGroup<T>>, threshold: usize) -> Vec<ConflictGroup<T>> {
    let mut remaining: VecDeque<ConflictGroup<T>> = sorted.into();
    let mut merged = Vec::with_capacity(remaining.len());

    while let Some(mut acc) = remaining.pop_front() {
        // back() is None once acc was the last group
        while remaining
            .back()
            .is_some_and(|largest| acc.len() + largest.len() <= threshold)
        {
            if let Some(largest) = remaining.pop_back() {
                acc.absorb(largest);
            }
        }
        merged.push(acc);
    }

    merged
}

/// Fold the two smallest groups together until at most `target` remain.
///
/// Keeps the list sorted descending; a merged group is reinserted after
/// every group at least as large.
fn merge_smallest_pairs<T>(mut groups: Vec<ConflictGroup<T>>, target: usize) -> Vec<ConflictGroup<T>> {
    groups.sort_by(|a, b| b.len().cmp(&a.len()));

    while groups.len() > target.max(1) {
        let Some(smallest) = groups.pop() else { break };
        let Some(mut runner_up) = groups.pop() else {
            groups.push(smallest);
            break;
        };
        runner_up.absorb(smallest);

        let at = groups.partition_point(|g| g.len() >= runner_up.len());
        groups.insert(at, runner_up);
    }

    groups
}

/// Merges raw conflict groups down to a target parallelism
#[derive(Clone, Copy, Debug, Default)]
pub struct CoreAwareGroupBalancer<S = TwoPointerMerge> {
    strategy: S,
}

impl<S: BalanceStrategy> CoreAwareGroupBalancer<S> {
    /// Create a balancer using `strategy`
    pub fn new(strategy: S) -> Self {
        Self { strategy }
    }

    /// The merge strategy
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Merge `groups` so that at most `target_parallelism` remain
    ///
    /// Returns the input unchanged when it already fits. A strategy that
    /// loses or duplicates transactions yields
    /// [`SchedulerError::InvariantViolation`].
    pub fn balance<T>(
        &self,
        groups: Vec<ConflictGroup<T>>,
        target_parallelism: usize,
    ) -> SchedulerResult<Vec<ConflictGroup<T>>> {
        if target_parallelism == 0 {
            return Err(SchedulerError::InvalidParallelism(target_parallelism));
        }
        if groups.len() <= target_parallelism {
            tracing::debug!(
                "{} groups already fit target parallelism {}",
                groups.len(),
                target_parallelism
            );
            return Ok(groups);
        }

        let raw_groups = groups.len();
        let expected = transaction_count(&groups);
        let merged = self.strategy.merge(groups, target_parallelism);
        let actual = transaction_count(&merged);

        if actual != expected {
            tracing::error!(
                "Balancer lost transactions: {} in, {} out. Plan must not be executed",
                expected,
                actual
            );
            return Err(SchedulerError::InvariantViolation {
                stage: "balance",
                expected,
                actual,
            });
        }

        tracing::info!(
            "Merged {} groups into {} groups with sizes {:?}",
            raw_groups,
            merged.len(),
            merged.iter().map(ConflictGroup::len).collect::<Vec<_>>()
        );

        Ok(merged)
    }
}
