//! Resource conflict grouping
//!
//! Partitions a flat transaction list into conflict groups: connected
//! components of the "shares a resource with" relation. Groups never share
//! a resource with each other, so each one can be handed to its own worker
//! with no coordination.

use crate::error::ResourceError;
use crate::resource::{ChainContext, ResourceUsage};
use crate::union_find::UnionFind;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

/// Transactions that must run on one worker, in this order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictGroup<T> {
    transactions: Vec<T>,
}

impl<T> ConflictGroup<T> {
    /// Create a group from transactions in execution order
    pub fn new(transactions: Vec<T>) -> Self {
        Self { transactions }
    }

    /// Number of transactions in the group
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Check if the group is empty
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Transactions in execution order
    pub fn transactions(&self) -> &[T] {
        &self.transactions
    }

    /// Iterate transactions in execution order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.transactions.iter()
    }

    /// Consume the group, returning its transactions
    pub fn into_transactions(self) -> Vec<T> {
        self.transactions
    }

    /// Append every transaction of `other` after this group's own
    pub fn absorb(&mut self, other: ConflictGroup<T>) {
        self.transactions.extend(other.transactions);
    }

    pub(crate) fn push(&mut self, tx: T) {
        self.transactions.push(tx);
    }
}

impl<T> IntoIterator for ConflictGroup<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.transactions.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ConflictGroup<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.transactions.iter()
    }
}

/// Total transaction count across groups
pub(crate) fn transaction_count<T>(groups: &[ConflictGroup<T>]) -> usize {
    groups.iter().map(ConflictGroup::len).sum()
}

/// A transaction excluded from grouping because its resources are unknown
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedTransaction<T> {
    /// The excluded transaction
    pub transaction: T,
    /// Why the collaborator could not resolve it
    pub reason: ResourceError,
}

/// Result of one grouping call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupingOutcome<T> {
    /// Conflict groups, ordered by the input position of their first member
    pub groups: Vec<ConflictGroup<T>>,
    /// Transactions whose resources could not be resolved, in input order
    pub failed: Vec<FailedTransaction<T>>,
}

impl<T> GroupingOutcome<T> {
    /// Outcome of grouping nothing
    pub fn empty() -> Self {
        Self {
            groups: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Number of transactions placed into groups
    pub fn grouped_count(&self) -> usize {
        transaction_count(&self.groups)
    }

    /// Size of each group, in group order
    pub fn group_sizes(&self) -> Vec<usize> {
        self.groups.iter().map(ConflictGroup::len).collect()
    }

    /// Whether neither groups nor failures were produced
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.failed.is_empty()
    }
}

impl<T> Default for GroupingOutcome<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Where a transaction ended up after resource resolution
enum Placement {
    /// Touches resources; holds the union-find node of its first one
    Node(usize),
    /// Touches nothing, becomes a singleton group
    Free,
    /// Collaborator failed
    Failed(ResourceError),
}

/// Resource conflict grouper
///
/// Stateless apart from its collaborator: the union-find forest and the
/// resource map live only for the duration of one [`group`](Self::group)
/// call, so a grouper can be shared across threads planning different
/// blocks.
#[derive(Clone, Debug, Default)]
pub struct ResourceConflictGrouper<U> {
    usage: U,
}

impl<U> ResourceConflictGrouper<U> {
    /// Create a grouper around a resource-usage collaborator
    pub fn new(usage: U) -> Self {
        Self { usage }
    }

    /// The resource-usage collaborator
    pub fn usage(&self) -> &U {
        &self.usage
    }

    /// Partition `transactions` into conflict groups
    ///
    /// Every input transaction ends up in exactly one group or in
    /// `failed`. Within a group, transactions keep their input order.
    pub fn group<T, R>(&self, ctx: &ChainContext, transactions: Vec<T>) -> GroupingOutcome<T>
    where
        U: ResourceUsage<T, R>,
        R: Eq + Hash,
    {
        if transactions.is_empty() {
            return GroupingOutcome::empty();
        }

        let total = transactions.len();
        let mut forest = UnionFind::with_capacity(total);
        let mut nodes: HashMap<R, usize> = HashMap::new();

        let placements: Vec<Placement> = transactions
            .iter()
            .enumerate()
            .map(|(index, tx)| match self.usage.get_resources(ctx, tx) {
                Ok(resources) => {
                    let mut first: Option<usize> = None;
                    for resource in resources {
                        let node = *nodes.entry(resource).or_insert_with(|| forest.make_set());
                        match first {
                            None => first = Some(node),
                            Some(head) => {
                                forest.union(head, node);
                            }
                        }
                    }
                    first.map_or(Placement::Free, Placement::Node)
                }
                Err(reason) => {
                    tracing::debug!("Transaction #{} excluded from grouping: {}", index, reason);
                    Placement::Failed(reason)
                }
            })
            .collect();

        let mut groups: Vec<ConflictGroup<T>> = Vec::new();
        let mut failed = Vec::new();
        let mut group_of_root: HashMap<usize, usize> = HashMap::new();

        for (tx, placement) in transactions.into_iter().zip(placements) {
            match placement {
                Placement::Node(node) => match group_of_root.entry(forest.find(node)) {
                    Entry::Occupied(entry) => groups[*entry.get()].push(tx),
                    Entry::Vacant(entry) => {
                        entry.insert(groups.len());
                        groups.push(ConflictGroup::new(vec![tx]));
                    }
                },
                Placement::Free => groups.push(ConflictGroup::new(vec![tx])),
                Placement::Failed(reason) => failed.push(FailedTransaction {
                    transaction: tx,
                    reason,
                }),
            }
        }

        let outcome = GroupingOutcome { groups, failed };
        debug_assert_eq!(outcome.grouped_count() + outcome.failed.len(), total);

        tracing::info!(
            "Grouped {} transactions over {} resources into {} groups with sizes {:?}, {} failed resource lookup",
            total,
            forest.len(),
            outcome.groups.len(),
            outcome.group_sizes(),
            outcome.failed.len()
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ResourceId, SenderRecipientResources, Transaction};
    use crate::testing::{addr, ids, TestTx};
    use fugue_primitives::H256;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread;

    /// Collaborator backed by a fixed table keyed by transaction id
    struct TableResources {
        table: HashMap<u32, Result<Vec<ResourceId>, ResourceError>>,
    }

    impl TableResources {
        fn new(entries: Vec<(u32, Result<Vec<ResourceId>, ResourceError>)>) -> Self {
            Self {
                table: entries.into_iter().collect(),
            }
        }
    }

    impl ResourceUsage<TestTx, ResourceId> for TableResources {
        fn get_resources(
            &self,
            _ctx: &ChainContext,
            tx: &TestTx,
        ) -> Result<Vec<ResourceId>, ResourceError> {
            self.table.get(&tx.id).cloned().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn slot(contract: u8, index: u64) -> ResourceId {
        ResourceId::storage(addr(contract), H256::from_low_u64_be(index))
    }

    fn group_ids(outcome: &GroupingOutcome<TestTx>) -> Vec<Vec<u32>> {
        outcome.groups.iter().map(|g| ids(g)).collect()
    }

    fn by_account() -> ResourceConflictGrouper<SenderRecipientResources> {
        ResourceConflictGrouper::new(SenderRecipientResources)
    }

    // ==================== Basic Grouping ====================

    #[test]
    fn test_empty_input() {
        let outcome = by_account().group(&ChainContext::default(), Vec::<TestTx>::new());
        assert!(outcome.is_empty());
        assert_eq!(outcome.grouped_count(), 0);
    }

    #[test]
    fn test_disjoint_transfers_stay_apart() {
        let txs = vec![
            TestTx::transfer(1, addr(0xa), addr(0x1)),
            TestTx::transfer(2, addr(0xb), addr(0x2)),
        ];
        let outcome = by_account().group(&ChainContext::default(), txs);

        assert_eq!(group_ids(&outcome), vec![vec![1], vec![2]]);
        assert!(outcome.failed.is_empty());
    }

    #[test]
    fn test_shared_recipient_joins() {
        let txs = vec![
            TestTx::transfer(1, addr(0xa), addr(0x1)),
            TestTx::transfer(2, addr(0xb), addr(0x1)),
        ];
        let outcome = by_account().group(&ChainContext::default(), txs);

        assert_eq!(group_ids(&outcome), vec![vec![1, 2]]);
    }

    #[test]
    fn test_transitive_conflicts_form_one_group() {
        // 1 and 3 share nothing directly but are linked through 2
        let txs = vec![
            TestTx::transfer(1, addr(0xa), addr(0xb)),
            TestTx::transfer(2, addr(0xc), addr(0xd)),
            TestTx::transfer(3, addr(0xb), addr(0xc)),
            TestTx::transfer(4, addr(0xe), addr(0xf)),
        ];
        let outcome = by_account().group(&ChainContext::default(), txs);

        assert_eq!(group_ids(&outcome), vec![vec![1, 2, 3], vec![4]]);
    }

    #[test]
    fn test_account_chains_form_three_groups() {
        // Senders/recipients as (from-to): groups {0-1, 2-1, 2-4, 3-2, 4-5},
        // {6-7, 8-7}, {9-10, 10-11}
        let pairs = [
            (0, 1),
            (2, 1),
            (2, 4),
            (3, 2),
            (4, 5),
            (6, 7),
            (8, 7),
            (9, 10),
            (10, 11),
        ];
        let txs: Vec<TestTx> = pairs
            .iter()
            .enumerate()
            .map(|(i, (from, to))| TestTx::transfer(i as u32, addr(*from), addr(*to)))
            .collect();

        let outcome = by_account().group(&ChainContext::default(), txs);

        assert_eq!(
            group_ids(&outcome),
            vec![vec![0, 1, 2, 3, 4], vec![5, 6], vec![7, 8]]
        );
    }

    #[test]
    fn test_groups_keep_input_order() {
        let txs = vec![
            TestTx::transfer(5, addr(1), addr(9)),
            TestTx::transfer(3, addr(2), addr(8)),
            TestTx::transfer(9, addr(9), addr(1)),
            TestTx::transfer(1, addr(8), addr(7)),
        ];
        let outcome = by_account().group(&ChainContext::default(), txs);

        assert_eq!(group_ids(&outcome), vec![vec![5, 9], vec![3, 1]]);
    }

    // ==================== Resource Sets ====================

    #[test]
    fn test_resource_free_transactions_are_singletons() {
        let usage = TableResources::new(vec![
            (1, Ok(vec![slot(1, 0)])),
            (2, Ok(Vec::new())),
            (3, Ok(vec![slot(1, 0)])),
            (4, Ok(Vec::new())),
        ]);
        let txs = (1..=4).map(|i| TestTx::deploy(i, addr(i as u8))).collect();

        let outcome = ResourceConflictGrouper::new(usage).group(&ChainContext::default(), txs);

        assert_eq!(group_ids(&outcome), vec![vec![1, 3], vec![2], vec![4]]);
    }

    #[test]
    fn test_storage_slots_split_same_contract() {
        // Same contract, different slots: no conflict
        let usage = TableResources::new(vec![
            (1, Ok(vec![slot(7, 1)])),
            (2, Ok(vec![slot(7, 2)])),
            (3, Ok(vec![slot(7, 1), slot(7, 3)])),
        ]);
        let txs = (1..=3).map(|i| TestTx::deploy(i, addr(i as u8))).collect();

        let outcome = ResourceConflictGrouper::new(usage).group(&ChainContext::default(), txs);

        assert_eq!(group_ids(&outcome), vec![vec![1, 3], vec![2]]);
    }

    #[test]
    fn test_duplicate_resources_in_one_set() {
        let usage = TableResources::new(vec![
            (1, Ok(vec![slot(1, 1), slot(1, 1), slot(1, 1)])),
            (2, Ok(vec![slot(2, 1)])),
        ]);
        let txs = (1..=2).map(|i| TestTx::deploy(i, addr(i as u8))).collect();

        let outcome = ResourceConflictGrouper::new(usage).group(&ChainContext::default(), txs);

        assert_eq!(group_ids(&outcome), vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_hot_contract_serializes_everything() {
        let hot = slot(0x42, 0);
        let entries = (0..10).map(|i| (i, Ok(vec![hot, slot(i as u8, 1)]))).collect();
        let usage = TableResources::new(entries);
        let txs = (0..10).map(|i| TestTx::deploy(i, addr(i as u8))).collect();

        let outcome = ResourceConflictGrouper::new(usage).group(&ChainContext::default(), txs);

        assert_eq!(outcome.groups.len(), 1);
        assert_eq!(ids(&outcome.groups[0]), (0..10u32).collect::<Vec<_>>());
    }

    // ==================== Failure Handling ====================

    #[test]
    fn test_failed_lookup_is_reported_not_fatal() {
        let usage = TableResources::new(vec![
            (1, Ok(vec![slot(1, 0)])),
            (2, Err(ResourceError::MissingMetadata(addr(0xee)))),
            (3, Ok(vec![slot(1, 0)])),
            (4, Err(ResourceError::Unresolvable("analysis timeout".into()))),
        ]);
        let txs = (1..=4).map(|i| TestTx::deploy(i, addr(i as u8))).collect();

        let outcome = ResourceConflictGrouper::new(usage).group(&ChainContext::default(), txs);

        assert_eq!(group_ids(&outcome), vec![vec![1, 3]]);
        assert_eq!(outcome.failed.len(), 2);
        assert_eq!(outcome.failed[0].transaction.id, 2);
        assert_eq!(
            outcome.failed[0].reason,
            ResourceError::MissingMetadata(addr(0xee))
        );
        assert_eq!(outcome.failed[1].transaction.id, 4);
        assert_eq!(outcome.grouped_count() + outcome.failed.len(), 4);
    }

    #[test]
    fn test_all_lookups_failed() {
        let usage = |_: &ChainContext, _: &TestTx| -> Result<Vec<ResourceId>, ResourceError> {
            Err(ResourceError::Unresolvable("state unavailable".into()))
        };
        let txs = (0..3).map(|i| TestTx::deploy(i, addr(1))).collect();

        let outcome = ResourceConflictGrouper::new(usage).group(&ChainContext::default(), txs);

        assert!(outcome.groups.is_empty());
        assert_eq!(outcome.failed.len(), 3);
        assert!(!outcome.is_empty());
    }

    // ==================== Determinism & Concurrency ====================

    #[test]
    fn test_regrouping_is_idempotent() {
        let txs: Vec<TestTx> = (0..40)
            .map(|i| TestTx::transfer(i, addr((i % 7) as u8), addr((i % 5 + 10) as u8)))
            .collect();
        let grouper = by_account();
        let ctx = ChainContext::default();

        let first = grouper.group(&ctx, txs.clone());
        let second = grouper.group(&ctx, txs);

        assert_eq!(first, second);
    }

    #[test]
    fn test_generic_resource_type() {
        let usage = |_: &ChainContext, tx: &TestTx| -> Result<Vec<&'static str>, ResourceError> {
            Ok(match tx.id % 2 {
                0 => vec!["even"],
                _ => vec!["odd"],
            })
        };
        let txs = (0..6).map(|i| TestTx::deploy(i, addr(1))).collect();

        let outcome = ResourceConflictGrouper::new(usage).group(&ChainContext::default(), txs);

        assert_eq!(group_ids(&outcome), vec![vec![0, 2, 4], vec![1, 3, 5]]);
    }

    #[test]
    fn test_concurrent_grouping_shares_nothing() {
        let grouper = Arc::new(by_account());
        let mut handles = vec![];

        for t in 0..8u8 {
            let grouper = Arc::clone(&grouper);
            handles.push(thread::spawn(move || {
                let txs: Vec<TestTx> = (0..50)
                    .map(|i| TestTx::transfer(i, addr(t), addr((i % 3) as u8 + 100)))
                    .collect();
                grouper.group(&ChainContext::default(), txs)
            }));
        }

        for handle in handles {
            let outcome = handle.join().unwrap();
            // One sender touches everything
            assert_eq!(outcome.groups.len(), 1);
            assert_eq!(outcome.grouped_count(), 50);
        }
    }

    #[test]
    fn test_groups_are_conflict_free() {
        let txs: Vec<TestTx> = (0..60)
            .map(|i| TestTx::transfer(i, addr((i * 7 % 23) as u8), addr((i * 11 % 19) as u8 + 30)))
            .collect();
        let outcome = by_account().group(&ChainContext::default(), txs);

        let accounts = |tx: &TestTx| [Some(tx.sender()), tx.recipient()];
        for (i, a) in outcome.groups.iter().enumerate() {
            for b in outcome.groups.iter().skip(i + 1) {
                for x in a {
                    for y in b {
                        for acc in accounts(x).into_iter().flatten() {
                            assert!(!accounts(y).contains(&Some(acc)));
                        }
                    }
                }
            }
        }
    }

    // ==================== ConflictGroup ====================

    #[test]
    fn test_conflict_group_absorb() {
        let mut a = ConflictGroup::new(vec![1, 2]);
        let b = ConflictGroup::new(vec![3]);

        a.absorb(b);

        assert_eq!(a.len(), 3);
        assert_eq!(a.transactions(), &[1, 2, 3]);
        assert_eq!(a.into_transactions(), vec![1, 2, 3]);
    }

    #[test]
    fn test_conflict_group_empty() {
        let group: ConflictGroup<u32> = ConflictGroup::new(Vec::new());
        assert!(group.is_empty());
        assert_eq!(transaction_count(&[group]), 0);
    }
}
