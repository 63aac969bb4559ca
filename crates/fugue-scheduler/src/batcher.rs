//! Sender-ordered batching
//!
//! Splits a transaction list into batches holding at most one transaction
//! per sender. Members of one batch carry no mutual ordering constraint;
//! batches themselves must be applied strictly in sequence so that each
//! sender's transactions keep their original order (nonces, balances).
//!
//! Two members of a batch may still share resources. Run the grouper over a
//! batch if a stronger guarantee is required.

use crate::resource::Transaction;
use fugue_primitives::Address;
use std::collections::{HashMap, VecDeque};

/// Transactions from distinct senders that may run concurrently
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch<T> {
    /// Position in the sequence (0 = first batch)
    pub batch_index: usize,
    /// Transactions in this batch, in order of their sender's first appearance
    pub transactions: Vec<T>,
}

impl<T> Batch<T> {
    /// Create a new batch
    pub fn new(batch_index: usize, transactions: Vec<T>) -> Self {
        Self {
            batch_index,
            transactions,
        }
    }

    /// Get number of transactions in batch
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Check if batch is empty
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Batches to apply one after another
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchSequence<T> {
    batches: Vec<Batch<T>>,
}

impl<T> BatchSequence<T> {
    /// Number of batches
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Check if there are no batches
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Batches in application order
    pub fn batches(&self) -> &[Batch<T>] {
        &self.batches
    }

    /// Iterate batches in application order
    pub fn iter(&self) -> std::slice::Iter<'_, Batch<T>> {
        self.batches.iter()
    }

    /// Consume the sequence, returning its batches
    pub fn into_batches(self) -> Vec<Batch<T>> {
        self.batches
    }

    /// Total transactions across all batches
    pub fn total_transactions(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }

    /// Size of the widest batch
    pub fn max_width(&self) -> usize {
        self.batches.iter().map(Batch::len).max().unwrap_or(0)
    }
}

impl<T> IntoIterator for BatchSequence<T> {
    type Item = Batch<T>;
    type IntoIter = std::vec::IntoIter<Batch<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.batches.into_iter()
    }
}

/// Splits transactions into sender-unique batches
#[derive(Clone, Copy, Debug, Default)]
pub struct SenderOrderBatcher;

impl SenderOrderBatcher {
    /// Create a new batcher
    pub fn new() -> Self {
        Self
    }

    /// Batch `transactions`
    ///
    /// Batch `i` holds the `i`-th transaction of every sender that has at
    /// least `i + 1`, so the sequence is as long as the busiest sender's
    /// queue.
    pub fn batch<T: Transaction>(&self, transactions: Vec<T>) -> BatchSequence<T> {
        let total = transactions.len();
        let mut queue_of: HashMap<Address, usize> = HashMap::new();
        let mut queues: Vec<VecDeque<T>> = Vec::new();

        for tx in transactions {
            let index = *queue_of.entry(tx.sender()).or_insert_with(|| {
                queues.push(VecDeque::new());
                queues.len() - 1
            });
            queues[index].push_back(tx);
        }
        let senders = queues.len();

        let mut batches = Vec::new();
        while !queues.is_empty() {
            let transactions: Vec<T> = queues.iter_mut().filter_map(VecDeque::pop_front).collect();
            batches.push(Batch::new(batches.len(), transactions));
            queues.retain(|queue| !queue.is_empty());
        }

        tracing::debug!(
            "Batched {} transactions from {} senders into {} batches",
            total,
            senders,
            batches.len()
        );

        BatchSequence { batches }
    }
}
