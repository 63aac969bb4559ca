//! # fugue-scheduler
//!
//! Conflict-aware transaction scheduling for Fugue.
//!
//! This crate provides:
//! - Resource conflict grouping (union-find over shared resources)
//! - Core-aware balancing of conflict groups with pluggable strategies
//! - Sender-ordered batching that keeps each sender's transactions in order
//! - A configured planner tying grouping and balancing together
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------+
//! |        transactions       |
//! +---------------------------+
//!              |
//! +---------------------------+
//! |  ResourceConflictGrouper  |  <- ResourceUsage collaborator
//! +---------------------------+
//!              |
//! +---------------------------+
//! |  CoreAwareGroupBalancer   |  <- BalanceStrategy
//! +---------------------------+
//!              |
//! +---------------------------+
//! |       ExecutionPlan       |  <- one group per executor
//! +---------------------------+
//!
//! +---------------------------+
//! |    SenderOrderBatcher     |  <- per-sender FIFO, independent stage
//! +---------------------------+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use fugue_scheduler::{ChainContext, Planner, SchedulerConfig, SenderRecipientResources};
//!
//! let planner = Planner::new(SenderRecipientResources, SchedulerConfig::with_parallelism(8))?;
//! let plan = planner.plan(&ChainContext::new(parent_hash, parent_height), txs)?;
//! for group in plan.groups {
//!     executor.spawn(group);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod balancer;
mod batcher;
mod config;
mod error;
mod grouper;
mod metrics;
mod planner;
mod resource;
mod union_find;

#[cfg(test)]
mod testing;

pub use balancer::{
    BalanceStrategy, CoreAwareGroupBalancer, SmallestPairs, TwoPointerMerge, DEFAULT_SAFETY_MARGIN,
};
pub use batcher::{Batch, BatchSequence, SenderOrderBatcher};
pub use config::{GroupStrategy, SchedulerConfig};
pub use error::{ResourceError, SchedulerError, SchedulerResult};
pub use grouper::{ConflictGroup, FailedTransaction, GroupingOutcome, ResourceConflictGrouper};
pub use metrics::{Histogram, HistogramSummary, MetricsSnapshot, SchedulerMetrics};
pub use planner::{ExecutionPlan, Planner};
pub use resource::{ChainContext, ResourceId, ResourceUsage, SenderRecipientResources, Transaction};

pub use fugue_primitives::{Address, BlockHeight, H256};
