//! Error types for the scheduler

use fugue_primitives::Address;
use thiserror::Error;

/// Scheduler errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Target parallelism below one
    #[error("invalid target parallelism: {0} (must be at least 1)")]
    InvalidParallelism(usize),

    /// Configuration rejected before any work started
    #[error("invalid scheduler config: {0}")]
    InvalidConfig(String),

    /// Transactions were lost or duplicated by a planning stage.
    ///
    /// This is a bug, never a recoverable condition: the block being
    /// planned must not be produced or validated with this plan.
    #[error("scheduler invariant violated in {stage}: expected {expected} transactions, found {actual}")]
    InvariantViolation {
        /// Stage that broke the invariant
        stage: &'static str,
        /// Transactions handed to the stage
        expected: usize,
        /// Transactions the stage returned
        actual: usize,
    },
}

impl SchedulerError {
    /// Whether the error signals a scheduler bug rather than bad input
    pub fn is_fatal(&self) -> bool {
        matches!(self, SchedulerError::InvariantViolation { .. })
    }
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Why the resource-usage collaborator could not describe a transaction
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Resource analysis failed
    #[error("resources could not be resolved: {0}")]
    Unresolvable(String),

    /// No metadata is known for the called contract
    #[error("no resource metadata for contract {0}")]
    MissingMetadata(Address),
}
