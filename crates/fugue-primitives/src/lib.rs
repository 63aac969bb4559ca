//! # fugue-primitives
//!
//! Fixed-width identifiers shared by the fugue scheduler crates.
//!
//! `Address` names an originating or target account, `H256` names a block
//! or a contract storage slot. Both are totally ordered and hashable so they
//! can key the scheduler's resource maps and per-sender queues.

#![warn(missing_docs)]
#![warn(clippy::all)]

#[macro_use]
mod fixed;
mod error;

pub use error::PrimitiveError;

fixed_bytes! {
    /// Ethereum-compatible 20-byte account address
    Address, 20
}

fixed_bytes! {
    /// 256-bit hash (32 bytes)
    H256, 32
}

/// Alias for H256
pub type Hash = H256;

/// Block height type
pub type BlockHeight = u64;
