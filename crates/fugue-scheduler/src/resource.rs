//! Resource identities and the resource-usage collaborator
//!
//! The grouper never inspects transactions itself. It asks a
//! [`ResourceUsage`] implementation which pieces of shared state each
//! transaction may touch, and treats two transactions as conflicting iff
//! those sets intersect.

use crate::error::ResourceError;
use fugue_primitives::{Address, BlockHeight, H256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A unit of shared state (an account or a contract storage cell)
///
/// The zero slot stands for the account as a whole, so an account resource
/// and slot zero of the same contract are the same resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    /// Account or contract address
    pub address: Address,
    /// Storage slot, zero for the whole account
    pub slot: H256,
}

impl ResourceId {
    /// Create a new resource id
    pub fn new(address: Address, slot: H256) -> Self {
        Self { address, slot }
    }

    /// Resource covering a whole account
    pub fn account(address: Address) -> Self {
        Self {
            address,
            slot: H256::ZERO,
        }
    }

    /// Resource covering one storage cell of a contract
    pub fn storage(contract: Address, slot: H256) -> Self {
        Self {
            address: contract,
            slot,
        }
    }

    /// Whether this resource covers a whole account
    pub fn is_account(&self) -> bool {
        self.slot.is_zero()
    }
}

/// Chain state a plan is computed against (the parent of the pending block)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainContext {
    /// Hash of the parent block
    pub block_hash: H256,
    /// Height of the parent block
    pub block_height: BlockHeight,
}

impl ChainContext {
    /// Create a new chain context
    pub fn new(block_hash: H256, block_height: BlockHeight) -> Self {
        Self {
            block_hash,
            block_height,
        }
    }
}

/// The parts of a transaction the scheduler looks at
pub trait Transaction {
    /// Originating account
    fn sender(&self) -> Address;

    /// Target account, if any
    fn recipient(&self) -> Option<Address>;
}

impl<T: Transaction + ?Sized> Transaction for &T {
    fn sender(&self) -> Address {
        (**self).sender()
    }

    fn recipient(&self) -> Option<Address> {
        (**self).recipient()
    }
}

impl<T: Transaction + ?Sized> Transaction for Box<T> {
    fn sender(&self) -> Address {
        (**self).sender()
    }

    fn recipient(&self) -> Option<Address> {
        (**self).recipient()
    }
}

impl<T: Transaction + ?Sized> Transaction for Arc<T> {
    fn sender(&self) -> Address {
        (**self).sender()
    }

    fn recipient(&self) -> Option<Address> {
        (**self).recipient()
    }
}

/// Resource-usage collaborator
///
/// Implementations must be deterministic for a given chain state and
/// transaction: every node has to derive the same resource sets or the
/// resulting plans, and with them the executed state, diverge.
pub trait ResourceUsage<T: ?Sized, R> {
    /// Resources `tx` may read or write. An empty set means `tx` conflicts
    /// with nothing.
    fn get_resources(&self, ctx: &ChainContext, tx: &T) -> Result<Vec<R>, ResourceError>;
}

impl<T, R, F> ResourceUsage<T, R> for F
where
    T: ?Sized,
    F: Fn(&ChainContext, &T) -> Result<Vec<R>, ResourceError>,
{
    fn get_resources(&self, ctx: &ChainContext, tx: &T) -> Result<Vec<R>, ResourceError> {
        self(ctx, tx)
    }
}

/// Conservative collaborator: a transaction touches its sender and
/// recipient accounts and nothing else.
#[derive(Clone, Copy, Debug, Default)]
pub struct SenderRecipientResources;

impl<T: Transaction + ?Sized> ResourceUsage<T, ResourceId> for SenderRecipientResources {
    fn get_resources(&self, _ctx: &ChainContext, tx: &T) -> Result<Vec<ResourceId>, ResourceError> {
        let sender = tx.sender();
        let mut resources = vec![ResourceId::account(sender)];
        if let Some(recipient) = tx.recipient().filter(|to| *to != sender) {
            resources.push(ResourceId::account(recipient));
        }
        Ok(resources)
    }
}
