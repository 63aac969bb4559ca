//! Shared fixtures for unit tests

use crate::resource::Transaction;
use fugue_primitives::Address;

/// Minimal transaction: an id for assertions plus sender and recipient
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct TestTx {
    pub id: u32,
    pub from: Address,
    pub to: Option<Address>,
}

impl TestTx {
    pub fn transfer(id: u32, from: Address, to: Address) -> Self {
        Self {
            id,
            from,
            to: Some(to),
        }
    }

    pub fn deploy(id: u32, from: Address) -> Self {
        Self { id, from, to: None }
    }
}

impl Transaction for TestTx {
    fn sender(&self) -> Address {
        self.from
    }

    fn recipient(&self) -> Option<Address> {
        self.to
    }
}

pub(crate) fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub(crate) fn ids<T, I>(txs: I) -> Vec<u32>
where
    I: IntoIterator<Item = T>,
    T: std::borrow::Borrow<TestTx>,
{
    txs.into_iter().map(|tx| tx.borrow().id).collect()
}
