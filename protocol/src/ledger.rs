//! # Ledger Collaborator
//!
//! The pending pool never owns confirmed state. It asks a [`LedgerView`]
//! whether an outpoint exists as a confirmed, unspent output, and that is
//! the only question it asks.
//!
//! [`MemoryLedger`] is a concurrent in-memory implementation backed by
//! `DashMap`. The node harness, integration tests and benches use it in place
//! of the consensus engine's UTXO database.

use dashmap::DashSet;

use crate::transaction::{Outpoint, Transaction};

/// Confirmed-unspent lookups provided by the consensus/ledger engine.
pub trait LedgerView: Send + Sync {
    /// Returns `true` if `outpoint` is a confirmed, currently unspent output.
    fn is_unspent(&self, outpoint: &Outpoint) -> bool;
}

impl<L: LedgerView + ?Sized> LedgerView for &L {
    fn is_unspent(&self, outpoint: &Outpoint) -> bool {
        (**self).is_unspent(outpoint)
    }
}

impl<L: LedgerView + ?Sized> LedgerView for std::sync::Arc<L> {
    fn is_unspent(&self, outpoint: &Outpoint) -> bool {
        (**self).is_unspent(outpoint)
    }
}

/// The outpoints a block operation actually changed.
///
/// Outpoints that were already absent when spent, or already present when
/// created, are not recorded, so [`MemoryLedger::undo`] restores exactly
/// the prior set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerDelta {
    /// Outpoints that were unspent and got removed.
    pub removed: Vec<Outpoint>,
    /// Outpoints that were absent and got added.
    pub added: Vec<Outpoint>,
}

/// In-memory confirmed UTXO set.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    unspent: DashSet<Outpoint>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an outpoint as confirmed and unspent (coinbase, test funding).
    pub fn fund(&self, outpoint: Outpoint) {
        self.unspent.insert(outpoint);
    }

    /// Marks an outpoint as spent. Returns `false` if it was not unspent.
    pub fn spend(&self, outpoint: &Outpoint) -> bool {
        self.unspent.remove(outpoint).is_some()
    }

    /// Applies a connected block: spends every input and creates every
    /// output of each transaction, in order.
    pub fn apply_block(&self, transactions: &[Transaction]) -> LedgerDelta {
        let mut delta = LedgerDelta::default();
        for tx in transactions {
            for prevout in tx.prevouts() {
                self.remove_into(*prevout, &mut delta);
            }
            let txid = tx.txid();
            for vout in 0..tx.outputs.len() as u32 {
                self.insert_into(Outpoint::new(txid, vout), &mut delta);
            }
        }
        delta
    }

    /// Reverts a disconnected block, undoing [`Self::apply_block`] in
    /// reverse order.
    pub fn revert_block(&self, transactions: &[Transaction]) -> LedgerDelta {
        let mut delta = LedgerDelta::default();
        for tx in transactions.iter().rev() {
            let txid = tx.txid();
            for vout in 0..tx.outputs.len() as u32 {
                self.remove_into(Outpoint::new(txid, vout), &mut delta);
            }
            for prevout in tx.prevouts() {
                self.insert_into(*prevout, &mut delta);
            }
        }
        delta
    }

    /// Rolls back a delta returned by [`Self::apply_block`] or
    /// [`Self::revert_block`].
    pub fn undo(&self, delta: &LedgerDelta) {
        for outpoint in &delta.added {
            self.unspent.remove(outpoint);
        }
        for outpoint in &delta.removed {
            self.unspent.insert(*outpoint);
        }
    }

    fn remove_into(&self, outpoint: Outpoint, delta: &mut LedgerDelta) {
        if self.unspent.remove(&outpoint).is_some() {
            delta.removed.push(outpoint);
        }
    }

    fn insert_into(&self, outpoint: Outpoint, delta: &mut LedgerDelta) {
        if self.unspent.insert(outpoint) {
            delta.added.push(outpoint);
        }
    }

    /// Number of unspent outputs tracked.
    pub fn len(&self) -> usize {
        self.unspent.len()
    }

    /// Returns `true` if no outputs are tracked.
    pub fn is_empty(&self) -> bool {
        self.unspent.is_empty()
    }
}

impl LedgerView for MemoryLedger {
    fn is_unspent(&self, outpoint: &Outpoint) -> bool {
        self.unspent.contains(outpoint)
    }
}
