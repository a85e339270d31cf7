//! Block-connect resolution.
//!
//! The ledger is expected to reflect the block *before* the event reaches
//! the engine: confirmed inputs spent, confirmed outputs created. The
//! resolver then settles every pool-resident confirmed transaction and
//! sweeps out whatever the block invalidated behind the pool's back.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ledger::LedgerView;
use crate::mempool::PoolState;
use crate::transaction::{Outpoint, Transaction, TxId};

/// A block joining the best chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedBlock {
    /// Height of the block.
    pub height: u64,
    /// Ids of the transactions it confirms, in block order.
    pub txids: Vec<TxId>,
}

/// A block leaving the best chain.
///
/// Carries the transaction bodies, since an id alone cannot be re-admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectedBlock {
    /// Height of the block being removed (the current tip).
    pub height: u64,
    /// Its transactions, in block order.
    pub transactions: Vec<Transaction>,
}

/// What a connected block did to the pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
    /// Height of the block.
    pub height: u64,
    /// Pool transactions the block confirmed.
    pub confirmed: Vec<TxId>,
    /// Pool transactions evicted as conflict losers, as descendants of
    /// losers, or because their inputs no longer resolve.
    pub evicted: Vec<TxId>,
}

/// What a disconnected block did to the pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisconnectSummary {
    /// Height of the removed block.
    pub height: u64,
    /// Transactions returned to the pool.
    pub readmitted: Vec<TxId>,
    /// Transactions that could not be re-admitted.
    pub dropped: Vec<TxId>,
    /// Pool transactions evicted because a dropped transaction was their
    /// parent.
    pub evicted: Vec<TxId>,
}

/// Returns `true` if `prevout` is spendable from the pool's point of view:
/// confirmed unspent, or an existing output of a pool transaction.
pub(crate) fn resolves<L: LedgerView + ?Sized>(
    state: &PoolState,
    ledger: &L,
    prevout: &Outpoint,
) -> bool {
    match state.pool().get(&prevout.txid) {
        Some(parent) => (prevout.vout as usize) < parent.tx.outputs.len(),
        None => ledger.is_unspent(prevout),
    }
}

/// Applies a connected block to the pool state.
pub(crate) fn connect<L: LedgerView + ?Sized>(
    state: &mut PoolState,
    ledger: &L,
    block: &ConnectedBlock,
) -> BlockSummary {
    let mut summary = BlockSummary {
        height: block.height,
        ..Default::default()
    };

    for txid in &block.txids {
        if !state.pool().contains(txid) {
            continue;
        }
        let (confirmed, losers) = state.confirm(txid);
        if confirmed.is_some() {
            summary.confirmed.push(*txid);
        }
        if !losers.is_empty() {
            warn!(winner = %txid, losers = losers.len(), "conflict resolved by block");
        }
        summary.evicted.extend(losers);
    }

    summary.evicted.extend(sweep_unresolvable(state, ledger));
    summary
}

/// Evicts pool transactions (and their descendants) with an input that no
/// longer resolves. This catches double-spends by block transactions the
/// pool never saw.
pub(crate) fn sweep_unresolvable<L: LedgerView + ?Sized>(
    state: &mut PoolState,
    ledger: &L,
) -> Vec<TxId> {
    let mut broken: Vec<(u64, TxId)> = state
        .pool()
        .iter()
        .filter(|entry| !entry.tx.prevouts().all(|p| resolves(state, ledger, p)))
        .map(|entry| (entry.sequence, entry.txid))
        .collect();
    broken.sort();

    let mut evicted = Vec::new();
    for (_, txid) in broken {
        let removed = state.evict_with_descendants(&txid);
        if !removed.is_empty() {
            debug!(%txid, cascade = removed.len(), "evicted unresolvable transaction");
        }
        evicted.extend(removed);
    }
    evicted
}
