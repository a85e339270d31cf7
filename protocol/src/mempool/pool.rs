//! The pending pool proper: admitted transactions and their metadata.
//!
//! Entries are immutable once inserted. Everything the classifier needs
//! about a transaction's own policy standing (eligibility, replacement
//! signal, size, depth) is computed once at admission and stored here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::transaction::{Transaction, TxId};

// ---------------------------------------------------------------------------
// RelayDecision
// ---------------------------------------------------------------------------

/// Whether an admitted transaction should go out on the normal relay path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayDecision {
    /// Relay to peers as usual.
    Broadcast,
    /// Keep for local conflict tracking only. The transaction double-spends
    /// an incumbent that did not opt into replacement; peers only learn of
    /// it if it is submitted to them directly.
    LocalOnly,
}

// ---------------------------------------------------------------------------
// PoolEntry
// ---------------------------------------------------------------------------

/// A transaction together with its admission metadata.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    /// The transaction itself.
    pub tx: Arc<Transaction>,

    /// Cached id.
    pub txid: TxId,

    /// Serialized size in bytes.
    pub size: usize,

    /// Wall-clock admission time.
    pub admitted_at: DateTime<Utc>,

    /// Monotonic admission counter. Orders entries when timestamps tie.
    pub sequence: u64,

    /// The transaction's own operation permits the fast-path guarantee: an
    /// eligible kind with no restricted outputs. Whatever spends the outputs
    /// of an ineligible entry is ineligible too; the classifier follows that
    /// through the parent edges.
    pub eligible_for_zdag: bool,

    /// At least one input opts into fee-based replacement.
    pub signals_rbf: bool,

    /// Serialized size exceeds the soft ZDAG policy limit.
    pub size_over_policy: bool,

    /// Length of the longest in-pool ancestor chain, counting this entry.
    pub depth: usize,

    /// Relay decision taken at admission.
    pub relay: RelayDecision,
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Admitted pending transactions keyed by id.
#[derive(Default)]
pub struct Pool {
    entries: HashMap<TxId, PoolEntry>,
    next_sequence: u64,
    total_bytes: usize,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("size", &self.entries.len())
            .field("total_bytes", &self.total_bytes)
            .finish()
    }
}

impl Pool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out the next admission sequence number.
    pub fn next_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// Inserts an entry. An existing entry with the same id is kept and the
    /// new one dropped, so retransmissions never reset admission metadata.
    pub fn insert(&mut self, entry: PoolEntry) -> bool {
        if self.entries.contains_key(&entry.txid) {
            return false;
        }
        self.total_bytes += entry.size;
        self.entries.insert(entry.txid, entry);
        true
    }

    /// Removes and returns an entry.
    pub fn remove(&mut self, txid: &TxId) -> Option<PoolEntry> {
        let entry = self.entries.remove(txid)?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.size);
        Some(entry)
    }

    /// Returns the entry for `txid`.
    pub fn get(&self, txid: &TxId) -> Option<&PoolEntry> {
        self.entries.get(txid)
    }

    /// Returns `true` if `txid` is pool-resident.
    pub fn contains(&self, txid: &TxId) -> bool {
        self.entries.contains_key(txid)
    }

    /// Ids of entries admitted strictly before `cutoff`, oldest first.
    pub fn admitted_before(&self, cutoff: DateTime<Utc>) -> Vec<TxId> {
        let mut stale: Vec<&PoolEntry> = self
            .entries
            .values()
            .filter(|e| e.admitted_at < cutoff)
            .collect();
        stale.sort_by_key(|e| e.sequence);
        stale.into_iter().map(|e| e.txid).collect()
    }

    /// Iterates over all entries.
    pub fn iter(&self) -> impl Iterator<Item = &PoolEntry> {
        self.entries.values()
    }

    /// Number of pool-resident transactions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total serialized bytes of all entries.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Outpoint, TransactionBuilder, TransactionKind};
    use chrono::Duration;

    fn entry(lock_time: u32, sequence: u64, admitted_at: DateTime<Utc>) -> PoolEntry {
        let tx = TransactionBuilder::new(TransactionKind::Standard)
            .input(Outpoint::new(TxId::from_bytes([1; 32]), 0))
            .output(10)
            .lock_time(lock_time)
            .build();
        PoolEntry {
            txid: tx.txid(),
            size: tx.encoded_size(),
            tx: Arc::new(tx),
            admitted_at,
            sequence,
            eligible_for_zdag: true,
            signals_rbf: false,
            size_over_policy: false,
            depth: 1,
            relay: RelayDecision::Broadcast,
        }
    }

    #[test]
    fn insert_get_remove() {
        let mut pool = Pool::new();
        let e = entry(1, 0, Utc::now());
        let id = e.txid;
        let size = e.size;

        assert!(pool.insert(e));
        assert!(pool.contains(&id));
        assert_eq!(pool.total_bytes(), size);

        let removed = pool.remove(&id).unwrap();
        assert_eq!(removed.txid, id);
        assert!(pool.is_empty());
        assert_eq!(pool.total_bytes(), 0);
    }

    #[test]
    fn duplicate_insert_keeps_original() {
        let mut pool = Pool::new();
        let first = entry(1, 0, Utc::now());
        let mut second = first.clone();
        second.sequence = 99;

        assert!(pool.insert(first));
        assert!(!pool.insert(second));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.iter().next().unwrap().sequence, 0);
    }

    #[test]
    fn sequence_is_monotonic() {
        let mut pool = Pool::new();
        assert_eq!(pool.next_sequence(), 0);
        assert_eq!(pool.next_sequence(), 1);
        assert_eq!(pool.next_sequence(), 2);
    }

    #[test]
    fn admitted_before_orders_by_sequence() {
        let mut pool = Pool::new();
        let now = Utc::now();
        let old = now - Duration::hours(2);

        let a = entry(1, 5, old);
        let b = entry(2, 3, old);
        let c = entry(3, 7, now);
        let (a_id, b_id) = (a.txid, b.txid);
        pool.insert(a);
        pool.insert(b);
        pool.insert(c);

        let stale = pool.admitted_before(now - Duration::hours(1));
        assert_eq!(stale, vec![b_id, a_id]);
    }
}
