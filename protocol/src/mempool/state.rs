//! The shared pool aggregate.
//!
//! [`PoolState`] owns the four pool components and keeps them consistent:
//! every structural change goes through one of its methods so that an id
//! never lingers in the outpoint index, the dependency graph or a conflict
//! set after leaving the pool.

use serde::Serialize;

use super::conflicts::ConflictTracker;
use super::graph::DependencyGraph;
use super::outpoints::OutpointIndex;
use super::pool::{Pool, PoolEntry};
use crate::transaction::{Outpoint, TxId};

/// Point-in-time counters over the pool, for metrics and status output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Pool-resident transactions.
    pub transactions: usize,
    /// Total serialized bytes.
    pub bytes: usize,
    /// Live conflict sets.
    pub conflict_sets: usize,
    /// Transactions that are members of a conflict set.
    pub conflicted: usize,
    /// Outpoints with more than one pending consumer.
    pub contested_outpoints: usize,
    /// Dependency edges between pool transactions.
    pub edges: usize,
    /// Height of the last connected block, once one has been seen.
    pub tip_height: Option<u64>,
}

/// Pool + OutpointIndex + DependencyGraph + ConflictTracker.
#[derive(Debug, Default)]
pub struct PoolState {
    pool: Pool,
    outpoints: OutpointIndex,
    graph: DependencyGraph,
    conflicts: ConflictTracker,
}

impl PoolState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The admitted transactions.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Outpoint consumers.
    pub fn outpoints(&self) -> &OutpointIndex {
        &self.outpoints
    }

    /// Parent/child links.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Conflict sets.
    pub fn conflicts(&self) -> &ConflictTracker {
        &self.conflicts
    }

    /// Hands out the next admission sequence number.
    pub fn next_sequence(&mut self) -> u64 {
        self.pool.next_sequence()
    }

    /// Inserts an admitted entry into every component.
    ///
    /// Claims each consumed outpoint, links the entry to its pool-resident
    /// parents and registers conflicts with rival claimants. Returns the
    /// rivals found (empty when the entry double-spends nothing). Inserting
    /// an id that is already resident is a no-op returning no rivals.
    pub fn insert(&mut self, entry: PoolEntry) -> Vec<TxId> {
        if self.pool.contains(&entry.txid) {
            return Vec::new();
        }

        let txid = entry.txid;
        let sequence = entry.sequence;
        let mut rivals: Vec<TxId> = Vec::new();
        let mut parents: Vec<TxId> = Vec::new();

        for prevout in entry.tx.prevouts() {
            for rival in self.outpoints.claim(*prevout, txid) {
                if !rivals.contains(&rival) {
                    rivals.push(rival);
                }
            }
            if self.pool.contains(&prevout.txid) {
                parents.push(prevout.txid);
            }
        }

        self.graph.add(txid, parents);

        // Pool transactions already spending our outputs (a re-admitted
        // parent after a disconnect) become our children.
        for vout in 0..entry.tx.outputs.len() as u32 {
            let spent = Outpoint::new(txid, vout);
            let Some(claim) = self.outpoints.get(&spent) else {
                continue;
            };
            let children: Vec<TxId> = claim.claimants().to_vec();
            for child in children {
                self.graph.add(child, [txid]);
            }
        }

        if !rivals.is_empty() {
            let ranked: Vec<(TxId, u64)> = rivals
                .iter()
                .filter_map(|r| self.pool.get(r).map(|e| (*r, e.sequence)))
                .collect();
            self.conflicts.register((txid, sequence), &ranked);
        }

        self.pool.insert(entry);
        rivals
    }

    /// Removes a single entry and every trace of it, without touching its
    /// descendants. Used for transactions that left the pool because they
    /// confirmed.
    pub fn remove(&mut self, txid: &TxId) -> Option<PoolEntry> {
        let entry = self.pool.remove(txid)?;
        for prevout in entry.tx.prevouts() {
            self.outpoints.release(prevout, txid);
        }
        self.graph.remove(txid);
        self.conflicts.remove(txid);
        Some(entry)
    }

    /// Removes `txid` and everything that spends from it, directly or
    /// transitively. Returns the removed ids, `txid` first.
    pub fn evict_with_descendants(&mut self, txid: &TxId) -> Vec<TxId> {
        if !self.pool.contains(txid) {
            return Vec::new();
        }

        let mut doomed = vec![*txid];
        doomed.extend(self.graph.descendants(txid));

        let mut removed = Vec::with_capacity(doomed.len());
        for id in doomed {
            if self.remove(&id).is_some() {
                removed.push(id);
            }
        }
        removed
    }

    /// Settles a confirmed pool transaction.
    ///
    /// Resolves its conflict set in its favour, removes it, and evicts every
    /// losing rival together with the losers' descendants. Returns the
    /// confirmed entry (if it was resident) and the evicted ids.
    pub fn confirm(&mut self, winner: &TxId) -> (Option<PoolEntry>, Vec<TxId>) {
        let losers = self.conflicts.resolve(winner);
        let confirmed = self.remove(winner);

        let mut evicted = Vec::new();
        for loser in losers {
            evicted.extend(self.evict_with_descendants(&loser));
        }
        (confirmed, evicted)
    }

    /// Current counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            transactions: self.pool.len(),
            bytes: self.pool.total_bytes(),
            conflict_sets: self.conflicts.set_count(),
            conflicted: self.conflicts.conflicted_count(),
            contested_outpoints: self.outpoints.contested_count(),
            edges: self.graph.edge_count(),
            tip_height: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mempool::pool::RelayDecision;
    use crate::transaction::{Transaction, TransactionBuilder, TransactionKind};
    use chrono::Utc;
    use std::sync::Arc;

    fn funding(byte: u8) -> Outpoint {
        Outpoint::new(TxId::from_bytes([byte; 32]), 0)
    }

    fn spend(state: &mut PoolState, prevouts: &[Outpoint], lock_time: u32) -> TxId {
        let mut builder = TransactionBuilder::new(TransactionKind::AllocationSend);
        for p in prevouts {
            builder = builder.input(*p);
        }
        let tx: Transaction = builder.output(1).output(2).lock_time(lock_time).build();
        let sequence = state.next_sequence();
        let entry = PoolEntry {
            txid: tx.txid(),
            size: tx.encoded_size(),
            tx: Arc::new(tx),
            admitted_at: Utc::now(),
            sequence,
            eligible_for_zdag: true,
            signals_rbf: false,
            size_over_policy: false,
            depth: 1,
            relay: RelayDecision::Broadcast,
        };
        let txid = entry.txid;
        state.insert(entry);
        txid
    }

    #[test]
    fn insert_links_parents_and_claims_outpoints() {
        let mut state = PoolState::new();
        let a = spend(&mut state, &[funding(1)], 0);
        let b = spend(&mut state, &[Outpoint::new(a, 0)], 0);

        assert_eq!(state.graph().parents(&b).copied().collect::<Vec<_>>(), vec![a]);
        assert_eq!(state.outpoints().primary(&funding(1)), Some(a));
        assert_eq!(state.outpoints().primary(&Outpoint::new(a, 0)), Some(b));
        assert_eq!(state.stats().edges, 1);
    }

    #[test]
    fn double_spend_forms_conflict_set() {
        let mut state = PoolState::new();
        let a = spend(&mut state, &[funding(1)], 0);
        let b = spend(&mut state, &[funding(1)], 1);

        assert!(state.conflicts().is_conflicted(&a));
        assert!(state.conflicts().is_conflicted(&b));
        assert_eq!(state.conflicts().set_of(&b).unwrap().first_seen(), a);
        assert_eq!(state.stats().contested_outpoints, 1);
    }

    #[test]
    fn remove_keeps_children_but_drops_edges() {
        let mut state = PoolState::new();
        let a = spend(&mut state, &[funding(1)], 0);
        let b = spend(&mut state, &[Outpoint::new(a, 0)], 0);

        state.remove(&a);
        assert!(state.pool().contains(&b));
        assert_eq!(state.graph().parents(&b).count(), 0);
        assert!(!state.outpoints().is_claimed(&funding(1)));
    }

    #[test]
    fn evict_cascades_to_descendants() {
        let mut state = PoolState::new();
        let a = spend(&mut state, &[funding(1)], 0);
        let b = spend(&mut state, &[Outpoint::new(a, 0)], 0);
        let c = spend(&mut state, &[Outpoint::new(b, 0)], 0);
        let other = spend(&mut state, &[funding(2)], 0);

        let removed = state.evict_with_descendants(&a);
        assert_eq!(removed.len(), 3);
        assert_eq!(removed[0], a);
        assert!(!state.pool().contains(&c));
        assert!(state.pool().contains(&other));
        assert!(state.graph().is_empty());
    }

    #[test]
    fn confirm_evicts_losers_and_their_children() {
        let mut state = PoolState::new();
        let winner = spend(&mut state, &[funding(1)], 0);
        let loser = spend(&mut state, &[funding(1)], 1);
        let loser_child = spend(&mut state, &[Outpoint::new(loser, 0)], 0);
        let winner_child = spend(&mut state, &[Outpoint::new(winner, 1)], 0);

        let (confirmed, evicted) = state.confirm(&winner);
        assert_eq!(confirmed.map(|e| e.txid), Some(winner));
        assert_eq!(evicted, vec![loser, loser_child]);
        assert!(state.pool().contains(&winner_child));
        assert_eq!(state.stats().conflict_sets, 0);
        assert_eq!(state.stats().transactions, 1);
    }

    #[test]
    fn late_parent_adopts_existing_children() {
        let mut state = PoolState::new();
        let parent = TransactionBuilder::new(TransactionKind::Standard)
            .input(funding(1))
            .output(5)
            .build();
        let parent_id = parent.txid();

        // Child arrives first (as after a disconnect that re-admits parents
        // behind their already-pooled children).
        let child = spend(&mut state, &[Outpoint::new(parent_id, 0)], 0);
        assert_eq!(state.graph().parents(&child).count(), 0);

        let sequence = state.next_sequence();
        state.insert(PoolEntry {
            txid: parent_id,
            size: parent.encoded_size(),
            tx: Arc::new(parent),
            admitted_at: Utc::now(),
            sequence,
            eligible_for_zdag: true,
            signals_rbf: false,
            size_over_policy: false,
            depth: 1,
            relay: RelayDecision::Broadcast,
        });

        assert_eq!(state.graph().parents(&child).copied().collect::<Vec<_>>(), vec![parent_id]);
        assert_eq!(state.evict_with_descendants(&parent_id), vec![parent_id, child]);
    }

    #[test]
    fn evicting_one_rival_dissolves_pair() {
        let mut state = PoolState::new();
        let a = spend(&mut state, &[funding(1)], 0);
        let b = spend(&mut state, &[funding(1)], 1);

        state.evict_with_descendants(&b);
        assert!(!state.conflicts().is_conflicted(&a));
        assert_eq!(state.outpoints().primary(&funding(1)), Some(a));
    }
}
