//! Conflict tracking: disjoint sets of pool transactions that compete for
//! at least one common outpoint.
//!
//! Implemented as union-find keyed by transaction id, with union by rank and
//! path compression on the write path. Each root owns a [`ConflictSet`]
//! holding the members and their admission sequence numbers, which is how
//! the first-seen member is chosen.
//!
//! A transaction that is not part of any set is simply absent from the
//! tracker; sets always have at least two members.

use std::collections::HashMap;

use crate::transaction::TxId;

/// A group of pool transactions competing for a common outpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictSet {
    /// Members keyed by id, valued by admission sequence.
    members: HashMap<TxId, u64>,
    /// Earliest-admitted member.
    first_seen: TxId,
}

impl ConflictSet {
    fn singleton(id: TxId, sequence: u64) -> Self {
        Self {
            members: HashMap::from([(id, sequence)]),
            first_seen: id,
        }
    }

    fn from_members(members: HashMap<TxId, u64>) -> Option<Self> {
        let first_seen = members
            .iter()
            .min_by_key(|(id, seq)| (**seq, **id))
            .map(|(id, _)| *id)?;
        Some(Self {
            members,
            first_seen,
        })
    }

    /// The member admitted earliest: the default canonical candidate.
    pub fn first_seen(&self) -> TxId {
        self.first_seen
    }

    /// Returns `true` if `id` is a member.
    pub fn contains(&self, id: &TxId) -> bool {
        self.members.contains_key(id)
    }

    /// Iterates over member ids in no particular order.
    pub fn members(&self) -> impl Iterator<Item = &TxId> {
        self.members.keys()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false` for a stored set; provided for completeness.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn absorb(&mut self, other: ConflictSet) {
        let sequence_of = |set: &ConflictSet| set.members.get(&set.first_seen).copied();
        let other_first = (sequence_of(&other), other.first_seen);
        let own_first = (sequence_of(self), self.first_seen);
        self.members.extend(other.members);
        if other_first < own_first {
            self.first_seen = other_first.1;
        }
    }
}

/// Union-find over conflicting pool transactions.
#[derive(Debug, Default)]
pub struct ConflictTracker {
    parent: HashMap<TxId, TxId>,
    rank: HashMap<TxId, u8>,
    sets: HashMap<TxId, ConflictSet>,
}

impl ConflictTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Unions `id` with each of its `rivals`. Each entry pairs an id with
    /// its admission sequence number. Rivals already in sets bring their
    /// whole set along, so two sets sharing a new member are merged.
    pub fn register(&mut self, id: (TxId, u64), rivals: &[(TxId, u64)]) {
        if rivals.iter().all(|(rival, _)| *rival == id.0) {
            return;
        }
        self.make_set(id.0, id.1);
        for &(rival, sequence) in rivals {
            if rival == id.0 {
                continue;
            }
            self.make_set(rival, sequence);
            self.union(id.0, rival);
        }
    }

    /// Returns `true` if `id` belongs to a conflict set.
    pub fn is_conflicted(&self, id: &TxId) -> bool {
        self.set_of(id).is_some()
    }

    /// Returns the conflict set containing `id`.
    pub fn set_of(&self, id: &TxId) -> Option<&ConflictSet> {
        let root = self.find_readonly(id)?;
        self.sets.get(&root).filter(|set| set.len() >= 2)
    }

    /// Resolves the set containing `winner` in the winner's favour.
    ///
    /// The set is destroyed and every other member is returned so the
    /// caller can evict it. Returns an empty vector if `winner` was not in
    /// conflict.
    pub fn resolve(&mut self, winner: &TxId) -> Vec<TxId> {
        let Some(root) = self.find(winner) else {
            return Vec::new();
        };
        let Some(set) = self.sets.remove(&root) else {
            return Vec::new();
        };

        let mut losers = Vec::with_capacity(set.len().saturating_sub(1));
        for member in set.members.keys() {
            self.parent.remove(member);
            self.rank.remove(member);
            if member != winner {
                losers.push(*member);
            }
        }
        losers
    }

    /// Removes `id` after it left the pool for any reason other than
    /// resolution. A set reduced to a single member is dissolved.
    pub fn remove(&mut self, id: &TxId) {
        let Some(root) = self.find(id) else {
            return;
        };
        let Some(mut set) = self.sets.remove(&root) else {
            return;
        };

        for member in set.members.keys() {
            self.parent.remove(member);
            self.rank.remove(member);
        }
        set.members.remove(id);
        if set.members.len() < 2 {
            return;
        }

        if let Some(rebuilt) = ConflictSet::from_members(set.members) {
            let new_root = rebuilt.first_seen;
            for member in rebuilt.members.keys() {
                self.parent.insert(*member, new_root);
            }
            self.rank.insert(new_root, 1);
            self.sets.insert(new_root, rebuilt);
        }
    }

    /// Number of live conflict sets.
    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    /// Number of transactions in any conflict set.
    pub fn conflicted_count(&self) -> usize {
        self.sets.values().map(ConflictSet::len).sum()
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn make_set(&mut self, id: TxId, sequence: u64) {
        if self.parent.contains_key(&id) {
            return;
        }
        self.parent.insert(id, id);
        self.rank.insert(id, 0);
        self.sets.insert(id, ConflictSet::singleton(id, sequence));
    }

    /// Finds the root of `id`, compressing the path behind it.
    fn find(&mut self, id: &TxId) -> Option<TxId> {
        let root = self.find_readonly(id)?;

        let mut current = *id;
        while current != root {
            let Some(&next) = self.parent.get(&current) else {
                break;
            };
            self.parent.insert(current, root);
            current = next;
        }
        Some(root)
    }

    fn find_readonly(&self, id: &TxId) -> Option<TxId> {
        let mut current = *self.parent.get(id)?;
        loop {
            let next = *self.parent.get(&current)?;
            if next == current {
                return Some(current);
            }
            current = next;
        }
    }

    fn union(&mut self, a: TxId, b: TxId) {
        let (Some(ra), Some(rb)) = (self.find(&a), self.find(&b)) else {
            return;
        };
        if ra == rb {
            return;
        }

        let rank_a = self.rank.get(&ra).copied().unwrap_or(0);
        let rank_b = self.rank.get(&rb).copied().unwrap_or(0);
        let (root, child) = if rank_a >= rank_b { (ra, rb) } else { (rb, ra) };
        if rank_a == rank_b {
            self.rank.insert(root, rank_a.saturating_add(1));
        }

        self.parent.insert(child, root);
        self.rank.remove(&child);
        if let Some(absorbed) = self.sets.remove(&child) {
            if let Some(set) = self.sets.get_mut(&root) {
                set.absorb(absorbed);
            }
        }

        // Singletons only exist transiently inside register().
        debug_assert!(self.sets.get(&root).map_or(false, |s| s.len() >= 2));
    }
}
