//! Outpoint index: which pool transaction consumes which outpoint.
//!
//! Every outpoint normally has exactly one pending consumer. When a second
//! consumer shows up the claim becomes *contested*: all claimants are kept,
//! in admission order, and the oldest one stays primary. The primary is what
//! callers see when they ask "who spends this?".

use std::collections::HashMap;

use crate::transaction::{Outpoint, TxId};

/// The pool transactions consuming a single outpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Claimants in admission order. Never empty while stored.
    claimants: Vec<TxId>,
}

impl Claim {
    /// The first-seen claimant.
    pub fn primary(&self) -> TxId {
        self.claimants[0]
    }

    /// All claimants, primary first.
    pub fn claimants(&self) -> &[TxId] {
        &self.claimants
    }

    /// Returns `true` if more than one pool transaction consumes the outpoint.
    pub fn is_contested(&self) -> bool {
        self.claimants.len() > 1
    }
}

/// Mapping from outpoint to its pending consumer(s).
#[derive(Debug, Default)]
pub struct OutpointIndex {
    claims: HashMap<Outpoint, Claim>,
}

impl OutpointIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `txid` as a consumer of `outpoint`.
    ///
    /// Returns the claimants that were already present (the rivals of
    /// `txid`). Re-claiming by an existing claimant is a no-op.
    pub fn claim(&mut self, outpoint: Outpoint, txid: TxId) -> Vec<TxId> {
        let claim = self.claims.entry(outpoint).or_insert_with(|| Claim {
            claimants: Vec::with_capacity(1),
        });

        let rivals: Vec<TxId> = claim
            .claimants
            .iter()
            .copied()
            .filter(|c| *c != txid)
            .collect();

        if !claim.claimants.contains(&txid) {
            claim.claimants.push(txid);
        }
        rivals
    }

    /// Drops `txid` from the claimants of `outpoint`. The next-oldest
    /// claimant is promoted to primary; an empty claim is removed.
    pub fn release(&mut self, outpoint: &Outpoint, txid: &TxId) {
        if let Some(claim) = self.claims.get_mut(outpoint) {
            claim.claimants.retain(|c| c != txid);
            if claim.claimants.is_empty() {
                self.claims.remove(outpoint);
            }
        }
    }

    /// Returns the claim on `outpoint`, if any.
    pub fn get(&self, outpoint: &Outpoint) -> Option<&Claim> {
        self.claims.get(outpoint)
    }

    /// Returns the primary consumer of `outpoint`.
    pub fn primary(&self, outpoint: &Outpoint) -> Option<TxId> {
        self.claims.get(outpoint).map(Claim::primary)
    }

    /// Returns `true` if any pool transaction consumes `outpoint`.
    pub fn is_claimed(&self, outpoint: &Outpoint) -> bool {
        self.claims.contains_key(outpoint)
    }

    /// Number of outpoints with more than one claimant.
    pub fn contested_count(&self) -> usize {
        self.claims.values().filter(|c| c.is_contested()).count()
    }

    /// Number of claimed outpoints.
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Returns `true` if nothing is claimed.
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
