//! Status computation for a single transaction id.
//!
//! The walk starts at the queried transaction and follows parent edges with
//! an explicit stack. Conflict is the only condition that propagates without
//! qualification, so the walk stops the moment it meets a conflicted node.
//! Eligibility, size/depth and replacement flags are accumulated over the
//! same walk. Parent edges only exist where a transaction spends a parent's
//! output, so a non-ZDAG operation taints everything that consumes its
//! outputs, directly or through a chain, and nothing else.

use std::collections::HashSet;

use super::status::ZdagStatus;
use crate::config::ZdagConfig;
use crate::mempool::{PoolEntry, PoolState};
use crate::transaction::TxId;

/// Classifies `txid` against a consistent view of the pool.
pub fn classify(state: &PoolState, config: &ZdagConfig, txid: &TxId) -> ZdagStatus {
    if !state.pool().contains(txid) {
        return ZdagStatus::NotFound;
    }

    let mut ineligible = false;
    let mut over_policy = false;
    let mut replaceable = false;
    let mut seen: HashSet<TxId> = HashSet::new();
    let mut stack: Vec<TxId> = vec![*txid];

    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        if state.conflicts().is_conflicted(&id) {
            return ZdagStatus::MajorConflict;
        }
        if let Some(node) = state.pool().get(&id) {
            ineligible |= !node.eligible_for_zdag;
            over_policy |= exceeds_policy(node, config);
            replaceable |= node.signals_rbf;
        }
        stack.extend(state.graph().parents(&id).copied());
    }

    if ineligible {
        ZdagStatus::WarningNotZdagTx
    } else if over_policy {
        ZdagStatus::WarningSizeOverPolicy
    } else if replaceable {
        ZdagStatus::WarningRbf
    } else {
        ZdagStatus::Ok
    }
}

fn exceeds_policy(entry: &PoolEntry, config: &ZdagConfig) -> bool {
    entry.size_over_policy || entry.depth > config.zdag_max_depth
}
