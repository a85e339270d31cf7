//! The ZDAG engine: one lock, one pool, one ledger handle.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::classifier;
use super::error::{AdmissionError, BlockEventError, PolicyViolation};
use super::resolver::{self, BlockSummary, ConnectedBlock, DisconnectSummary, DisconnectedBlock};
use super::status::ZdagStatus;
use crate::config::ZdagConfig;
use crate::ledger::LedgerView;
use crate::mempool::{PoolEntry, PoolState, PoolStats, RelayDecision};
use crate::transaction::{Transaction, TxId};

// ---------------------------------------------------------------------------
// Admission results
// ---------------------------------------------------------------------------

/// How an admission request ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AdmissionOutcome {
    /// Newly admitted.
    Accepted {
        /// Whether to relay it onwards.
        relay: RelayDecision,
    },
    /// Already pool-resident. Nothing changed.
    AlreadyKnown,
}

/// Result of a successful `submit` / `admit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Admission {
    /// Id of the submitted transaction.
    pub txid: TxId,
    /// What happened to it.
    #[serde(flatten)]
    pub outcome: AdmissionOutcome,
}

impl Admission {
    /// Returns `true` if the transaction was newly admitted.
    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, AdmissionOutcome::Accepted { .. })
    }
}

// ---------------------------------------------------------------------------
// ZdagEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Shared {
    pool: PoolState,
    tip: Option<u64>,
}

impl Shared {
    fn check_connect(&self, height: u64) -> Result<(), BlockEventError> {
        match self.tip {
            Some(tip) if height != tip.saturating_add(1) => Err(BlockEventError::OutOfOrder {
                expected: tip.saturating_add(1),
                got: height,
            }),
            _ => Ok(()),
        }
    }

    fn check_disconnect(&self, height: u64) -> Result<(), BlockEventError> {
        match self.tip {
            Some(tip) if height != tip => Err(BlockEventError::OutOfOrder {
                expected: tip,
                got: height,
            }),
            _ => Ok(()),
        }
    }
}

/// Pending-pool conflict classifier.
///
/// All structural state sits behind a single `parking_lot::RwLock`.
/// Admissions and block events take the write lock; classification takes the
/// read lock, so concurrent queries never block each other and always see
/// a pool that is consistent across all of its indexes.
pub struct ZdagEngine<L> {
    shared: RwLock<Shared>,
    ledger: L,
    config: ZdagConfig,
}

impl<L: LedgerView> ZdagEngine<L> {
    /// Creates an engine over `ledger` with the given policy.
    pub fn new(ledger: L, config: ZdagConfig) -> Self {
        if !config.is_consistent() {
            warn!(?config, "soft ZDAG limits exceed hard limits");
        }
        Self {
            shared: RwLock::new(Shared::default()),
            ledger,
            config,
        }
    }

    /// The active policy.
    pub fn config(&self) -> &ZdagConfig {
        &self.config
    }

    /// The ledger collaborator.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Decodes a raw transaction and admits it.
    pub fn submit(&self, raw: &[u8]) -> Result<Admission, AdmissionError> {
        let tx = Transaction::decode(raw)?;
        self.admit(tx)
    }

    /// Admits a decoded transaction, stamped with the current time.
    pub fn admit(&self, tx: Transaction) -> Result<Admission, AdmissionError> {
        self.admit_at(tx, Utc::now())
    }

    /// Admits a decoded transaction with an explicit admission time.
    pub fn admit_at(
        &self,
        tx: Transaction,
        now: DateTime<Utc>,
    ) -> Result<Admission, AdmissionError> {
        tx.check_structure()?;
        let mut shared = self.shared.write();
        self.admit_locked(&mut shared.pool, tx, now)
    }

    fn admit_locked(
        &self,
        state: &mut PoolState,
        tx: Transaction,
        now: DateTime<Utc>,
    ) -> Result<Admission, AdmissionError> {
        let txid = tx.txid();
        if state.pool().contains(&txid) {
            debug!(%txid, "already known");
            return Ok(Admission {
                txid,
                outcome: AdmissionOutcome::AlreadyKnown,
            });
        }

        let size = tx.encoded_size();
        if size > self.config.max_tx_size {
            return Err(AdmissionError::PolicyRejected(PolicyViolation::TooLarge {
                size,
                max: self.config.max_tx_size,
            }));
        }

        let mut parent_depth = 0;
        for prevout in tx.prevouts() {
            if !resolver::resolves(state, &self.ledger, prevout) {
                return Err(AdmissionError::UnknownReference(*prevout));
            }
            if let Some(parent) = state.pool().get(&prevout.txid) {
                parent_depth = parent_depth.max(parent.depth);
            }
        }

        let depth = parent_depth + 1;
        if depth > self.config.max_chain_depth {
            return Err(AdmissionError::PolicyRejected(PolicyViolation::TooDeep {
                depth,
                max: self.config.max_chain_depth,
            }));
        }

        if state.pool().len() >= self.config.max_pool_size {
            return Err(AdmissionError::PoolFull {
                capacity: self.config.max_pool_size,
            });
        }

        // Double-spending an incumbent that never opted into replacement is
        // tracked locally but not relayed.
        let relay = if tx.prevouts().any(|p| {
            state.outpoints().get(p).is_some_and(|claim| {
                claim
                    .claimants()
                    .iter()
                    .any(|c| state.pool().get(c).is_some_and(|e| !e.signals_rbf))
            })
        }) {
            RelayDecision::LocalOnly
        } else {
            RelayDecision::Broadcast
        };

        let eligible_for_zdag = tx.kind.is_zdag_eligible() && !tx.has_restricted_output();
        let signals_rbf = tx.signals_rbf();
        let sequence = state.next_sequence();
        let entry = PoolEntry {
            tx: Arc::new(tx),
            txid,
            size,
            admitted_at: now,
            sequence,
            eligible_for_zdag,
            signals_rbf,
            size_over_policy: size > self.config.zdag_max_tx_size,
            depth,
            relay,
        };

        let rivals = state.insert(entry);
        if rivals.is_empty() {
            debug!(%txid, size, depth, eligible_for_zdag, "admitted");
        } else {
            warn!(%txid, rivals = rivals.len(), ?relay, "admitted double-spend");
        }

        Ok(Admission {
            txid,
            outcome: AdmissionOutcome::Accepted { relay },
        })
    }

    /// Current zero-confirmation status of `txid`.
    pub fn classify(&self, txid: &TxId) -> ZdagStatus {
        let shared = self.shared.read();
        let status = classifier::classify(&shared.pool, &self.config, txid);
        debug!(%txid, %status, "classified");
        status
    }

    /// Ids of the transactions competing with `txid`, itself included.
    /// Empty if it is not in conflict.
    pub fn conflict_set(&self, txid: &TxId) -> Vec<TxId> {
        let shared = self.shared.read();
        let mut members: Vec<TxId> = shared
            .pool
            .conflicts()
            .set_of(txid)
            .map(|set| set.members().copied().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// Returns a copy of the pool entry for `txid`.
    pub fn entry(&self, txid: &TxId) -> Option<PoolEntry> {
        self.shared.read().pool.pool().get(txid).cloned()
    }

    /// Returns `true` if `txid` is pool-resident.
    pub fn contains(&self, txid: &TxId) -> bool {
        self.shared.read().pool.pool().contains(txid)
    }

    /// Checks that a block at `height` would be accepted as the next
    /// connect, without changing anything. Lets a caller validate ordering
    /// before it updates its ledger.
    pub fn check_connect(&self, height: u64) -> Result<(), BlockEventError> {
        self.shared.read().check_connect(height)
    }

    /// Checks that a block at `height` is the current tip and may be
    /// disconnected.
    pub fn check_disconnect(&self, height: u64) -> Result<(), BlockEventError> {
        self.shared.read().check_disconnect(height)
    }

    /// Applies a connected block.
    ///
    /// The ledger must already reflect the block. Confirmed pool
    /// transactions leave the pool, their conflict rivals are evicted with
    /// all descendants, and anything whose inputs no longer resolve is swept.
    pub fn on_block_connected(
        &self,
        block: &ConnectedBlock,
    ) -> Result<BlockSummary, BlockEventError> {
        let mut shared = self.shared.write();
        shared.check_connect(block.height)?;

        let summary = resolver::connect(&mut shared.pool, &self.ledger, block);
        shared.tip = Some(block.height);

        info!(
            height = block.height,
            txs = block.txids.len(),
            confirmed = summary.confirmed.len(),
            evicted = summary.evicted.len(),
            pool = shared.pool.pool().len(),
            "block connected"
        );
        Ok(summary)
    }

    /// Applies a disconnected block.
    ///
    /// The ledger must already have reverted the block. Its transactions are
    /// offered back to the pool in block order; ones that no longer admit
    /// are dropped, along with any pool transaction left spending them.
    pub fn on_block_disconnected(
        &self,
        block: &DisconnectedBlock,
    ) -> Result<DisconnectSummary, BlockEventError> {
        let mut shared = self.shared.write();
        shared.check_disconnect(block.height)?;

        let now = Utc::now();
        let mut summary = DisconnectSummary {
            height: block.height,
            ..Default::default()
        };
        for tx in &block.transactions {
            let txid = tx.txid();
            let result = tx
                .check_structure()
                .map_err(AdmissionError::from)
                .and_then(|()| self.admit_locked(&mut shared.pool, tx.clone(), now));
            match result {
                Ok(_) => summary.readmitted.push(txid),
                Err(err) => {
                    debug!(%txid, %err, "disconnected transaction not re-admitted");
                    summary.dropped.push(txid);
                }
            }
        }
        summary.evicted = resolver::sweep_unresolvable(&mut shared.pool, &self.ledger);
        shared.tip = block.height.checked_sub(1);

        info!(
            height = block.height,
            readmitted = summary.readmitted.len(),
            dropped = summary.dropped.len(),
            evicted = summary.evicted.len(),
            "block disconnected"
        );
        Ok(summary)
    }

    /// Evicts every entry admitted more than `config.expiry` before `now`,
    /// together with its descendants. Returns the evicted ids.
    pub fn expire(&self, now: DateTime<Utc>) -> Vec<TxId> {
        let Ok(max_age) = chrono::Duration::from_std(self.config.expiry) else {
            return Vec::new();
        };
        let Some(cutoff) = now.checked_sub_signed(max_age) else {
            return Vec::new();
        };

        let mut shared = self.shared.write();
        let stale = shared.pool.pool().admitted_before(cutoff);
        let mut evicted = Vec::new();
        for txid in stale {
            evicted.extend(shared.pool.evict_with_descendants(&txid));
        }
        if !evicted.is_empty() {
            warn!(count = evicted.len(), %cutoff, "expired pending transactions");
        }
        evicted
    }

    /// Current pool counters and tip.
    pub fn snapshot(&self) -> PoolStats {
        let shared = self.shared.read();
        PoolStats {
            tip_height: shared.tip,
            ..shared.pool.stats()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::transaction::{Outpoint, OutputRole, TransactionBuilder, TransactionKind};

    fn setup() -> (ZdagEngine<Arc<MemoryLedger>>, Arc<MemoryLedger>, Outpoint) {
        let ledger = Arc::new(MemoryLedger::new());
        let funding = Outpoint::new(TxId::from_bytes([7; 32]), 0);
        ledger.fund(funding);
        (
            ZdagEngine::new(Arc::clone(&ledger), ZdagConfig::default()),
            ledger,
            funding,
        )
    }

    fn send(prevout: Outpoint, tag: u32) -> Transaction {
        TransactionBuilder::new(TransactionKind::AllocationSend)
            .input(prevout)
            .asset_output(1, 42, 100, OutputRole::Allocation)
            .output(50)
            .lock_time(tag)
            .build()
    }

    #[test]
    fn submit_decodes_and_admits() {
        let (engine, _, funding) = setup();
        let tx = send(funding, 0);
        let admission = engine.submit(&tx.encode()).unwrap();
        assert_eq!(admission.txid, tx.txid());
        assert_eq!(
            admission.outcome,
            AdmissionOutcome::Accepted {
                relay: RelayDecision::Broadcast
            }
        );
        assert_eq!(engine.classify(&tx.txid()), ZdagStatus::Ok);
    }

    #[test]
    fn garbage_is_malformed() {
        let (engine, _, _) = setup();
        let err = engine.submit(&[0xff; 3]).unwrap_err();
        assert!(matches!(err, AdmissionError::Malformed(_)));
    }

    #[test]
    fn resubmission_is_already_known() {
        let (engine, _, funding) = setup();
        let tx = send(funding, 0);
        engine.admit(tx.clone()).unwrap();
        let again = engine.admit(tx).unwrap();
        assert_eq!(again.outcome, AdmissionOutcome::AlreadyKnown);
        assert_eq!(engine.snapshot().transactions, 1);
    }

    #[test]
    fn unknown_input_is_rejected() {
        let (engine, _, _) = setup();
        let missing = Outpoint::new(TxId::from_bytes([1; 32]), 4);
        let err = engine.admit(send(missing, 0)).unwrap_err();
        assert_eq!(err, AdmissionError::UnknownReference(missing));
    }

    #[test]
    fn pool_output_out_of_range_is_rejected() {
        let (engine, _, funding) = setup();
        let parent = send(funding, 0);
        engine.admit(parent.clone()).unwrap();
        let err = engine.admit(send(parent.outpoint(9), 0)).unwrap_err();
        assert_eq!(err, AdmissionError::UnknownReference(parent.outpoint(9)));
    }

    #[test]
    fn double_spend_of_final_incumbent_is_local_only() {
        let (engine, _, funding) = setup();
        engine.admit(send(funding, 0)).unwrap();
        let rival = engine.admit(send(funding, 1)).unwrap();
        assert_eq!(
            rival.outcome,
            AdmissionOutcome::Accepted {
                relay: RelayDecision::LocalOnly
            }
        );
    }

    #[test]
    fn double_spend_of_rbf_incumbent_is_broadcast() {
        let (engine, _, funding) = setup();
        let incumbent = TransactionBuilder::new(TransactionKind::AllocationSend)
            .rbf_input(funding)
            .output(10)
            .build();
        engine.admit(incumbent.clone()).unwrap();
        assert_eq!(engine.classify(&incumbent.txid()), ZdagStatus::WarningRbf);

        let rival = engine.admit(send(funding, 1)).unwrap();
        assert_eq!(
            rival.outcome,
            AdmissionOutcome::Accepted {
                relay: RelayDecision::Broadcast
            }
        );
        assert_eq!(engine.classify(&incumbent.txid()), ZdagStatus::MajorConflict);
        assert_eq!(engine.conflict_set(&rival.txid).len(), 2);
    }

    #[test]
    fn hard_limits_reject() {
        let ledger = MemoryLedger::new();
        let funding = Outpoint::new(TxId::from_bytes([7; 32]), 0);
        ledger.fund(funding);
        let engine = ZdagEngine::new(
            ledger,
            ZdagConfig {
                max_chain_depth: 2,
                zdag_max_depth: 1,
                ..Default::default()
            },
        );

        let a = send(funding, 0);
        let b = send(a.outpoint(1), 0);
        let c = send(b.outpoint(1), 0);
        engine.admit(a).unwrap();
        engine.admit(b.clone()).unwrap();
        assert_eq!(engine.classify(&b.txid()), ZdagStatus::WarningSizeOverPolicy);

        let err = engine.admit(c).unwrap_err();
        assert_eq!(
            err,
            AdmissionError::PolicyRejected(PolicyViolation::TooDeep { depth: 3, max: 2 })
        );
    }

    #[test]
    fn oversized_transaction_is_rejected_or_flagged() {
        let ledger = MemoryLedger::new();
        let funding = Outpoint::new(TxId::from_bytes([7; 32]), 0);
        ledger.fund(funding);
        let tx = send(funding, 0);
        let size = tx.encoded_size();

        let strict = ZdagEngine::new(
            &ledger,
            ZdagConfig {
                max_tx_size: size - 1,
                zdag_max_tx_size: size - 1,
                ..Default::default()
            },
        );
        assert!(matches!(
            strict.admit(tx.clone()),
            Err(AdmissionError::PolicyRejected(PolicyViolation::TooLarge { .. }))
        ));

        let soft = ZdagEngine::new(
            &ledger,
            ZdagConfig {
                zdag_max_tx_size: size - 1,
                ..Default::default()
            },
        );
        soft.admit(tx.clone()).unwrap();
        assert_eq!(soft.classify(&tx.txid()), ZdagStatus::WarningSizeOverPolicy);
    }

    #[test]
    fn full_pool_refuses() {
        let ledger = MemoryLedger::new();
        let a = Outpoint::new(TxId::from_bytes([1; 32]), 0);
        let b = Outpoint::new(TxId::from_bytes([2; 32]), 0);
        ledger.fund(a);
        ledger.fund(b);
        let engine = ZdagEngine::new(
            ledger,
            ZdagConfig {
                max_pool_size: 1,
                ..Default::default()
            },
        );
        engine.admit(send(a, 0)).unwrap();
        assert_eq!(
            engine.admit(send(b, 0)).unwrap_err(),
            AdmissionError::PoolFull { capacity: 1 }
        );
    }

    #[test]
    fn restricted_output_taints_every_consumer_downstream() {
        let (engine, _, funding) = setup();
        let update = TransactionBuilder::new(TransactionKind::AllocationSend)
            .input(funding)
            .asset_output(1, 42, 0, OutputRole::Restricted)
            .asset_output(1, 42, 100, OutputRole::Allocation)
            .build();
        engine.admit(update.clone()).unwrap();
        assert_eq!(engine.classify(&update.txid()), ZdagStatus::WarningNotZdagTx);

        let takes_restricted = send(update.outpoint(0), 0);
        let takes_allocation = send(update.outpoint(1), 0);
        engine.admit(takes_restricted.clone()).unwrap();
        engine.admit(takes_allocation.clone()).unwrap();
        assert_eq!(
            engine.classify(&takes_restricted.txid()),
            ZdagStatus::WarningNotZdagTx
        );
        assert_eq!(
            engine.classify(&takes_allocation.txid()),
            ZdagStatus::WarningNotZdagTx
        );

        let grandchild = send(takes_restricted.outpoint(1), 0);
        engine.admit(grandchild.clone()).unwrap();
        assert_eq!(engine.classify(&grandchild.txid()), ZdagStatus::WarningNotZdagTx);
    }

    #[test]
    fn burn_chain_is_not_zdag_but_bystanders_are_ok() {
        let ledger = Arc::new(MemoryLedger::new());
        let coins = Outpoint::new(TxId::from_bytes([7; 32]), 0);
        let other = Outpoint::new(TxId::from_bytes([8; 32]), 0);
        ledger.fund(coins);
        ledger.fund(other);
        let engine = ZdagEngine::new(Arc::clone(&ledger), ZdagConfig::default());

        let burn = TransactionBuilder::new(TransactionKind::AllocationBurnToEthereum)
            .input(coins)
            .asset_output(1, 42, 100, OutputRole::Allocation)
            .build();
        let spends_change = send(burn.outpoint(0), 0);
        let spends_again = send(spends_change.outpoint(0), 0);
        let bystander = send(other, 0);
        for tx in [&burn, &spends_change, &spends_again, &bystander] {
            engine.admit(tx.clone()).unwrap();
        }

        for tx in [&burn, &spends_change, &spends_again] {
            assert_eq!(engine.classify(&tx.txid()), ZdagStatus::WarningNotZdagTx);
        }
        assert_eq!(engine.classify(&bystander.txid()), ZdagStatus::Ok);
    }

    #[test]
    fn order_checks_match_block_events() {
        let (engine, _, _) = setup();
        assert!(engine.check_connect(40).is_ok());
        assert!(engine.check_disconnect(40).is_ok());

        engine
            .on_block_connected(&ConnectedBlock {
                height: 40,
                txids: Vec::new(),
            })
            .unwrap();
        assert!(engine.check_connect(41).is_ok());
        assert_eq!(
            engine.check_connect(43),
            Err(BlockEventError::OutOfOrder {
                expected: 41,
                got: 43
            })
        );
        assert!(engine.check_disconnect(40).is_ok());
        assert_eq!(
            engine.check_disconnect(41),
            Err(BlockEventError::OutOfOrder {
                expected: 40,
                got: 41
            })
        );
        assert_eq!(engine.snapshot().tip_height, Some(40));
    }

    #[test]
    fn block_heights_must_be_contiguous() {
        let (engine, _, _) = setup();
        let block = |height| ConnectedBlock {
            height,
            txids: Vec::new(),
        };

        engine.on_block_connected(&block(10)).unwrap();
        assert_eq!(
            engine.on_block_connected(&block(12)),
            Err(BlockEventError::OutOfOrder {
                expected: 11,
                got: 12
            })
        );
        assert_eq!(
            engine.on_block_connected(&block(10)),
            Err(BlockEventError::OutOfOrder {
                expected: 11,
                got: 10
            })
        );
        engine.on_block_connected(&block(11)).unwrap();

        let disconnect = |height| DisconnectedBlock {
            height,
            transactions: Vec::new(),
        };
        assert!(engine.on_block_disconnected(&disconnect(10)).is_err());
        engine.on_block_disconnected(&disconnect(11)).unwrap();
        assert_eq!(engine.snapshot().tip_height, Some(10));
    }

    #[test]
    fn expiry_evicts_old_entries_with_descendants() {
        let (engine, _, funding) = setup();
        let now = Utc::now();
        let long_ago = now - chrono::Duration::days(30);

        let old = send(funding, 0);
        let young_child = send(old.outpoint(1), 0);
        engine.admit_at(old.clone(), long_ago).unwrap();
        engine.admit_at(young_child.clone(), now).unwrap();

        let evicted = engine.expire(now);
        assert_eq!(evicted, vec![old.txid(), young_child.txid()]);
        assert_eq!(engine.classify(&young_child.txid()), ZdagStatus::NotFound);
        assert!(engine.expire(now).is_empty());
    }
}
