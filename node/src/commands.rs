//! # Command Processor
//!
//! The JSON command language spoken by `replay` and `run`. One command in,
//! one reply out. The processor owns an in-memory ledger standing in for the
//! consensus engine, keeps it in step with block commands, and forwards
//! everything else to the [`ZdagEngine`].
//!
//! ```text
//! {"op":"fund","outpoints":[{"txid":"ab..","vout":0}]}
//! {"op":"submit","raw":"<hex>"}
//! {"op":"classify","txid":"<hex>"}
//! {"op":"connect","height":101,"transactions":["<hex>", ...]}
//! {"op":"disconnect","height":101,"transactions":["<hex>", ...]}
//! {"op":"expire"}
//! {"op":"stats"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use zdag_protocol::config::ZdagConfig;
use zdag_protocol::ledger::MemoryLedger;
use zdag_protocol::mempool::{PoolStats, RelayDecision};
use zdag_protocol::transaction::{Outpoint, Transaction, TxId};
use zdag_protocol::zdag::{
    Admission, AdmissionOutcome, BlockSummary, ConnectedBlock, DisconnectSummary,
    DisconnectedBlock, ZdagEngine, ZdagStatus,
};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// A single command.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Add confirmed unspent outputs to the ledger.
    Fund { outpoints: Vec<Outpoint> },
    /// Submit a hex-encoded raw transaction.
    Submit { raw: String },
    /// Classify a transaction id.
    Classify { txid: TxId },
    /// Connect the next block.
    Connect {
        height: u64,
        transactions: Vec<String>,
    },
    /// Disconnect the tip block.
    Disconnect {
        height: u64,
        transactions: Vec<String>,
    },
    /// Run an expiry sweep, at `now` or the current time.
    Expire {
        #[serde(default)]
        now: Option<DateTime<Utc>>,
    },
    /// Report pool counters.
    Stats,
}

/// The reply to a single command.
#[derive(Debug, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    Funded {
        count: usize,
    },
    Admitted(Admission),
    Rejected {
        #[serde(skip_serializing_if = "Option::is_none")]
        txid: Option<TxId>,
        reason: &'static str,
        message: String,
    },
    Status {
        txid: TxId,
        status: ZdagStatus,
        code: i8,
    },
    Connected(BlockSummary),
    Disconnected(DisconnectSummary),
    Expired {
        evicted: Vec<TxId>,
    },
    Stats(PoolStats),
    Error {
        message: String,
    },
}

impl Reply {
    fn error(message: impl Into<String>) -> Self {
        Reply::Error {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Executes commands against an engine and its ledger.
pub struct Processor {
    ledger: Arc<MemoryLedger>,
    engine: ZdagEngine<Arc<MemoryLedger>>,
    metrics: SharedMetrics,
}

impl Processor {
    /// Creates a processor with an empty ledger and pool.
    pub fn new(config: ZdagConfig, metrics: SharedMetrics) -> Self {
        let ledger = Arc::new(MemoryLedger::new());
        Self {
            engine: ZdagEngine::new(Arc::clone(&ledger), config),
            ledger,
            metrics,
        }
    }

    /// Parses and executes one line of NDJSON.
    pub fn execute_line(&self, line: &str) -> Reply {
        match serde_json::from_str::<Command>(line) {
            Ok(command) => self.execute(command),
            Err(e) => Reply::error(format!("invalid command: {e}")),
        }
    }

    /// Executes one command.
    pub fn execute(&self, command: Command) -> Reply {
        let reply = match command {
            Command::Fund { outpoints } => {
                for outpoint in &outpoints {
                    self.ledger.fund(*outpoint);
                }
                Reply::Funded {
                    count: outpoints.len(),
                }
            }
            Command::Submit { raw } => self.submit(&raw),
            Command::Classify { txid } => self.classify(txid),
            Command::Connect {
                height,
                transactions,
            } => self.connect(height, &transactions),
            Command::Disconnect {
                height,
                transactions,
            } => self.disconnect(height, &transactions),
            Command::Expire { now } => {
                let evicted = self.engine.expire(now.unwrap_or_else(Utc::now));
                self.metrics.evictions_total.inc_by(evicted.len() as u64);
                Reply::Expired { evicted }
            }
            Command::Stats => Reply::Stats(self.engine.snapshot()),
        };
        self.metrics.observe_pool(&self.engine.snapshot());
        reply
    }

    fn submit(&self, raw: &str) -> Reply {
        let bytes = match hex::decode(raw.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.metrics
                    .rejections_total
                    .with_label_values(&["malformed"])
                    .inc();
                return Reply::Rejected {
                    txid: None,
                    reason: "malformed",
                    message: format!("invalid hex: {e}"),
                };
            }
        };

        match self.engine.submit(&bytes) {
            Ok(admission) => {
                let outcome = match admission.outcome {
                    AdmissionOutcome::Accepted {
                        relay: RelayDecision::Broadcast,
                    } => "broadcast",
                    AdmissionOutcome::Accepted {
                        relay: RelayDecision::LocalOnly,
                    } => "local_only",
                    AdmissionOutcome::AlreadyKnown => "already_known",
                };
                self.metrics
                    .admissions_total
                    .with_label_values(&[outcome])
                    .inc();
                if admission.is_accepted() && !self.engine.conflict_set(&admission.txid).is_empty()
                {
                    self.metrics.conflicts_detected_total.inc();
                }
                Reply::Admitted(admission)
            }
            Err(err) => {
                self.metrics
                    .rejections_total
                    .with_label_values(&[err.label()])
                    .inc();
                tracing::info!(reason = err.label(), "submission rejected: {err}");
                Reply::Rejected {
                    txid: Transaction::decode(&bytes).ok().map(|tx| tx.txid()),
                    reason: err.label(),
                    message: err.to_string(),
                }
            }
        }
    }

    fn classify(&self, txid: TxId) -> Reply {
        let started = Instant::now();
        let status = self.engine.classify(&txid);
        self.metrics
            .classify_latency_seconds
            .observe(started.elapsed().as_secs_f64());
        self.metrics
            .classifications_total
            .with_label_values(&[status.as_str()])
            .inc();
        Reply::Status {
            txid,
            status,
            code: status.code(),
        }
    }

    fn connect(&self, height: u64, raw: &[String]) -> Reply {
        let transactions = match decode_all(raw) {
            Ok(txs) => txs,
            Err(message) => return Reply::error(message),
        };

        if let Err(e) = self.engine.check_connect(height) {
            return Reply::error(e.to_string());
        }

        let delta = self.ledger.apply_block(&transactions);
        let block = ConnectedBlock {
            height,
            txids: transactions.iter().map(Transaction::txid).collect(),
        };
        match self.engine.on_block_connected(&block) {
            Ok(summary) => {
                self.metrics.blocks_connected_total.inc();
                self.metrics
                    .evictions_total
                    .inc_by(summary.evicted.len() as u64);
                Reply::Connected(summary)
            }
            Err(e) => {
                self.ledger.undo(&delta);
                Reply::error(e.to_string())
            }
        }
    }

    fn disconnect(&self, height: u64, raw: &[String]) -> Reply {
        let transactions = match decode_all(raw) {
            Ok(txs) => txs,
            Err(message) => return Reply::error(message),
        };

        if let Err(e) = self.engine.check_disconnect(height) {
            return Reply::error(e.to_string());
        }

        let delta = self.ledger.revert_block(&transactions);
        let block = DisconnectedBlock {
            height,
            transactions,
        };
        match self.engine.on_block_disconnected(&block) {
            Ok(summary) => {
                self.metrics.blocks_disconnected_total.inc();
                self.metrics
                    .evictions_total
                    .inc_by(summary.evicted.len() as u64);
                Reply::Disconnected(summary)
            }
            Err(e) => {
                self.ledger.undo(&delta);
                Reply::error(e.to_string())
            }
        }
    }
}

fn decode_all(raw: &[String]) -> Result<Vec<Transaction>, String> {
    raw.iter()
        .enumerate()
        .map(|(i, hex_tx)| {
            let bytes =
                hex::decode(hex_tx.trim()).map_err(|e| format!("transaction {i}: invalid hex: {e}"))?;
            Transaction::decode(&bytes).map_err(|e| format!("transaction {i}: {e}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::EngineMetrics;
    use serde_json::{json, Value};
    use zdag_protocol::ledger::LedgerView;
    use zdag_protocol::transaction::{OutputRole, TransactionBuilder, TransactionKind};

    fn processor() -> Processor {
        let metrics = Arc::new(EngineMetrics::new().unwrap());
        Processor::new(ZdagConfig::default(), metrics)
    }

    fn funding() -> Outpoint {
        Outpoint::new(TxId::from_bytes([0xf0; 32]), 0)
    }

    fn transfer(prevout: Outpoint, tag: u32) -> Transaction {
        TransactionBuilder::new(TransactionKind::AllocationSend)
            .input(prevout)
            .asset_output(1, 7, 60, OutputRole::Allocation)
            .lock_time(tag)
            .build()
    }

    fn run(p: &Processor, command: Value) -> Value {
        let reply = p.execute_line(&command.to_string());
        serde_json::to_value(reply).unwrap()
    }

    #[test]
    fn double_spend_then_block_round_trip() {
        let p = processor();
        let a = transfer(funding(), 1);
        let b = transfer(funding(), 2);

        let funded = run(&p, json!({"op": "fund", "outpoints": [funding()]}));
        assert_eq!(funded, json!({"reply": "funded", "count": 1}));

        let first = run(&p, json!({"op": "submit", "raw": hex::encode(a.encode())}));
        assert_eq!(first["reply"], "admitted");
        assert_eq!(first["result"], "accepted");
        assert_eq!(first["relay"], "broadcast");
        assert_eq!(first["txid"], a.txid().to_hex());

        let second = run(&p, json!({"op": "submit", "raw": hex::encode(b.encode())}));
        assert_eq!(second["relay"], "local_only");

        let status = run(&p, json!({"op": "classify", "txid": a.txid()}));
        assert_eq!(status["status"], "MAJOR_CONFLICT");
        assert_eq!(status["code"], 4);

        let connected = run(
            &p,
            json!({"op": "connect", "height": 1, "transactions": [hex::encode(b.encode())]}),
        );
        assert_eq!(connected["reply"], "connected");
        assert_eq!(connected["confirmed"], json!([b.txid()]));
        assert_eq!(connected["evicted"], json!([a.txid()]));

        let status = run(&p, json!({"op": "classify", "txid": a.txid()}));
        assert_eq!(status["status"], "NOT_FOUND");
        assert_eq!(status["code"], -1);

        let text = p.metrics.encode().unwrap();
        assert!(text.contains("zdag_conflicts_detected_total 1"));
        assert!(text.contains("zdag_evictions_total 1"));
    }

    #[test]
    fn unknown_reference_is_reported() {
        let p = processor();
        let tx = transfer(funding(), 1);
        let reply = run(&p, json!({"op": "submit", "raw": hex::encode(tx.encode())}));
        assert_eq!(reply["reply"], "rejected");
        assert_eq!(reply["reason"], "unknown_reference");
        assert_eq!(reply["txid"], tx.txid().to_hex());
    }

    #[test]
    fn bad_input_never_panics() {
        let p = processor();
        assert_eq!(run(&p, json!({"op": "nope"}))["reply"], "error");
        assert_eq!(
            run(&p, json!({"op": "submit", "raw": "zz"}))["reason"],
            "malformed"
        );
        assert_eq!(
            run(&p, json!({"op": "submit", "raw": "00"}))["reason"],
            "malformed"
        );
        assert_eq!(
            run(&p, json!({"op": "connect", "height": 1, "transactions": ["00"]}))["reply"],
            "error"
        );
        assert!(matches!(p.execute_line("not json"), Reply::Error { .. }));
    }

    #[test]
    fn refused_block_leaves_ledger_untouched() {
        let p = processor();
        run(&p, json!({"op": "fund", "outpoints": [funding()]}));
        run(&p, json!({"op": "connect", "height": 5, "transactions": []}));

        let never_funded = Outpoint::new(TxId::from_bytes([0xee; 32]), 0);
        let tx = TransactionBuilder::new(TransactionKind::AllocationSend)
            .input(funding())
            .input(never_funded)
            .asset_output(1, 7, 60, OutputRole::Allocation)
            .build();
        let reply = run(
            &p,
            json!({"op": "connect", "height": 9, "transactions": [hex::encode(tx.encode())]}),
        );
        assert_eq!(reply["reply"], "error");
        assert!(p.ledger.is_unspent(&funding()));
        assert!(!p.ledger.is_unspent(&never_funded));
        assert!(!p.ledger.is_unspent(&tx.outpoint(0)));

        let spends_never_funded = transfer(never_funded, 1);
        let rejected = run(
            &p,
            json!({"op": "submit", "raw": hex::encode(spends_never_funded.encode())}),
        );
        assert_eq!(rejected["reason"], "unknown_reference");

        // The funding output is still spendable.
        let admitted = run(
            &p,
            json!({"op": "submit", "raw": hex::encode(transfer(funding(), 2).encode())}),
        );
        assert_eq!(admitted["reply"], "admitted");
    }

    #[test]
    fn refused_disconnect_leaves_ledger_untouched() {
        let p = processor();
        run(&p, json!({"op": "fund", "outpoints": [funding()]}));
        let tx = transfer(funding(), 1);
        let raw = hex::encode(tx.encode());
        run(&p, json!({"op": "connect", "height": 5, "transactions": [raw.clone()]}));
        assert!(p.ledger.is_unspent(&tx.outpoint(0)));

        let never_funded = Outpoint::new(TxId::from_bytes([0xee; 32]), 0);
        let stranger = transfer(never_funded, 2);
        let reply = run(
            &p,
            json!({"op": "disconnect", "height": 4, "transactions": [hex::encode(stranger.encode())]}),
        );
        assert_eq!(reply["reply"], "error");
        assert!(p.ledger.is_unspent(&tx.outpoint(0)));
        assert!(!p.ledger.is_unspent(&funding()));
        assert!(!p.ledger.is_unspent(&never_funded));
        assert_eq!(p.engine.snapshot().tip_height, Some(5));

        let reply = run(&p, json!({"op": "disconnect", "height": 5, "transactions": [raw]}));
        assert_eq!(reply["reply"], "disconnected");
        assert!(p.ledger.is_unspent(&funding()));
        assert!(p.engine.contains(&tx.txid()));
    }

    #[test]
    fn stats_report_tip() {
        let p = processor();
        run(&p, json!({"op": "connect", "height": 3, "transactions": []}));
        let stats = run(&p, json!({"op": "stats"}));
        assert_eq!(stats["reply"], "stats");
        assert_eq!(stats["tip_height"], 3);
        assert_eq!(stats["transactions"], 0);
    }
}
