// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ZDAG Protocol — Core Library
//!
//! Zero-confirmation double-spend detection for a UTXO ledger with assets
//! layered on top. Blocks take minutes; a coffee queue does not. This crate
//! tracks every unconfirmed transaction the node has seen, notices when two
//! of them fight over the same coin, and tells callers how much they should
//! trust a transfer before it confirms.
//!
//! It does not validate scripts, run consensus or gossip. Those belong to
//! the collaborators on either side of it.
//!
//! ## Architecture
//!
//! - **transaction** — Transaction model, canonical codec, builder.
//! - **ledger** — The confirmed-UTXO view the pool consults, plus an
//!   in-memory implementation.
//! - **mempool** — Pool, outpoint index, dependency graph, conflict sets.
//! - **zdag** — The engine: admission, classification, block events.
//! - **config** — Protocol constants and tunable policy.
//!
//! ## Design Philosophy
//!
//! 1. A double-spend is contagious. Everything downstream of it is suspect.
//! 2. Nothing in here does I/O, so nothing in here blocks beyond a lock.
//! 3. Malformed input is an error value, never a panic.
//! 4. Deep chains are a policy decision, not a stack overflow.

pub mod config;
pub mod ledger;
pub mod mempool;
pub mod transaction;
pub mod zdag;

pub use config::ZdagConfig;
pub use ledger::{LedgerDelta, LedgerView, MemoryLedger};
pub use transaction::{Transaction, TransactionBuilder, TxId};
pub use zdag::{AdmissionError, ZdagEngine, ZdagStatus};
