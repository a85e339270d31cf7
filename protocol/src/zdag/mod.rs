//! # ZDAG Module
//!
//! Zero-confirmation double-spend detection. Wallets and merchants ask "is
//! it safe to hand over the goods for this unconfirmed transfer?" and get a
//! [`ZdagStatus`] back instead of a shrug.
//!
//! ## Architecture
//!
//! ```text
//! engine.rs      — ZdagEngine: admission, queries, block events, expiry
//! classifier.rs  — Iterative ancestor walk computing a ZdagStatus
//! resolver.rs    — Block connect/disconnect handling and the input sweep
//! status.rs      — ZdagStatus and its wire codes
//! error.rs       — AdmissionError, BlockEventError
//! ```
//!
//! ## Design Decisions
//!
//! - One coarse `parking_lot::RwLock` around the whole pool. Finer locking
//!   buys nothing when a single admission touches all four indexes.
//! - A double-spend taints every descendant, no matter how deep. A non-ZDAG
//!   operation (ineligible kind or restricted output) taints itself and
//!   every transaction that consumes its outputs down the chain. Pool
//!   transactions that never consume them stay unaffected.
//! - Block events carry a height and must arrive in chain order. An event
//!   that does not line up with the tip is refused rather than guessed at.
//! - Confirmation ends classification. Anything that leaves the pool is
//!   `NOT_FOUND`; whether it confirmed or lost is the ledger's business.

pub mod classifier;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod status;

pub use engine::{Admission, AdmissionOutcome, ZdagEngine};
pub use error::{AdmissionError, BlockEventError, PolicyViolation};
pub use resolver::{BlockSummary, ConnectedBlock, DisconnectSummary, DisconnectedBlock};
pub use status::ZdagStatus;
