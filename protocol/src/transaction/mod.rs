//! # Transaction Module
//!
//! The transaction model the pending pool works with: ids, outpoints, asset
//! outputs with role tags, operation kinds, and the canonical codec.
//!
//! ## Architecture
//!
//! ```text
//! types.rs   — TxId, Outpoint, inputs/outputs, OutputRole, TransactionKind
//! builder.rs — Transaction (encode/decode/txid) and TransactionBuilder
//! ```
//!
//! ## Design Decisions
//!
//! - Transaction ids are the BLAKE3 digest of the canonical `bincode`
//!   encoding. Decoding rejects non-canonical input (trailing bytes), so the
//!   id of a decoded transaction is always the hash of the bytes received.
//! - Replacement signalling is read from input sequence numbers rather than
//!   carried as a side flag, so it travels with the transaction.
//! - Asset outputs carry an explicit role tag. The classifier never guesses
//!   from amounts whether an output is an ownership marker.

pub mod builder;
pub mod types;

pub use builder::{DecodeError, Transaction, TransactionBuilder};
pub use types::{
    AssetOutput, Outpoint, OutputRole, ParseTxIdError, TransactionKind, TxId, TxInput, TxOutput,
};
