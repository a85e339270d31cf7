//! Transaction structure, canonical codec and builder.
//!
//! A [`Transaction`] is a value object: its id is the BLAKE3 digest of its
//! canonical `bincode` encoding, so two transactions with the same id are the
//! same transaction. [`TransactionBuilder`] assembles them for tests, benches
//! and the node harness.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use super::types::{AssetOutput, Outpoint, OutputRole, TransactionKind, TxId, TxInput, TxOutput};
use crate::config::{MAX_TX_INPUTS, MAX_TX_OUTPUTS, SEQUENCE_FINAL};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Reasons a raw transaction could not be decoded into a [`Transaction`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The bytes are not a valid encoding.
    #[error("malformed encoding: {0}")]
    Encoding(String),

    /// The encoding is valid but followed by extra bytes.
    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),

    /// The transaction spends nothing.
    #[error("transaction has no inputs")]
    NoInputs,

    /// The transaction produces nothing.
    #[error("transaction has no outputs")]
    NoOutputs,

    /// Too many inputs.
    #[error("too many inputs: {count} (max {max})")]
    TooManyInputs { count: usize, max: usize },

    /// Too many outputs.
    #[error("too many outputs: {count} (max {max})")]
    TooManyOutputs { count: usize, max: usize },

    /// The same outpoint appears twice in the input list.
    #[error("duplicate input {0}")]
    DuplicateInput(Outpoint),
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A ledger transaction as seen by the pending pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// The asset-layer operation this transaction performs.
    pub kind: TransactionKind,
    /// Consumed outpoints, in order.
    pub inputs: Vec<TxInput>,
    /// Produced outputs, in order.
    pub outputs: Vec<TxOutput>,
    /// Lock time. Also handy for making otherwise-identical test
    /// transactions distinct.
    pub lock_time: u32,
}

impl Transaction {
    /// Returns the canonical byte encoding.
    pub fn encode(&self) -> Vec<u8> {
        // Serializing plain structs and vectors into a Vec cannot fail.
        bincode::serialize(self).unwrap_or_default()
    }

    /// Decodes and structurally checks a raw transaction.
    ///
    /// Only the canonical encoding is accepted; trailing bytes are an error
    /// so that `decode(raw).txid()` always hashes exactly `raw`.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let tx: Transaction =
            bincode::deserialize(raw).map_err(|e| DecodeError::Encoding(e.to_string()))?;

        let consumed = tx.encoded_size();
        if consumed != raw.len() {
            return Err(DecodeError::TrailingBytes(raw.len().saturating_sub(consumed)));
        }

        tx.check_structure()?;
        Ok(tx)
    }

    /// Structural checks that do not need any context.
    pub fn check_structure(&self) -> Result<(), DecodeError> {
        if self.inputs.is_empty() {
            return Err(DecodeError::NoInputs);
        }
        if self.outputs.is_empty() {
            return Err(DecodeError::NoOutputs);
        }
        if self.inputs.len() > MAX_TX_INPUTS {
            return Err(DecodeError::TooManyInputs {
                count: self.inputs.len(),
                max: MAX_TX_INPUTS,
            });
        }
        if self.outputs.len() > MAX_TX_OUTPUTS {
            return Err(DecodeError::TooManyOutputs {
                count: self.outputs.len(),
                max: MAX_TX_OUTPUTS,
            });
        }

        let mut seen = HashSet::with_capacity(self.inputs.len());
        for input in &self.inputs {
            if !seen.insert(input.prevout) {
                return Err(DecodeError::DuplicateInput(input.prevout));
            }
        }
        Ok(())
    }

    /// Computes the transaction id: `blake3(encode())`.
    pub fn txid(&self) -> TxId {
        TxId::from_bytes(*blake3::hash(&self.encode()).as_bytes())
    }

    /// Serialized size in bytes.
    pub fn encoded_size(&self) -> usize {
        bincode::serialized_size(self).map(|n| n as usize).unwrap_or(0)
    }

    /// Returns `true` if any input opts into fee-based replacement.
    pub fn signals_rbf(&self) -> bool {
        self.inputs.iter().any(TxInput::signals_rbf)
    }

    /// Returns `true` if any output is tagged restricted.
    pub fn has_restricted_output(&self) -> bool {
        self.outputs.iter().any(TxOutput::is_restricted)
    }

    /// Returns the outpoint referring to output `vout` of this transaction.
    pub fn outpoint(&self, vout: u32) -> Outpoint {
        Outpoint::new(self.txid(), vout)
    }

    /// Iterates over the outpoints this transaction consumes.
    pub fn prevouts(&self) -> impl Iterator<Item = &Outpoint> {
        self.inputs.iter().map(|i| &i.prevout)
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Transaction`] instances.
///
/// ```rust
/// use zdag_protocol::transaction::{OutputRole, TransactionBuilder, TransactionKind, TxId};
/// use zdag_protocol::transaction::Outpoint;
///
/// let funding = Outpoint::new(TxId::from_bytes([1; 32]), 0);
/// let tx = TransactionBuilder::new(TransactionKind::AllocationSend)
///     .input(funding)
///     .asset_output(0, 42, 1_000, OutputRole::Allocation)
///     .output(50_000)
///     .build();
/// assert_eq!(tx.outputs.len(), 2);
/// ```
pub struct TransactionBuilder {
    kind: TransactionKind,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    lock_time: u32,
}

impl TransactionBuilder {
    /// Creates a new builder for the given kind with no inputs or outputs.
    pub fn new(kind: TransactionKind) -> Self {
        Self {
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }

    /// Adds a final (non-replaceable) input.
    pub fn input(self, prevout: Outpoint) -> Self {
        self.input_with_sequence(prevout, SEQUENCE_FINAL)
    }

    /// Adds an input that opts into fee-based replacement.
    pub fn rbf_input(self, prevout: Outpoint) -> Self {
        self.input_with_sequence(prevout, 0)
    }

    /// Adds an input with an explicit sequence number.
    pub fn input_with_sequence(mut self, prevout: Outpoint, sequence: u32) -> Self {
        self.inputs.push(TxInput { prevout, sequence });
        self
    }

    /// Adds a plain base-coin output.
    pub fn output(mut self, value: u64) -> Self {
        self.outputs.push(TxOutput { value, asset: None });
        self
    }

    /// Adds an asset-carrying output.
    pub fn asset_output(mut self, value: u64, asset_guid: u32, amount: u64, role: OutputRole) -> Self {
        self.outputs.push(TxOutput {
            value,
            asset: Some(AssetOutput {
                asset_guid,
                amount,
                role,
            }),
        });
        self
    }

    /// Sets the lock time.
    pub fn lock_time(mut self, lock_time: u32) -> Self {
        self.lock_time = lock_time;
        self
    }

    /// Consumes the builder and returns the transaction.
    pub fn build(self) -> Transaction {
        Transaction {
            kind: self.kind,
            inputs: self.inputs,
            outputs: self.outputs,
            lock_time: self.lock_time,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
