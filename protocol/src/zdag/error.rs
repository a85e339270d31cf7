//! Error types for the ZDAG engine.
//!
//! Duplicate admissions and queries for purged ids are deliberately *not*
//! errors: the first is [`AdmissionOutcome::AlreadyKnown`], the second is
//! [`ZdagStatus::NotFound`].
//!
//! [`AdmissionOutcome::AlreadyKnown`]: super::AdmissionOutcome::AlreadyKnown
//! [`ZdagStatus::NotFound`]: super::ZdagStatus::NotFound

use thiserror::Error;

use crate::transaction::{DecodeError, Outpoint};

/// Which hard policy limit a transaction broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    /// Serialized size over `max_tx_size`.
    #[error("size {size} exceeds limit {max}")]
    TooLarge { size: usize, max: usize },

    /// In-pool ancestor chain longer than `max_chain_depth`.
    #[error("chain depth {depth} exceeds limit {max}")]
    TooDeep { depth: usize, max: usize },
}

/// Reasons a transaction was refused entry to the pool.
///
/// None of these are retried internally. `PolicyRejected` and `PoolFull` are
/// worth resubmitting later (smaller, or once the pool drains); the others
/// are not.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// The raw bytes did not decode into a well-formed transaction.
    #[error("malformed transaction: {0}")]
    Malformed(#[from] DecodeError),

    /// An input points at neither a confirmed unspent output nor an output
    /// of a pool transaction.
    #[error("input {0} resolves to no confirmed or pending output")]
    UnknownReference(Outpoint),

    /// A hard size or depth limit was exceeded.
    #[error("rejected by policy: {0}")]
    PolicyRejected(PolicyViolation),

    /// The pool is at capacity.
    #[error("pool full ({capacity} transactions)")]
    PoolFull { capacity: usize },
}

impl AdmissionError {
    /// Short machine-friendly label, used as a metrics label value.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::UnknownReference(_) => "unknown_reference",
            Self::PolicyRejected(PolicyViolation::TooLarge { .. }) => "too_large",
            Self::PolicyRejected(PolicyViolation::TooDeep { .. }) => "too_deep",
            Self::PoolFull { .. } => "pool_full",
        }
    }
}

/// Block events that cannot be applied to the current tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BlockEventError {
    /// The event's height does not line up with the tracked tip. Events must
    /// arrive in exact chain order; nothing was changed.
    #[error("out-of-order block event: expected height {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TxId;

    #[test]
    fn decode_errors_convert_into_malformed() {
        let err: AdmissionError = DecodeError::NoInputs.into();
        assert_eq!(err, AdmissionError::Malformed(DecodeError::NoInputs));
        assert_eq!(err.label(), "malformed");
    }

    #[test]
    fn messages_carry_context() {
        let outpoint = Outpoint::new(TxId::from_bytes([0xab; 32]), 3);
        let msg = AdmissionError::UnknownReference(outpoint).to_string();
        assert!(msg.contains(":3"));

        let msg = AdmissionError::PolicyRejected(PolicyViolation::TooDeep { depth: 101, max: 100 })
            .to_string();
        assert!(msg.contains("101"));

        let msg = BlockEventError::OutOfOrder { expected: 7, got: 9 }.to_string();
        assert!(msg.contains("expected height 7"));
    }
}
