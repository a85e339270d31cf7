//! Core type definitions for ledger transactions.
//!
//! These types form the vocabulary shared by the codec, the pool components
//! and the classifier. They are kept small and `Copy` where possible since
//! outpoints and ids are cloned on every index update.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::config::RBF_SEQUENCE_THRESHOLD;

// ---------------------------------------------------------------------------
// TxId
// ---------------------------------------------------------------------------

/// A transaction identifier: the BLAKE3 digest of the canonical encoding.
///
/// Serialized as raw bytes in binary formats and as lowercase hex in
/// human-readable ones (JSON scenario files, logs).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TxId([u8; 32]);

impl TxId {
    /// Wraps a raw 32-byte digest.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight bytes are plenty to tell pool entries apart in test output.
        write!(f, "TxId({}..)", &self.to_hex()[..16])
    }
}

/// Error returned when parsing a [`TxId`] from hex.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transaction id: {0}")]
pub struct ParseTxIdError(String);

impl FromStr for TxId {
    type Err = ParseTxIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| ParseTxIdError(e.to_string()))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| ParseTxIdError(format!("expected 32 bytes, got {}", v.len())))?;
        Ok(Self(array))
    }
}

impl Serialize for TxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            struct HexVisitor;

            impl<'de> Visitor<'de> for HexVisitor {
                type Value = TxId;

                fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str("a 64-character hex transaction id")
                }

                fn visit_str<E: de::Error>(self, v: &str) -> Result<TxId, E> {
                    v.parse().map_err(E::custom)
                }
            }

            deserializer.deserialize_str(HexVisitor)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(TxId)
        }
    }
}

// ---------------------------------------------------------------------------
// Outpoint
// ---------------------------------------------------------------------------

/// Reference to one specific output of one specific transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Outpoint {
    /// The transaction that produced the output.
    pub txid: TxId,
    /// Index into the producing transaction's outputs.
    pub vout: u32,
}

impl Outpoint {
    /// Creates a new outpoint.
    pub fn new(txid: TxId, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// A consumed reference plus its replacement-signalling sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// The outpoint being spent.
    pub prevout: Outpoint,
    /// Sequence number. Values below [`RBF_SEQUENCE_THRESHOLD`] opt the
    /// spending transaction into fee-based replacement.
    pub sequence: u32,
}

impl TxInput {
    /// Returns `true` if this input signals replaceability.
    pub fn signals_rbf(&self) -> bool {
        self.sequence < RBF_SEQUENCE_THRESHOLD
    }
}

/// What an asset-carrying output is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputRole {
    /// Plain transferable balance. Spendable on the fast path.
    Allocation,
    /// Ownership, parameter-update or burn output. Not simple value
    /// transfer, so anything consuming it loses the fast-path guarantee.
    Restricted,
}

/// Asset metadata attached to an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetOutput {
    /// Asset identifier.
    pub asset_guid: u32,
    /// Amount of the asset carried by this output.
    pub amount: u64,
    /// Role tag.
    pub role: OutputRole,
}

/// A produced output: base-coin value plus optional asset metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Base-coin value in the smallest unit.
    pub value: u64,
    /// Asset transfer metadata, if any.
    pub asset: Option<AssetOutput>,
}

impl TxOutput {
    /// Returns `true` if this output is tagged [`OutputRole::Restricted`].
    pub fn is_restricted(&self) -> bool {
        matches!(
            self.asset,
            Some(AssetOutput {
                role: OutputRole::Restricted,
                ..
            })
        )
    }
}

// ---------------------------------------------------------------------------
// TransactionKind
// ---------------------------------------------------------------------------

/// The operation a transaction performs on the asset layer.
///
/// The kind decides whether a transaction can ever be a fast-path (ZDAG)
/// transaction. Only plain base-coin transfers and allocation sends qualify;
/// everything touching ownership, issuance or bridges does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Base-coin transfer with no asset semantics.
    Standard,
    /// Asset creation.
    AssetActivate,
    /// Asset parameter update (moves the ownership output).
    AssetUpdate,
    /// Issuance of supply from the asset owner.
    AssetSend,
    /// Transfer of allocation balance between holders.
    AllocationSend,
    /// Burn of allocation balance towards the Ethereum bridge.
    AllocationBurnToEthereum,
    /// Burn of allocation balance back into the base coin.
    AllocationBurnToNative,
    /// Burn of base coin into an allocation.
    NativeBurnToAllocation,
    /// Mint of allocation backed by a bridge proof.
    AllocationMint,
}

impl TransactionKind {
    /// Every kind, in wire-discriminant order.
    pub const ALL: [TransactionKind; 9] = [
        Self::Standard,
        Self::AssetActivate,
        Self::AssetUpdate,
        Self::AssetSend,
        Self::AllocationSend,
        Self::AllocationBurnToEthereum,
        Self::AllocationBurnToNative,
        Self::NativeBurnToAllocation,
        Self::AllocationMint,
    ];

    /// Returns `true` for kinds that may receive the fast-path guarantee.
    pub fn is_zdag_eligible(&self) -> bool {
        matches!(self, Self::Standard | Self::AllocationSend)
    }

    /// Returns `true` for kinds that carry asset metadata at all.
    pub fn is_asset_operation(&self) -> bool {
        !matches!(self, Self::Standard)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Standard => "standard",
            Self::AssetActivate => "assetactivate",
            Self::AssetUpdate => "assetupdate",
            Self::AssetSend => "assetsend",
            Self::AllocationSend => "assetallocationsend",
            Self::AllocationBurnToEthereum => "assetallocationburntoethereum",
            Self::AllocationBurnToNative => "assetallocationburntonative",
            Self::NativeBurnToAllocation => "nativeburntoassetallocation",
            Self::AllocationMint => "assetallocationmint",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
