//! # Protocol Configuration & Constants
//!
//! Every magic number the ZDAG engine relies on lives here, alongside the
//! runtime [`ZdagConfig`] that node operators tune. If you're hardcoding a
//! limit somewhere else, move it here.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Transaction Limits
// ---------------------------------------------------------------------------

/// Maximum number of inputs per transaction. Keeps decoding bounded.
pub const MAX_TX_INPUTS: usize = 2_048;

/// Maximum number of outputs per transaction.
pub const MAX_TX_OUTPUTS: usize = 2_048;

/// Absolute ceiling on serialized transaction size. Anything larger is
/// rejected before it gets near the pool.
pub const MAX_STANDARD_TX_SIZE: usize = 100_000;

/// Sequence value at or above which an input does *not* opt into fee-based
/// replacement. Inputs below it signal replaceability.
pub const RBF_SEQUENCE_THRESHOLD: u32 = 0xFFFF_FFFE;

/// Final sequence number. Used by builders as the "no replacement" default.
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

// ---------------------------------------------------------------------------
// ZDAG Policy
// ---------------------------------------------------------------------------

/// Serialized size above which a transaction loses the fast-path guarantee
/// and is flagged `WARNING_SIZE_OVER_POLICY`.
pub const ZDAG_MAX_TX_SIZE: usize = 1_100;

/// In-pool ancestor depth above which a transaction is flagged
/// `WARNING_SIZE_OVER_POLICY`.
pub const ZDAG_MAX_DEPTH: usize = 25;

/// Hard limit on in-pool ancestor depth. Deeper chains are rejected.
pub const MAX_CHAIN_DEPTH: usize = 100;

/// Maximum number of transactions held in the pending pool.
pub const MAX_POOL_SIZE: usize = 50_000;

/// Pending transactions older than this are evicted by the expiry sweep.
pub const POOL_EXPIRY: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Upper bound on the initial relay delay used by the reference network.
/// Nothing in classification depends on it; see [`ZdagConfig`].
pub const MAX_INITIAL_BROADCAST_DELAY: Duration = Duration::from_secs(15 * 60);

// ---------------------------------------------------------------------------
// ZdagConfig
// ---------------------------------------------------------------------------

/// Tunable parameters for the pending pool and the ZDAG classifier.
///
/// Defaults mirror the constants above. Regtest-style deployments usually
/// shrink `expiry` and the pool size; nothing else needs touching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZdagConfig {
    /// Maximum number of transactions the pool will hold.
    pub max_pool_size: usize,

    /// Hard serialized-size limit. Larger transactions are rejected.
    pub max_tx_size: usize,

    /// Hard in-pool ancestor depth limit. Deeper transactions are rejected.
    pub max_chain_depth: usize,

    /// Soft size limit for the fast-path guarantee.
    pub zdag_max_tx_size: usize,

    /// Soft depth limit for the fast-path guarantee.
    pub zdag_max_depth: usize,

    /// Age after which a pending transaction is evicted by
    /// [`crate::zdag::ZdagEngine::expire`].
    pub expiry: Duration,

    /// Relay-side initial broadcast delay. Carried for the relay
    /// collaborator; the classifier does not read it.
    pub initial_broadcast_delay: Duration,
}

impl Default for ZdagConfig {
    fn default() -> Self {
        Self {
            max_pool_size: MAX_POOL_SIZE,
            max_tx_size: MAX_STANDARD_TX_SIZE,
            max_chain_depth: MAX_CHAIN_DEPTH,
            zdag_max_tx_size: ZDAG_MAX_TX_SIZE,
            zdag_max_depth: ZDAG_MAX_DEPTH,
            expiry: POOL_EXPIRY,
            initial_broadcast_delay: MAX_INITIAL_BROADCAST_DELAY,
        }
    }
}

impl ZdagConfig {
    /// Returns `true` when the soft limits sit inside the hard ones. A
    /// config where the soft limit exceeds the hard limit never flags
    /// anything, which is almost certainly an operator mistake.
    pub fn is_consistent(&self) -> bool {
        self.zdag_max_tx_size <= self.max_tx_size
            && self.zdag_max_depth <= self.max_chain_depth
            && self.max_pool_size > 0
    }
}
