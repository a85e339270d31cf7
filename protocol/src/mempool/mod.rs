//! # Mempool Module
//!
//! The pending-transaction side of the engine: everything the node has seen
//! but no block has confirmed yet, plus the bookkeeping that relates those
//! transactions to each other.
//!
//! ## Architecture
//!
//! ```text
//! pool.rs       — Admitted transactions and their admission metadata
//! outpoints.rs  — Which pool transaction(s) consume each outpoint
//! graph.rs      — Parent/child links between pool transactions
//! conflicts.rs  — Union-find over transactions competing for an outpoint
//! state.rs      — PoolState aggregate keeping all four in step
//! ```
//!
//! ## Design Decisions
//!
//! - None of these types lock anything. They are plain owned data and the
//!   engine wraps a single [`PoolState`] in one `parking_lot::RwLock`, so a
//!   reader always sees the four components agree with each other.
//! - Removal is funnelled through [`PoolState`]. Removing a transaction from
//!   the pool but forgetting its graph edges is the classic way to end up
//!   with a conflict that outlives its cause.
//! - Every graph traversal is iterative. Deep chains are a policy problem,
//!   not a stack overflow.

pub mod conflicts;
pub mod graph;
pub mod outpoints;
pub mod pool;
pub mod state;

pub use conflicts::{ConflictSet, ConflictTracker};
pub use graph::DependencyGraph;
pub use outpoints::{Claim, OutpointIndex};
pub use pool::{Pool, PoolEntry, RelayDecision};
pub use state::{PoolState, PoolStats};
