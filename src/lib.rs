//! # cashew-set
//!
//! A cache-conscious ordered set backed by a B-tree whose nodes are sized
//! and aligned to exactly one 64-byte CPU cache line.
//!
//! ## Design
//!
//! - Each node is exactly [`CACHE_LINE_BYTES`] bytes: one owning child-array
//!   pointer, a one-byte element count, and as many key slots as fit in the
//!   remainder. Probing a node costs a single cache fill.
//! - Children come in "families": a contiguous, cache-line-aligned block of
//!   `M + 1` nodes owned uniquely by their parent node. The root node is
//!   embedded directly in the set, so root-level probing needs zero
//!   indirections.
//! - Keys within a node are **not** sorted. Descent picks the child whose
//!   index equals the number of keys strictly less than the query.
//! - Splits happen around the key being inserted, not around the median.
//!   This keeps the split arithmetic uniform but legitimately produces
//!   interior nodes with zero keys; see [`CashewSet`] for details.
//!
//! ## Example
//!
//! ```rust
//! use cashew_set::{CashewSet, node_capacity};
//!
//! let mut set: CashewSet<i32, { node_capacity::<i32>() }> = CashewSet::new();
//! assert!(set.insert(7).unwrap());
//! assert!(!set.insert(7).unwrap());
//! assert_eq!(set.count(&7), 1);
//! assert_eq!(set.count(&8), 0);
//! ```
//!
//! ## Scope
//!
//! Membership, insertion, clearing, and size queries only. No deletion,
//! no iteration, no range queries. Mutation is single-threaded; a
//! quiescent set may be shared read-only across threads.

pub mod compare;
mod error;
mod family;
pub mod layout;
mod node;
mod set;
mod split;
mod tracing_helpers;

pub use compare::{KeyEq, KeyLess, NaturalEq, NaturalLess};
pub use error::InsertError;
pub use layout::{CACHE_LINE_BYTES, node_capacity};
pub use set::CashewSet;
