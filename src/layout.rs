//! Filepath: src/layout.rs
//!
//! Cache-line layout arithmetic.
//!
//! Every tree node must occupy exactly one cache line, so the number of
//! key slots per node is derived from the key size: whatever is left of
//! the line after one child-array pointer and a one-byte element count.
//!
//! 64 bytes is the line size of current Intel, AMD, and most ARM parts
//! through all levels of their cache hierarchies. IBM Power's 128-byte
//! lines are not supported.

use std::mem::size_of;

/// Cache-line size in bytes. Node size and all family allocations are
/// exact multiples of this.
pub const CACHE_LINE_BYTES: usize = 64;

/// Integer type counting live keys in a node. One byte is plenty: the
/// widest node (1-byte keys) holds 55 keys.
pub(crate) type KeyCount = u8;

/// Maximum number of keys a single node can hold for key type `K`.
///
/// This is the value to pass as the `M` const parameter of
/// [`CashewSet`](crate::CashewSet); any other value is a compile error.
///
/// ```rust
/// use cashew_set::node_capacity;
///
/// assert_eq!(node_capacity::<u64>(), 6);
/// ```
#[must_use]
pub const fn node_capacity<K>() -> usize {
    (CACHE_LINE_BYTES - size_of::<*const u8>() - size_of::<KeyCount>()) / size_of::<K>()
}
