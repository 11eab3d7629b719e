//! Filepath: src/node.rs
//!
//! The cache-line tree node.
//!
//! A node owns at most one [`Family`] (its child array), counts its live
//! keys in a single byte, and stores the keys inline in the rest of the
//! line. Key slots past the live count are uninitialized; the count is
//! the sole authority on which slots hold values.
//!
//! A node can be in one of three states:
//!
//! - empty: `len == 0`, no family
//! - leaf: `0 <= len <= M`, no family
//! - interior: `0 <= len <= M`, family present
//!
//! `len == 0` with a family present is legal: splitting around the
//! inserted key (rather than the median) can leave chains of keyless
//! interior nodes above a populated leaf.

use std::fmt as StdFmt;
use std::mem::MaybeUninit;
use std::mem::{align_of, size_of};

use crate::family::Family;
use crate::layout::{CACHE_LINE_BYTES, KeyCount, node_capacity};

/// A tree node: one child-array handle, a live-key count, and `M` inline
/// key slots, filling exactly one cache line.
///
/// # Type Parameters
///
/// * `K` - Key type. Never default-constructed or cloned by the node.
/// * `M` - Key slot count; must equal [`node_capacity::<K>()`](node_capacity).
#[repr(C, align(64))]
pub(crate) struct Node<K, const M: usize> {
    /// Owning handle to this node's children, or `None` below the last
    /// populated level.
    children: Option<Family<K, M>>,

    /// Number of live key slots, `0..=M`.
    len: KeyCount,

    /// Inline key storage. Slots `0..len` are initialized.
    elts: [MaybeUninit<K>; M],
}

impl<K, const M: usize> Node<K, M> {
    /// Instantiation-time layout validation, in lieu of deriving `M`
    /// from `K` (which const generics cannot express on stable).
    pub(crate) const LAYOUT_CHECK: () = {
        assert!(
            size_of::<*const u8>() == 4 || size_of::<*const u8>() == 8,
            "only 32-bit and 64-bit pointers are supported"
        );
        assert!(
            M >= 1,
            "key type too large to share a cache line with a child pointer and a counter"
        );
        assert!(
            M == node_capacity::<K>(),
            "M must be exactly node_capacity::<K>()"
        );
        assert!(
            M + 1 <= KeyCount::MAX as usize,
            "key counter too narrow for M + 1 children"
        );
        assert!(
            size_of::<Node<K, M>>() == CACHE_LINE_BYTES,
            "node does not fill exactly one cache line"
        );
        assert!(
            align_of::<Node<K, M>>() == CACHE_LINE_BYTES,
            "node alignment must equal the cache line"
        );
    };

    /// Create an empty node: no keys, no family.
    #[must_use]
    pub(crate) fn empty() -> Self {
        // Trigger the compile-time layout check for this (K, M) pair.
        let _: () = Self::LAYOUT_CHECK;

        Self {
            children: None,
            len: 0,
            elts: std::array::from_fn(|_| MaybeUninit::uninit()),
        }
    }

    /// Number of live keys.
    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.len as usize
    }

    /// The live keys, in insertion order (not sorted).
    #[inline]
    #[must_use]
    pub(crate) fn keys(&self) -> &[K] {
        // SAFETY: slots 0..len are initialized; MaybeUninit<K> has the
        // same layout as K.
        unsafe { std::slice::from_raw_parts(self.elts.as_ptr().cast::<K>(), self.len()) }
    }

    /// Append a key to the live slots.
    ///
    /// # Panics
    ///
    /// Panics if the node is already full.
    #[inline]
    pub(crate) fn push(&mut self, key: K) {
        self.elts[self.len()] = MaybeUninit::new(key);
        self.len += 1;
    }

    /// Overwrite the live-key count.
    ///
    /// # Safety
    ///
    /// Slots `0..n` must be initialized when this returns control to
    /// safe code. Shrinking the count leaks the keys above it rather
    /// than dropping them; callers rely on that during redistribution.
    #[inline]
    pub(crate) unsafe fn set_len(&mut self, n: usize) {
        debug_assert!(n <= M, "set_len beyond node capacity");
        #[allow(clippy::cast_possible_truncation)]
        {
            self.len = n as KeyCount;
        }
    }

    /// Raw pointer to the key slots, for redistribution.
    #[inline]
    pub(crate) fn slot_ptr(&mut self) -> *mut K {
        self.elts.as_mut_ptr().cast::<K>()
    }

    #[inline]
    #[must_use]
    pub(crate) fn family(&self) -> Option<&Family<K, M>> {
        self.children.as_ref()
    }

    #[inline]
    pub(crate) fn family_mut(&mut self) -> Option<&mut Family<K, M>> {
        self.children.as_mut()
    }

    #[inline]
    #[must_use]
    pub(crate) fn has_family(&self) -> bool {
        self.children.is_some()
    }

    /// Install (or clear) this node's family, releasing any previous one.
    #[inline]
    pub(crate) fn set_family(&mut self, family: Option<Family<K, M>>) {
        self.children = family;
    }

    /// Relinquish ownership of this node's family.
    #[inline]
    pub(crate) fn take_family(&mut self) -> Option<Family<K, M>> {
        self.children.take()
    }
}

impl<K, const M: usize> Drop for Node<K, M> {
    fn drop(&mut self) {
        let n = self.len();
        self.len = 0;

        // SAFETY: slots 0..n were initialized; the count is already zero,
        // so a panicking key destructor cannot cause a second drop pass.
        unsafe {
            let live = std::ptr::slice_from_raw_parts_mut(self.elts.as_mut_ptr().cast::<K>(), n);
            std::ptr::drop_in_place(live);
        }
        // `children` is dropped by the compiler, releasing the subtree.
    }
}

impl<K, const M: usize> StdFmt::Debug for Node<K, M> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("Node")
            .field("len", &self.len())
            .field("has_family", &self.has_family())
            .finish_non_exhaustive()
    }
}
