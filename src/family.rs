//! Filepath: src/family.rs
//!
//! Family allocation: the child arrays of the tree.
//!
//! A family is a contiguous block of exactly `M + 1` nodes, allocated on
//! a cache-line boundary and owned uniquely by one parent node (or, for
//! a moment during a split, by the in-flight split result). There is no
//! sharing and no reference counting; families move up the tree during
//! splits and are released recursively on drop.
//!
//! The block's base address is the address of child 0, so the alignment
//! guarantee covers every child in the family: child `i` sits exactly
//! `i` cache lines past the base.
//!
//! Alignment is a hard requirement, not an optimization. The allocator
//! is re-checked at runtime even though `std::alloc` honors the layout's
//! alignment: toolchains have been caught silently ignoring
//! over-alignment requests, and a misaligned family corrupts memory.

use std::alloc as StdAlloc;
use std::fmt as StdFmt;
use std::marker::PhantomData;
use std::mem::size_of;
use std::ptr::NonNull;

use crate::error::InsertError;
use crate::layout::CACHE_LINE_BYTES;
use crate::node::Node;

/// Uniquely-owned, cache-line-aligned block of `M + 1` nodes.
///
/// Move-only: ownership transfers up the tree during splits and is never
/// aliased. Dropping a family drops all of its nodes, and through them
/// every transitively owned subtree.
pub(crate) struct Family<K, const M: usize> {
    /// Address of child 0. All `LEN` nodes are always initialized.
    base: NonNull<Node<K, M>>,

    /// This handle owns the nodes behind `base`.
    _owns: PhantomData<Node<K, M>>,
}

// SAFETY: a Family is an owning handle like Box<[Node<K, M>]>: unique
// ownership, no interior aliasing. It is exactly as Send/Sync as its
// nodes' key type.
unsafe impl<K: Send, const M: usize> Send for Family<K, M> {}
unsafe impl<K: Sync, const M: usize> Sync for Family<K, M> {}

impl<K, const M: usize> Family<K, M> {
    /// Number of child slots: the node fan-out.
    pub(crate) const LEN: usize = M + 1;

    /// Allocate a family of `LEN` empty nodes on a cache-line boundary.
    ///
    /// # Errors
    ///
    /// * [`InsertError::AllocationFailed`] - the allocator returned null.
    /// * [`InsertError::Misaligned`] - the allocator returned a block not
    ///   on a cache-line boundary; the block is released and refused.
    #[allow(clippy::cast_ptr_alignment)]
    pub(crate) fn alloc() -> Result<Self, InsertError> {
        let _: () = Node::<K, M>::LAYOUT_CHECK;

        let layout = Self::layout();

        // SAFETY: the layout has non-zero size (at least one cache line).
        let raw = unsafe { StdAlloc::alloc(layout) };
        let Some(base) = NonNull::new(raw.cast::<Node<K, M>>()) else {
            return Err(InsertError::AllocationFailed);
        };

        if (base.as_ptr() as usize) % CACHE_LINE_BYTES != 0 {
            // SAFETY: just allocated with this exact layout, not yet used.
            unsafe { StdAlloc::dealloc(raw, layout) };
            return Err(InsertError::Misaligned);
        }

        for i in 0..Self::LEN {
            // SAFETY: base points to LEN uninitialized node slots; each
            // write lands inside the allocation.
            unsafe { base.as_ptr().add(i).write(Node::empty()) };
        }

        Ok(Self {
            base,
            _owns: PhantomData,
        })
    }

    const fn layout() -> StdAlloc::Layout {
        match StdAlloc::Layout::from_size_align(
            size_of::<Node<K, M>>() * Self::LEN,
            CACHE_LINE_BYTES,
        ) {
            Ok(layout) => layout,
            Err(_) => panic!("family layout exceeds address space"),
        }
    }

    /// All `LEN` children.
    #[inline]
    #[must_use]
    pub(crate) fn children(&self) -> &[Node<K, M>] {
        // SAFETY: base points to LEN contiguous initialized nodes owned
        // by this handle.
        unsafe { std::slice::from_raw_parts(self.base.as_ptr(), Self::LEN) }
    }

    #[inline]
    pub(crate) fn children_mut(&mut self) -> &mut [Node<K, M>] {
        // SAFETY: as `children`, and `&mut self` guarantees uniqueness.
        unsafe { std::slice::from_raw_parts_mut(self.base.as_ptr(), Self::LEN) }
    }

    /// Child at slot `i`.
    #[inline]
    #[must_use]
    pub(crate) fn child(&self, i: usize) -> &Node<K, M> {
        &self.children()[i]
    }

    /// Mutable child at slot `i`.
    #[inline]
    pub(crate) fn child_mut(&mut self, i: usize) -> &mut Node<K, M> {
        &mut self.children_mut()[i]
    }

    /// Mutable references to the adjacent children at slots `i` and
    /// `i + 1`.
    #[inline]
    pub(crate) fn adjacent_mut(&mut self, i: usize) -> (&mut Node<K, M>, &mut Node<K, M>) {
        let (low, high) = self.children_mut().split_at_mut(i + 1);
        (&mut low[i], &mut high[0])
    }

    /// Shift children `[at, in_use)` one slot to the right, parking the
    /// empty node from slot `in_use` at slot `at`. Opens the gap a split
    /// child's new sibling moves into.
    pub(crate) fn open_gap(&mut self, at: usize, in_use: usize) {
        debug_assert!(in_use < Self::LEN, "no spare slot to shift into");

        let nodes = self.children_mut();
        for i in (at..in_use).rev() {
            nodes.swap(i, i + 1);
        }
    }

    /// Base address of the block, for alignment checks.
    #[cfg(test)]
    pub(crate) fn base_addr(&self) -> usize {
        self.base.as_ptr() as usize
    }
}

impl<K, const M: usize> Drop for Family<K, M> {
    fn drop(&mut self) {
        // SAFETY: this handle owns LEN initialized nodes at base, and the
        // allocation was made with Self::layout().
        unsafe {
            let nodes = std::ptr::slice_from_raw_parts_mut(self.base.as_ptr(), Self::LEN);
            std::ptr::drop_in_place(nodes);
            StdAlloc::dealloc(self.base.as_ptr().cast::<u8>(), Self::layout());
        }
    }
}

impl<K, const M: usize> StdFmt::Debug for Family<K, M> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("Family")
            .field("base", &self.base)
            .field("children", &Self::LEN)
            .finish()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "fail fast in tests")]
mod tests {
    use super::*;
    use crate::layout::node_capacity;

    type IntFamily = Family<i32, { node_capacity::<i32>() }>;

    #[test]
    fn base_and_every_child_are_cache_line_aligned() {
        let family = IntFamily::alloc().unwrap();

        assert_eq!(family.base_addr() % CACHE_LINE_BYTES, 0);
        for (i, child) in family.children().iter().enumerate() {
            let addr = std::ptr::from_ref(child) as usize;
            assert_eq!(addr % CACHE_LINE_BYTES, 0);
            assert_eq!(addr, family.base_addr() + i * CACHE_LINE_BYTES);
        }
    }

    #[test]
    fn fresh_family_children_are_all_empty() {
        let family = IntFamily::alloc().unwrap();

        assert_eq!(family.children().len(), IntFamily::LEN);
        for child in family.children() {
            assert_eq!(child.len(), 0);
            assert!(!child.has_family());
        }
    }

    #[test]
    fn open_gap_parks_the_spare_slot() {
        let mut family = IntFamily::alloc().unwrap();
        for i in 0..4 {
            family.child_mut(i).push(i as i32 * 10);
        }

        // Children 0..4 in use; open a gap at slot 1.
        family.open_gap(1, 4);

        assert_eq!(family.child(0).keys(), &[0]);
        assert_eq!(family.child(1).len(), 0);
        assert_eq!(family.child(2).keys(), &[10]);
        assert_eq!(family.child(3).keys(), &[20]);
        assert_eq!(family.child(4).keys(), &[30]);
    }

    #[test]
    fn dropping_a_family_drops_nested_subtrees() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static DROPS: AtomicUsize = AtomicUsize::new(0);

        #[derive(PartialEq, Eq, PartialOrd, Ord)]
        struct Counted(i64);
        impl Drop for Counted {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::Relaxed);
            }
        }

        {
            let mut outer = Family::<Counted, { node_capacity::<Counted>() }>::alloc().unwrap();
            let mut inner = Family::<Counted, { node_capacity::<Counted>() }>::alloc().unwrap();
            inner.child_mut(0).push(Counted(7));
            inner.child_mut(1).push(Counted(8));
            outer.child_mut(2).push(Counted(9));
            outer.child_mut(2).set_family(Some(inner));
        }
        assert_eq!(DROPS.load(Ordering::Relaxed), 3);
    }
}
