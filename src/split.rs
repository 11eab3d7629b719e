//! Filepath: src/split.rs
//!
//! The partition primitive behind every split.
//!
//! When a node splits, its keys are redistributed around the key being
//! inserted: strictly smaller keys stay with (or go to) the low node,
//! everything else goes to the high node, both in source order. The
//! primitive moves keys (it never clones) and supports the in-place
//! form where the source array doubles as the low destination.

use crate::compare::KeyLess;
use crate::node::Node;

/// Partition `len` keys starting at `src` around `pivot`: keys ordering
/// strictly before `pivot` are written to `dest_lt`, the rest to
/// `dest_ge`, each side in source order. Returns the count written to
/// `dest_lt`.
///
/// Keys are moved out of `src`; after the call the source slots are
/// logically uninitialized except where `dest_lt` aliases them.
///
/// # Safety
///
/// * `src` must hold `len` initialized keys.
/// * `dest_lt` and `dest_ge` must each have room for `len` keys.
/// * `dest_lt` may fully alias `src` (the in-place form); `dest_ge` must
///   not overlap `src` or `dest_lt`. Partial overlap of any pair is
///   forbidden.
/// * Callers must account every key as moved even if the comparator
///   panics mid-way (zero the source's live count beforehand).
pub(crate) unsafe fn split_array<K, L: KeyLess<K>>(
    src: *const K,
    len: usize,
    dest_lt: *mut K,
    dest_ge: *mut K,
    pivot: &K,
    less: &L,
) -> usize {
    let mut lt_count = 0;

    for i in 0..len {
        // SAFETY: i < len, so src.add(i) is an initialized key the caller
        // gave up ownership of.
        let x = unsafe { src.add(i).read() };

        if less.less(&x, pivot) {
            // lt_count <= i, so in the aliased form this writes at or
            // below the slot just read.
            // SAFETY: lt_count < len; dest_lt has room for len keys.
            unsafe { dest_lt.add(lt_count).write(x) };
            lt_count += 1;
        } else {
            // SAFETY: i - lt_count < len; dest_ge has room for len keys.
            unsafe { dest_ge.add(i - lt_count).write(x) };
        }
    }

    lt_count
}

/// Redistribute `lt`'s keys around `pivot` in place: the strictly-smaller
/// keys stay in `lt`, the rest move to `ge`. Both counts are updated.
///
/// `ge` must be empty on entry. Both counts are zeroed before any
/// comparison runs, so a panicking comparator leaks the keys in flight
/// instead of double-dropping them.
pub(crate) fn redistribute<K, const M: usize, L: KeyLess<K>>(
    lt: &mut Node<K, M>,
    ge: &mut Node<K, M>,
    pivot: &K,
    less: &L,
) {
    debug_assert_eq!(ge.len(), 0, "high node must start empty");

    let len = lt.len();
    // SAFETY: shrinking; slots 0..0 are trivially initialized.
    unsafe { lt.set_len(0) };

    let lt_ptr = lt.slot_ptr();
    // SAFETY: lt holds len keys no longer covered by its count; dest_lt
    // fully aliases the source; ge is a distinct node with M >= len slots.
    let lt_count = unsafe { split_array(lt_ptr.cast_const(), len, lt_ptr, ge.slot_ptr(), pivot, less) };

    // SAFETY: split_array left lt_count keys in lt and len - lt_count in ge.
    unsafe {
        lt.set_len(lt_count);
        ge.set_len(len - lt_count);
    }
}

/// Redistribute `src`'s keys around `pivot` into two other nodes, leaving
/// `src` empty. Used by the root split, where the old root's keys are
/// divided between its two new children.
///
/// `lt` and `ge` must be empty on entry.
pub(crate) fn redistribute_from<K, const M: usize, L: KeyLess<K>>(
    src: &mut Node<K, M>,
    lt: &mut Node<K, M>,
    ge: &mut Node<K, M>,
    pivot: &K,
    less: &L,
) {
    debug_assert_eq!(lt.len(), 0, "low node must start empty");
    debug_assert_eq!(ge.len(), 0, "high node must start empty");

    let len = src.len();
    // SAFETY: shrinking.
    unsafe { src.set_len(0) };

    // SAFETY: src holds len keys no longer covered by its count; lt and
    // ge are distinct nodes with M >= len slots each.
    let lt_count = unsafe {
        split_array(
            src.slot_ptr().cast_const(),
            len,
            lt.slot_ptr(),
            ge.slot_ptr(),
            pivot,
            less,
        )
    };

    // SAFETY: split_array initialized lt_count keys in lt and the rest in ge.
    unsafe {
        lt.set_len(lt_count);
        ge.set_len(len - lt_count);
    }
}
