//! Filepath: src/set.rs
//!
//! `CashewSet` - the cache-line B-tree ordered set.
//!
//! This module provides the public container and the recursive
//! search/insert engine behind it.
//!
//! # Split discipline
//!
//! Nodes split around the key being inserted, not around the median.
//! The arithmetic stays uniform: the child index during descent and the
//! partition point during a split are both "number of keys less than the
//! key". The shape is unusual, though. The inserted key can order before
//! or after everything in a full node, so a split may hand one sibling
//! all the keys and the other none; chains of keyless interior nodes
//! above a populated leaf are legal, and lookups descend through them.
//! A future revision may switch to median splits; everything downstream
//! of [`split_array`](crate::split) would have to move with it.

use std::fmt as StdFmt;
use std::mem as StdMem;

use crate::compare::{KeyEq, KeyLess, NaturalEq, NaturalLess};
use crate::error::InsertError;
use crate::family::Family;
use crate::node::Node;
use crate::split::{redistribute, redistribute_from};
use crate::tracing_helpers::{debug_log, trace_log};

// ============================================================================
//  Outcome
// ============================================================================

/// Result of attempting an insert in a subtree.
enum Outcome<K, const M: usize> {
    /// The key was inserted somewhere below; nothing for the caller to do.
    Done,

    /// The key already existed; the tree is unchanged.
    DuplicateFound,

    /// The callee could not absorb the key. It hands back the key plus
    /// two family handles that together hold the callee's former child
    /// array, split around the key. The caller re-integrates them one
    /// level up. Absent handles mean the new siblings are leaves.
    FamilySplit {
        key: K,
        lt: Option<Family<K, M>>,
        ge: Option<Family<K, M>>,
    },
}

// ============================================================================
//  Engine
// ============================================================================

/// Borrowed insert context: the comparators and the tree depth, which
/// are fixed for the whole descent.
struct Engine<'a, L, E> {
    less: &'a L,
    eq: &'a E,
    tree_depth: u8,
}

impl<'a, L, E> Engine<'a, L, E> {
    /// Guard against programmer error in the engine itself. Not a
    /// recovery mechanism: a failure here means the tree is broken.
    fn check_bugs<K, const M: usize>(
        &self,
        node: &Node<K, M>,
        depth: u8,
    ) -> Result<(), InsertError> {
        if node.len() > M {
            return Err(InsertError::Corrupted("element count exceeds capacity"));
        }
        if depth > self.tree_depth {
            return Err(InsertError::Corrupted("node deeper than the tree itself"));
        }
        if depth == self.tree_depth && node.has_family() {
            return Err(InsertError::Corrupted("leaf-level node has children"));
        }
        Ok(())
    }

    /// Attempt to insert `key` into the subtree under `node`.
    ///
    /// Scans the node's live keys once: an equivalent key short-circuits
    /// to [`Outcome::DuplicateFound`], otherwise the count of strictly
    /// smaller keys doubles as the descent index. Dispatches on whether
    /// this node still has a free slot; a `FamilySplit` outcome is the
    /// caller's to clean up, at this node's level and above.
    fn try_insert<K, const M: usize>(
        &self,
        node: &mut Node<K, M>,
        depth: u8,
        key: K,
    ) -> Result<Outcome<K, M>, InsertError>
    where
        L: KeyLess<K>,
        E: KeyEq<K>,
    {
        self.check_bugs(node, depth)?;

        let mut less_count = 0;
        for x in node.keys() {
            if self.eq.eq(x, &key) {
                return Ok(Outcome::DuplicateFound);
            }
            if self.less.less(x, &key) {
                less_count += 1;
            }
        }

        if node.len() < M {
            self.insert_spacious(node, depth, key, less_count)
        } else {
            self.insert_full(node, depth, key, less_count)
        }
    }

    /// Insert under a node with a free key slot. Never splits at this
    /// level, so it never returns `FamilySplit`.
    ///
    /// Assumes without checking (established by `try_insert`):
    /// `node.len() < M`, `depth <= tree_depth`, `key` has no duplicate
    /// directly in `node`, and `less_count` counts the node keys
    /// strictly below `key`.
    fn insert_spacious<K, const M: usize>(
        &self,
        node: &mut Node<K, M>,
        depth: u8,
        key: K,
        less_count: usize,
    ) -> Result<Outcome<K, M>, InsertError>
    where
        L: KeyLess<K>,
        E: KeyEq<K>,
    {
        let key = if depth < self.tree_depth {
            // Interior level. Chains of keyless nodes make a missing
            // family legal here; materialize it before descending so a
            // failed allocation leaves the tree untouched.
            if !node.has_family() {
                node.set_family(Some(Family::alloc()?));
            }
            let live_children = node.len() + 1;
            let Some(family) = node.family_mut() else {
                return Err(InsertError::Corrupted("family vanished after allocation"));
            };

            match self.try_insert(family.child_mut(less_count), depth + 1, key)? {
                Outcome::FamilySplit { key, lt, ge } => {
                    trace_log!(depth, less_count, "absorbing child family split");

                    // The split child becomes two siblings: open the slot
                    // next to it, hand each half its child array, then
                    // divide the split child's keys around the new key.
                    family.open_gap(less_count + 1, live_children);
                    let (low, high) = family.adjacent_mut(less_count);
                    low.set_family(lt);
                    high.set_family(ge);
                    redistribute(low, high, &key, self.less);
                    key
                }
                outcome => return Ok(outcome),
            }
        } else {
            key
        };

        node.push(key);
        Ok(Outcome::Done)
    }

    /// Insert under a node whose key slots are all in use. Splits at
    /// this level if the subtree cannot absorb the key.
    ///
    /// Assumes without checking: `node.len() == M`, `depth <=
    /// tree_depth`, no duplicate directly in `node`, `less_count` as in
    /// `insert_spacious`.
    fn insert_full<K, const M: usize>(
        &self,
        node: &mut Node<K, M>,
        depth: u8,
        key: K,
        less_count: usize,
    ) -> Result<Outcome<K, M>, InsertError>
    where
        L: KeyLess<K>,
        E: KeyEq<K>,
    {
        if depth == self.tree_depth {
            // A full leaf. The parent builds both halves; the absent
            // handles say the new siblings are themselves leaves.
            return Ok(Outcome::FamilySplit {
                key,
                lt: None,
                ge: None,
            });
        }

        // Allocate the sibling family before descending: once the child
        // commits to a split, reassembly up here can no longer fail.
        let mut sibling = Family::alloc()?;

        let Some(family) = node.family_mut() else {
            return Err(InsertError::Corrupted(
                "full node off the leaf level has no children",
            ));
        };

        let (key, lt, ge) = match self.try_insert(family.child_mut(less_count), depth + 1, key)? {
            Outcome::FamilySplit { key, lt, ge } => (key, lt, ge),
            outcome => return Ok(outcome),
        };

        trace_log!(depth, less_count, "full node relaying family split");

        // The children above the split slot are adopted by the sibling
        // family, shifted one slot to make room for the split child's
        // high half at slot 0.
        for (i, src) in (less_count + 1..=M).enumerate() {
            StdMem::swap(family.child_mut(src), sibling.child_mut(i + 1));
        }

        let low = family.child_mut(less_count);
        low.set_family(lt);
        let high = sibling.child_mut(0);
        high.set_family(ge);
        redistribute(low, high, &key, self.less);

        // This node keeps its M keys but relinquishes its entire child
        // array; the caller owns the reassembly.
        Ok(Outcome::FamilySplit {
            key,
            lt: node.take_family(),
            ge: Some(sibling),
        })
    }
}

// ============================================================================
//  CashewSet
// ============================================================================

/// A cache-conscious ordered set.
///
/// Stores unique keys in a B-tree whose nodes each fill exactly one
/// 64-byte cache line. Supports membership tests, insertion, clearing,
/// and size queries; see the crate docs for scope and design.
///
/// # Type Parameters
///
/// * `K` - Key type. Needs neither `Default` nor `Clone`; the set only
///   moves caller-provided values and compares them by reference.
/// * `M` - Keys per node; must equal [`crate::node_capacity`]`::<K>()`,
///   checked at instantiation.
/// * `L` - Strict weak ordering (default: `K`'s natural order).
/// * `E` - Equivalence agreeing with `L` (default: `K`'s equality).
///
/// # Example
///
/// ```rust
/// use cashew_set::{CashewSet, node_capacity};
///
/// let mut primes: CashewSet<u64, { node_capacity::<u64>() }> = CashewSet::new();
/// for p in [2u64, 3, 5, 7, 11] {
///     assert!(primes.insert(p).unwrap());
/// }
/// assert_eq!(primes.len(), 5);
/// assert!(primes.contains(&7));
/// assert!(!primes.contains(&9));
/// ```
pub struct CashewSet<K, const M: usize, L = NaturalLess, E = NaturalEq> {
    /// The root node, embedded directly: root-level probing costs zero
    /// indirections, and the root is the one node not living in a family.
    root: Node<K, M>,

    less: L,
    eq: E,

    /// Depth of the leaf level; the root is depth 1.
    depth: u8,

    /// Total number of keys in the tree.
    len: usize,
}

impl<K, const M: usize, L, E> CashewSet<K, M, L, E>
where
    L: KeyLess<K>,
    E: KeyEq<K>,
{
    /// Create an empty set with explicit comparators.
    ///
    /// `eq` must agree with `less`: `eq(a, b) ⇔ !less(a, b) && !less(b, a)`.
    #[must_use]
    pub fn with_comparators(less: L, eq: E) -> Self {
        let _: () = Node::<K, M>::LAYOUT_CHECK;

        Self {
            root: Node::empty(),
            less,
            eq,
            depth: 1,
            len: 0,
        }
    }

    /// Number of keys in the set.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the set holds no keys.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Restore the empty state, releasing the whole subtree. Never fails.
    pub fn clear(&mut self) {
        self.root = Node::empty();
        self.depth = 1;
        self.len = 0;
    }

    /// Number of copies of `key` in the set: 0 or 1.
    #[must_use]
    pub fn count(&self, key: &K) -> usize {
        self.count_in(&self.root, key)
    }

    /// Whether `key` is in the set.
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.count(key) == 1
    }

    fn count_in(&self, node: &Node<K, M>, key: &K) -> usize {
        let mut less_count = 0;
        for x in node.keys() {
            if self.eq.eq(x, key) {
                return 1;
            }
            if self.less.less(x, key) {
                less_count += 1;
            }
        }
        match node.family() {
            Some(family) => self.count_in(family.child(less_count), key),
            None => 0,
        }
    }

    /// Insert `key`, returning `true` if it was newly inserted and
    /// `false` if an equivalent key was already present.
    ///
    /// # Errors
    ///
    /// * [`InsertError::AllocationFailed`] / [`InsertError::Misaligned`] -
    ///   a family could not be allocated. Every family an insert can
    ///   need is allocated before the first structural change, so the
    ///   tree stays valid (at worst one benign empty family richer).
    /// * [`InsertError::Corrupted`] - an internal invariant check failed;
    ///   indicates a bug in the tree, not bad caller input.
    pub fn insert(&mut self, key: K) -> Result<bool, InsertError> {
        // Only a full root can be told to split by the recursion below,
        // and this frame is the one that repairs it. Reserve the
        // replacement family up front so the repair cannot fail.
        let spare = if self.root.len() == M {
            Some(Family::alloc()?)
        } else {
            None
        };

        let engine = Engine {
            less: &self.less,
            eq: &self.eq,
            tree_depth: self.depth,
        };

        match engine.try_insert(&mut self.root, 1, key)? {
            Outcome::DuplicateFound => Ok(false),

            Outcome::Done => {
                self.len += 1;
                Ok(true)
            }

            Outcome::FamilySplit { key, lt, ge } => {
                // The root itself has split. It becomes a one-key node
                // whose two children divide its former keys around the
                // new key; this is the only step that deepens the tree.
                let Some(mut family) = spare else {
                    return Err(InsertError::Corrupted(
                        "root split arrived without a spare family",
                    ));
                };

                {
                    let (low, high) = family.adjacent_mut(0);
                    low.set_family(lt);
                    high.set_family(ge);
                    redistribute_from(&mut self.root, low, high, &key, &self.less);
                }

                self.root.set_family(Some(family));
                self.root.push(key);
                self.depth += 1;
                self.len += 1;

                debug_log!(depth = self.depth, len = self.len, "root split");
                Ok(true)
            }
        }
    }
}

impl<K, const M: usize, L, E> CashewSet<K, M, L, E>
where
    L: KeyLess<K> + Default,
    E: KeyEq<K> + Default,
{
    /// Create an empty set using the key type's natural comparators.
    #[must_use]
    pub fn new() -> Self {
        Self::with_comparators(L::default(), E::default())
    }
}

impl<K, const M: usize, L, E> Default for CashewSet<K, M, L, E>
where
    L: KeyLess<K> + Default,
    E: KeyEq<K> + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, const M: usize, L, E> StdFmt::Debug for CashewSet<K, M, L, E> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("CashewSet")
            .field("len", &self.len)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

// ============================================================================
//  Test-only structural validation
// ============================================================================

#[cfg(test)]
impl<K, const M: usize, L, E> CashewSet<K, M, L, E>
where
    L: KeyLess<K>,
    E: KeyEq<K>,
{
    /// Walk the whole tree and assert every structural invariant:
    /// per-node counts, leaf flatness, alignment, empty spare slots, and
    /// the ordering rule between separators and child subtrees.
    fn assert_tree_invariants(&self) {
        assert_eq!(
            std::ptr::from_ref(&self.root) as usize % crate::layout::CACHE_LINE_BYTES,
            0,
            "embedded root is misaligned"
        );
        self.assert_node_invariants(&self.root, 1);
    }

    fn assert_node_invariants(&self, node: &Node<K, M>, depth: u8) {
        assert!(node.len() <= M, "node over capacity");
        assert!(depth <= self.depth, "node deeper than the tree");
        if depth == self.depth {
            assert!(!node.has_family(), "leaf-level node has children");
        }

        let Some(family) = node.family() else { return };

        assert_eq!(
            family.base_addr() % crate::layout::CACHE_LINE_BYTES,
            0,
            "family base is misaligned"
        );

        // Slots past the in-use range must be empty default nodes.
        for spare in &family.children()[node.len() + 1..] {
            assert_eq!(spare.len(), 0, "spare child slot holds keys");
            assert!(!spare.has_family(), "spare child slot holds a family");
        }

        // Ordering: with p = count of this node's keys below x, children
        // 0..=p hold only keys below x and the rest hold only keys at or
        // above it.
        for x in node.keys() {
            let p = node
                .keys()
                .iter()
                .filter(|y| self.less.less(*y, x))
                .count();
            for j in 0..=node.len() {
                Self::visit_subtree_keys(family.child(j), &mut |y| {
                    if j <= p {
                        assert!(self.less.less(y, x), "low-side key not below separator");
                    } else {
                        assert!(!self.less.less(y, x), "high-side key below separator");
                    }
                });
            }
        }

        for j in 0..=node.len() {
            self.assert_node_invariants(family.child(j), depth + 1);
        }
    }

    fn visit_subtree_keys(node: &Node<K, M>, visit: &mut impl FnMut(&K)) {
        for k in node.keys() {
            visit(k);
        }
        if let Some(family) = node.family() {
            for j in 0..=node.len() {
                Self::visit_subtree_keys(family.child(j), visit);
            }
        }
    }
}

// ============================================================================
//  Tests
// ============================================================================

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "fail fast in tests")]
mod tests {
    use super::*;
    use crate::layout::node_capacity;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    type IntSet = CashewSet<i32, { node_capacity::<i32>() }>;
    const INT_M: usize = node_capacity::<i32>();

    #[test]
    fn fresh_set_is_empty() {
        let set = IntSet::new();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert_eq!(set.count(&1), 0);
        assert_eq!(set.count(&-1), 0);
    }

    #[test]
    fn insert_then_count() {
        let mut set = IntSet::new();
        assert!(set.insert(42).unwrap());
        assert_eq!(set.count(&42), 1);
        assert_eq!(set.count(&41), 0);
        assert_eq!(set.len(), 1);
        assert!(!set.is_empty());
    }

    #[test]
    fn duplicate_insert_returns_false_and_keeps_len() {
        let mut set = IntSet::new();
        for k in [3, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5] {
            let _ = set.insert(k).unwrap();
        }
        assert_eq!(set.len(), 7);
        assert!(!set.insert(5).unwrap());
        assert_eq!(set.len(), 7);
        set.assert_tree_invariants();
    }

    #[test]
    fn first_root_split_leaves_an_empty_high_sibling() {
        // Ascending inserts fill the root, and the next key orders after
        // all of them: the split parks every old key in the low child
        // and none in the high one. The keyless node is by design.
        let mut set = IntSet::new();
        #[allow(clippy::cast_possible_truncation)]
        for i in 1..=(INT_M as i32 + 1) {
            assert!(set.insert(i).unwrap());
        }

        assert_eq!(set.depth, 2);
        assert_eq!(set.root.len(), 1);
        let family = set.root.family().unwrap();
        assert_eq!(family.child(0).len(), INT_M);
        assert_eq!(family.child(1).len(), 0);

        set.assert_tree_invariants();
        for i in 1..=(INT_M as i32 + 1) {
            assert_eq!(set.count(&i), 1);
        }
    }

    #[test]
    fn ascending_inserts_grow_a_deep_valid_tree() {
        let mut set = IntSet::new();
        for i in 0..2000 {
            assert!(set.insert(i).unwrap());
        }

        assert!(set.depth >= 3, "2000 ascending keys must deepen the tree");
        assert_eq!(set.len(), 2000);
        set.assert_tree_invariants();

        for i in 0..2000 {
            assert_eq!(set.count(&i), 1);
        }
        assert_eq!(set.count(&2000), 0);
        assert_eq!(set.count(&-1), 0);
    }

    #[test]
    fn descending_inserts_grow_a_valid_tree() {
        let mut set = IntSet::new();
        for i in (0..1000).rev() {
            assert!(set.insert(i).unwrap());
        }
        assert_eq!(set.len(), 1000);
        set.assert_tree_invariants();
        for i in 0..1000 {
            assert_eq!(set.count(&i), 1);
        }
    }

    #[test]
    fn clear_restores_the_empty_state() {
        let mut set = IntSet::new();
        for i in 0..500 {
            let _ = set.insert(i).unwrap();
        }
        set.clear();

        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert_eq!(set.depth, 1);
        for i in 0..500 {
            assert_eq!(set.count(&i), 0);
        }

        // The set is fully usable again.
        assert!(set.insert(7).unwrap());
        assert_eq!(set.count(&7), 1);
        set.assert_tree_invariants();
    }

    #[test]
    fn custom_comparators_reverse_the_order() {
        struct Desc;
        impl KeyLess<i32> for Desc {
            fn less(&self, a: &i32, b: &i32) -> bool {
                b < a
            }
        }

        let mut set: CashewSet<i32, { node_capacity::<i32>() }, Desc, NaturalEq> =
            CashewSet::with_comparators(Desc, NaturalEq);
        for i in 0..300 {
            assert!(set.insert(i).unwrap());
        }
        assert_eq!(set.len(), 300);
        set.assert_tree_invariants();
        for i in 0..300 {
            assert!(set.contains(&i));
        }
    }

    #[test]
    fn other_key_widths_share_the_engine() {
        let mut wide: CashewSet<u64, { node_capacity::<u64>() }> = CashewSet::new();
        let mut narrow: CashewSet<u8, { node_capacity::<u8>() }> = CashewSet::new();

        for i in 0u64..400 {
            assert!(wide.insert(i.wrapping_mul(0x9e37_79b9_7f4a_7c15)).unwrap());
        }
        for b in 0u8..=255 {
            assert!(narrow.insert(b).unwrap());
        }

        assert_eq!(wide.len(), 400);
        assert_eq!(narrow.len(), 256);
        wide.assert_tree_invariants();
        narrow.assert_tree_invariants();
        assert!(narrow.contains(&0));
        assert!(narrow.contains(&255));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(192))]

        #[test]
        fn random_inserts_match_the_oracle_and_keep_invariants(
            keys in prop::collection::vec(any::<i32>(), 0..300),
        ) {
            let mut set = IntSet::new();
            let mut oracle = BTreeSet::new();

            for k in keys {
                prop_assert_eq!(set.insert(k).unwrap(), oracle.insert(k));
                prop_assert_eq!(set.len(), oracle.len());
            }

            set.assert_tree_invariants();
            for k in &oracle {
                prop_assert_eq!(set.count(k), 1);
            }
        }

        #[test]
        fn small_domain_stresses_duplicates_and_splits(
            keys in prop::collection::vec(0i32..40, 0..600),
        ) {
            let mut set = IntSet::new();
            let mut oracle = BTreeSet::new();

            for k in keys {
                prop_assert_eq!(set.insert(k).unwrap(), oracle.insert(k));
            }

            set.assert_tree_invariants();
            prop_assert_eq!(set.len(), oracle.len());
            for k in 0..40 {
                prop_assert_eq!(set.count(&k), usize::from(oracle.contains(&k)));
            }
        }
    }
}
