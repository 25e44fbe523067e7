//! An intrusive AVL tree.

// Conventions used in comments:
// - The balance factor of a node `x` is b(x) = h(right(x)) - h(left(x)),
//   where the height of an empty subtree is -1 (so a leaf has b = 0).
// - A node is "left-heavy" if b < 0 and "right-heavy" if b > 0.
//
// The fundamental invariants of the tree are:
// 1. Every stored balance factor is -1, 0 or +1 between operations, and
//    equals the measured height difference of the node's subtrees.
// 2. For every node, all keys in the left subtree compare less than the
//    node's key, and all keys in the right subtree compare greater.
//
// A violation (|b| = 2) exists only transiently inside an insert or remove
// call, and only at the node the repair walk is standing on. It is never
// stored: the walk hands the rotation engine a node whose stored factor is
// still +/-1, with its sign pointing at the taller side.

use core::{
    cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not, pin::Pin,
    ptr::NonNull,
};
use std::borrow::Borrow;

use cordyceps::Linked;

mod cursor;
mod debug;
mod entry;
mod iter;
mod map;
#[cfg(any(test, feature = "model"))]
pub mod model;
#[cfg(test)]
mod tests;

pub use crate::{
    cursor::{Cursor, CursorMut},
    entry::{Entry, OccupiedEntry, VacantEntry},
    iter::Iter,
    map::AvlMap,
};

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree.
///
/// The tree does not own or allocate its nodes; linkage lives in a
/// [`Links`] embedded in each caller-owned element, projected through the
/// element's [`Linked`] implementation.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

impl Dir {
    /// Maps a balance factor to the taller side. Zero maps right, so a
    /// unary node's sign (always nonzero) takes precedence wherever the
    /// distinction matters.
    fn of_balance(balance: i8) -> Dir {
        if balance < 0 {
            Dir::Left
        } else {
            Dir::Right
        }
    }

    /// The signed height contribution of this side to a balance factor.
    fn delta(self) -> i8 {
        match self {
            Dir::Left => -1,
            Dir::Right => 1,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    balance: i8,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

/// What a rebalancing rotation did to the height of its subtree, as seen
/// by the repair walk above it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum HeightChange {
    /// The subtree is one level shorter than before the violation arose;
    /// ancestors still need their balance factors adjusted.
    Shrank,
    /// The subtree kept its height; the repair walk stops here.
    Unchanged,
}

/// The three rotation shapes, selected by the heavy child's balance factor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Rotation {
    /// The heavy child leans the same way as the violation.
    Single,
    /// The heavy child leans against the violation; its inner grandchild
    /// is promoted above both.
    Double,
    /// The heavy child is perfectly balanced. This shape only arises while
    /// repairing a removal; an insertion cannot create it.
    SingleBalanced,
}

impl Rotation {
    fn classify(node_balance: i8, child_balance: i8) -> Rotation {
        if child_balance == node_balance {
            Rotation::Single
        } else if child_balance != 0 {
            Rotation::Double
        } else {
            Rotation::SingleBalanced
        }
    }
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        match self.root {
            Some(root) => unsafe {
                assert_eq!(T::links(root).as_ref().parent(), None);
                self.assert_invariants_at(root);
            },
            None => assert_eq!(self.len(), 0),
        }
    }

    // Returns the measured height of the subtree.
    #[allow(clippy::only_used_in_recursion)]
    unsafe fn assert_invariants_at(&self, node: NonNull<T>) -> i32 {
        unsafe {
            let mut heights = [-1_i32; 2];

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = T::links(node).as_ref().child(dir) {
                    let ordering = child.as_ref().key().cmp(node.as_ref().key());
                    match dir {
                        Dir::Left => assert_eq!(ordering, Ordering::Less),
                        Dir::Right => assert_eq!(ordering, Ordering::Greater),
                    }

                    // Ensure the child's parent link points to this node.
                    let parent = T::links(child)
                        .as_ref()
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(node, parent);

                    heights[dir as usize] = self.assert_invariants_at(child);
                }
            }

            let balance = i32::from(T::links(node).as_ref().balance());
            assert_eq!(
                balance,
                heights[1] - heights[0],
                "stored balance factor must match measured subtree heights"
            );
            assert!(balance.abs() <= 1);

            1 + heights[0].max(heights[1])
        }
    }

    /// Returns a reference to the node corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a pinned mutable reference to the node corresponding to
    /// `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_mut())) }
    }

    /// Returns `true` if the tree contains an element with the given key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    pub(crate) fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = T::links(cur).as_ref().left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = T::links(cur).as_ref().right(),
                }
            }
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        unsafe { self.first_raw().map(|first| Pin::new_unchecked(first.as_ref())) }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        unsafe { self.last_raw().map(|last| Pin::new_unchecked(last.as_ref())) }
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = self.first_raw()?;
        Some(unsafe { self.remove_at(first) })
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = self.last_raw()?;
        Some(unsafe { self.remove_at(last) })
    }

    pub(crate) fn first_raw(&self) -> Link<T> {
        self.edge_raw(Dir::Left)
    }

    pub(crate) fn last_raw(&self) -> Link<T> {
        self.edge_raw(Dir::Right)
    }

    // Descends along one side of the tree and returns the element reached.
    fn edge_raw(&self, dir: Dir) -> Link<T> {
        let mut cur = self.root?;

        unsafe {
            while let Some(next) = T::links(cur).as_ref().child(dir) {
                cur = next;
            }
        }

        Some(cur)
    }

    /// Returns an iterator over the elements of the tree in key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns a cursor pointing to the first element of the tree.
    pub fn cursor_first(&self) -> Cursor<'_, T> {
        Cursor::first(self)
    }

    /// Returns a cursor pointing to the last element of the tree.
    pub fn cursor_last(&self) -> Cursor<'_, T> {
        Cursor::last(self)
    }

    /// Returns a mutable cursor pointing to the first element of the tree.
    pub fn cursor_first_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::first(self)
    }

    /// Returns a mutable cursor pointing to the last element of the tree.
    pub fn cursor_last_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::last(self)
    }

    // Returns the in-order neighbor of `node` on the given side: the
    // predecessor for `Dir::Left`, the successor for `Dir::Right`.
    //
    // If `node` has a child on that side, the neighbor is the far element
    // of that child's subtree. Otherwise it is the first ancestor reached
    // from the opposite side, if any.
    pub(crate) unsafe fn neighbor_raw(&self, node: NonNull<T>, dir: Dir) -> Link<T> {
        unsafe {
            if let Some(child) = T::links(node).as_ref().child(dir) {
                let mut cur = child;
                while let Some(next) = T::links(cur).as_ref().child(!dir) {
                    cur = next;
                }
                return Some(cur);
            }

            let mut cur = node;
            let mut parent = T::links(cur).as_ref().parent();
            while let Some(p) = parent {
                if T::links(p).as_ref().child(dir) != Some(cur) {
                    break;
                }
                cur = p;
                parent = T::links(cur).as_ref().parent();
            }
            parent
        }
    }

    pub(crate) unsafe fn predecessor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Left) }
    }

    pub(crate) unsafe fn successor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Right) }
    }

    /// Returns an [`Entry`] for the given key, which is vacant or occupied
    /// depending on whether the key is present.
    pub fn entry<'key, Q>(&mut self, key: &'key Q) -> Entry<'_, 'key, T, Q>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let Some(root) = self.root else {
            return unsafe { Entry::vacant_root(self, key) };
        };

        let mut cur = root;

        loop {
            let ordering = unsafe { key.cmp(cur.as_ref().key().borrow()) };

            let dir = match ordering {
                Ordering::Less => Dir::Left,
                Ordering::Equal => return unsafe { Entry::occupied(self, cur) },
                Ordering::Greater => Dir::Right,
            };

            match unsafe { T::links(cur).as_ref().child(dir) } {
                Some(child) => cur = child,
                None => return unsafe { Entry::vacant_child(self, key, cur, dir) },
            }
        }
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already contains an element with an equal key, the tree
    /// is left untouched and `item` is handed back; the resident element
    /// stays reachable through [`get`](AvlTree::get). Otherwise the item
    /// is linked into the tree and `None` is returned.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);

        let Some(root) = self.root else {
            unsafe { self.insert_as_root(ptr) };
            return None;
        };

        let mut cur = root;

        // Descend the tree, looking for the attach point.
        loop {
            let ordering = unsafe { ptr.as_ref().key().cmp(cur.as_ref().key()) };

            let dir = match ordering {
                Ordering::Less => Dir::Left,
                // An element with this key is already present. Give the
                // item back untouched.
                Ordering::Equal => return Some(unsafe { T::from_ptr(ptr) }),
                Ordering::Greater => Dir::Right,
            };

            match unsafe { T::links(cur).as_ref().child(dir) } {
                Some(child) => cur = child,
                None => {
                    unsafe { self.insert_as_child(cur, dir, ptr) };
                    return None;
                }
            }
        }
    }

    // Links `ptr` in as the root of an empty tree.
    //
    // # Safety
    //
    // The tree must be empty and `ptr` must not be linked into any tree.
    pub(crate) unsafe fn insert_as_root(&mut self, ptr: NonNull<T>) {
        debug_assert!(self.root.is_none());

        unsafe { T::links(ptr).as_mut().clear() };

        self.root = Some(ptr);
        self.len += 1;
    }

    // Links `ptr` in as a new leaf in the empty `dir` slot of `parent`,
    // then repairs balance factors along the path to the root.
    //
    // # Safety
    //
    // `parent` must be an element of `self` with no `dir` child, `ptr`
    // must not be linked into any tree, and attaching it there must
    // preserve key ordering.
    pub(crate) unsafe fn insert_as_child(&mut self, parent: NonNull<T>, dir: Dir, ptr: NonNull<T>) {
        unsafe {
            debug_assert!(T::links(parent).as_ref().child(dir).is_none());

            let links = T::links(ptr).as_mut();
            links.clear();
            links.set_parent(Some(parent));

            T::links(parent).as_mut().set_child(dir, Some(ptr));
        }

        self.len += 1;
        self.rebalance_inserted(ptr);
    }

    // Performs a bottom-up repair of balance factors after the insertion
    // of `node` as a leaf.
    //
    // Each ancestor's factor moves one step toward the side the new leaf
    // hangs on. Reaching 0 means the sibling subtree was taller and the
    // insertion only evened things out: the subtree height is unchanged
    // and the walk stops. Landing on +/-1 means the subtree grew by one
    // level, so the walk continues. A would-be +/-2 invokes the rotation
    // engine, which fully restores the invariant after an insertion; the
    // walk stops unconditionally.
    fn rebalance_inserted(&mut self, node: NonNull<T>) {
        let mut child = node;
        let mut opt_parent = unsafe { T::links(child).as_ref().parent() };

        while let Some(parent) = opt_parent {
            let delta = unsafe { self.which_child(parent, child) }.delta();
            let balance = unsafe { T::links(parent).as_ref().balance() } + delta;

            match balance {
                0 => {
                    unsafe { T::links(parent).as_mut().set_balance(0) };
                    break;
                }
                -1 | 1 => unsafe { T::links(parent).as_mut().set_balance(balance) },
                _ => {
                    // The stored factor stays at +/-1; the rotation engine
                    // reads the violation side from its sign.
                    self.rebalance_subtree(parent);
                    break;
                }
            }

            child = parent;
            opt_parent = unsafe { T::links(parent).as_ref().parent() };
        }
    }

    /// Removes the element with the given key from the tree, if present.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        Some(unsafe { self.remove_at(node) })
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an
    /// element of `self`, and not of any other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        unsafe {
            let parent = T::links(node).as_ref().parent();

            if T::links(node).as_ref().is_leaf() {
                // A leaf detaches in place; the vacated slot of its former
                // parent is where the repair walk starts.
                match parent {
                    None => self.root = None,
                    Some(parent) => {
                        let vacated = self.which_child(parent, node);
                        T::links(parent).as_mut().set_child(vacated, None);
                        self.rebalance_removed(parent, vacated);
                    }
                }
            } else {
                // The node is structurally replaced by an in-order
                // neighbor, taken from its taller side so the substitution
                // cannot deepen the shorter subtree. The substitute is the
                // nearest element of that subtree and thus has at most one
                // child, on the side its own balance factor points to.
                let side = Dir::of_balance(T::links(node).as_ref().balance());
                let substitute = self
                    .neighbor_raw(node, side)
                    .or_else(|| self.neighbor_raw(node, !side))
                    .expect("a node with a child must have an in-order neighbor");

                let grandchild_side = Dir::of_balance(T::links(substitute).as_ref().balance());
                let grandchild = T::links(substitute).as_ref().child(grandchild_side);

                let sub_parent = T::links(substitute)
                    .as_ref()
                    .parent()
                    .expect("the substitute descends from the removed node");
                let vacated = self.which_child(sub_parent, substitute);

                let origin;
                if core::ptr::addr_eq(sub_parent.as_ptr(), node.as_ptr()) {
                    // The substitute is a direct child: it keeps its own
                    // subtree on the vacated side, and the repair walk
                    // starts at the substitute itself.
                    origin = substitute;
                } else {
                    // The substitute sits deeper: splice it out by
                    // promoting its sole child into its slot, and hand it
                    // the removed node's subtree it was carved out of. The
                    // repair walk starts at its former parent.
                    origin = sub_parent;

                    let carried = T::links(node).as_ref().child(vacated);
                    T::links(substitute).as_mut().set_child(vacated, carried);
                    self.maybe_set_parent(carried, Some(substitute));

                    T::links(sub_parent).as_mut().set_child(vacated, grandchild);
                    self.maybe_set_parent(grandchild, Some(sub_parent));
                }

                // The substitute assumes the removed node's other subtree,
                // balance factor and place under its parent.
                let other = T::links(node).as_ref().child(!vacated);
                T::links(substitute).as_mut().set_child(!vacated, other);
                self.maybe_set_parent(other, Some(substitute));

                let balance = T::links(node).as_ref().balance();
                T::links(substitute).as_mut().set_balance(balance);
                T::links(substitute).as_mut().set_parent(parent);
                self.replace_child_or_set_root(parent, node, Some(substitute));

                self.rebalance_removed(origin, vacated);
            }

            self.len -= 1;

            T::links(node).as_mut().clear();
            T::from_ptr(node)
        }
    }

    // Performs a bottom-up repair of balance factors after a removal,
    // starting at `from`, whose `vacated` subtree has shrunk by one level.
    //
    // This walk is the dual of the insertion repair: a factor reaching 0
    // means the whole subtree shrank, so ancestors must also be checked,
    // while a factor landing on +/-1 means the height is unchanged overall
    // and the walk stops. A would-be +/-2 invokes the rotation engine; the
    // walk continues only if the rotation shortened the subtree.
    fn rebalance_removed(&mut self, from: NonNull<T>, vacated: Dir) {
        let mut cur = from;
        let mut vacated = vacated;

        loop {
            // Capture the upward step before this level is mutated; a
            // rotation would otherwise change the answer.
            let up = unsafe {
                T::links(cur)
                    .as_ref()
                    .parent()
                    .map(|p| (p, self.which_child(p, cur)))
            };

            let delta = -vacated.delta();
            let balance = unsafe { T::links(cur).as_ref().balance() } + delta;

            match balance {
                0 => unsafe { T::links(cur).as_mut().set_balance(0) },
                -1 | 1 => {
                    unsafe { T::links(cur).as_mut().set_balance(balance) };
                    break;
                }
                _ => {
                    if self.rebalance_subtree(cur) == HeightChange::Unchanged {
                        break;
                    }
                }
            }

            match up {
                Some((parent, which)) => {
                    cur = parent;
                    vacated = which;
                }
                None => break,
            }
        }
    }

    // Restores the balance invariant of the subtree rooted at `node`,
    // whose measured balance has reached +/-2 (stored as +/-1, sign
    // pointing at the taller side).
    //
    // Dispatches on the heavy child's balance factor. Shown mirrored, for
    // a left-heavy `R` with heavy child `S`:
    //
    // Single (S leans the same way):
    //
    //     **R              S
    //      / \            / \
    //    *S   Y    ->    X   R
    //    / \ (h)       (h+1)/ \
    //   X   B              B   Y
    // (h+1)(h)            (h) (h)
    //
    // Both factors become 0 and the subtree ends up one level shorter.
    //
    // Double (S leans against the violation; its inner grandchild `Q` is
    // promoted above both):
    //
    //    **R                 Q
    //     / \             /     \
    //    S*  D           S       R
    //   / \ (h)    ->   / \     / \
    //  A   Q           A   B   C   D
    // (h) / \
    //    B   C
    //
    // B and C are at most one level apart; the resulting factors of S and
    // R follow from Q's pre-rotation factor, and Q becomes 0. One level
    // shorter.
    //
    // SingleBalanced (S is perfectly balanced; removal only):
    //
    //     **R              S*
    //      / \            / \
    //     S   Y    ->    X  *R
    //    / \(h-1)      (h)  / \
    //   X   B              B   Y
    // (h)  (h)            (h) (h-1)
    //
    // The new subtree root takes the negated factor of the old one, which
    // keeps its own. Height is unchanged, so the repair walk above stops.
    fn rebalance_subtree(&mut self, node: NonNull<T>) -> HeightChange {
        unsafe {
            let node_balance = T::links(node).as_ref().balance();
            let side = Dir::of_balance(node_balance);
            let child = T::links(node)
                .as_ref()
                .child(side)
                .expect("a violating node must have a child on its taller side");
            let child_balance = T::links(child).as_ref().balance();

            match Rotation::classify(node_balance, child_balance) {
                Rotation::Single => {
                    self.rotate_single(node, child, side);

                    T::links(node).as_mut().set_balance(0);
                    T::links(child).as_mut().set_balance(0);

                    HeightChange::Shrank
                }

                Rotation::Double => {
                    let pivot = T::links(child)
                        .as_ref()
                        .child(!side)
                        .expect("an opposite-leaning child must have an inner child");
                    let pivot_balance = T::links(pivot).as_ref().balance();

                    self.rotate_double(node, child, pivot, side);

                    if pivot_balance == child_balance {
                        T::links(child).as_mut().set_balance(-pivot_balance);
                        T::links(node).as_mut().set_balance(0);
                    } else if pivot_balance != 0 {
                        T::links(node).as_mut().set_balance(-pivot_balance);
                        T::links(child).as_mut().set_balance(0);
                    } else {
                        T::links(node).as_mut().set_balance(0);
                        T::links(child).as_mut().set_balance(0);
                    }
                    T::links(pivot).as_mut().set_balance(0);

                    HeightChange::Shrank
                }

                Rotation::SingleBalanced => {
                    self.rotate_single(node, child, side);

                    T::links(child).as_mut().set_balance(-node_balance);

                    HeightChange::Unchanged
                }
            }
        }
    }

    // Rotates `child` up to replace `node`, which becomes its `!side`
    // child; `child`'s former `!side` subtree moves to `node`'s emptied
    // `side` slot. Balance factors are not updated.
    unsafe fn rotate_single(&mut self, node: NonNull<T>, child: NonNull<T>, side: Dir) {
        unsafe {
            let parent = T::links(node).as_ref().parent();
            let across = T::links(child).as_ref().child(!side);

            self.replace_child_or_set_root(parent, node, Some(child));
            T::links(child).as_mut().set_parent(parent);

            T::links(node).as_mut().set_parent(Some(child));
            T::links(child).as_mut().set_child(!side, Some(node));

            T::links(node).as_mut().set_child(side, across);
            self.maybe_set_parent(across, Some(node));
        }
    }

    // Rotates `pivot` (the inner grandchild: the `!side` child of `child`,
    // itself the `side` child of `node`) up to replace `node`; `node` and
    // `child` become its two children and its former subtrees are
    // redistributed to the vacated slots. Balance factors are not updated.
    unsafe fn rotate_double(
        &mut self,
        node: NonNull<T>,
        child: NonNull<T>,
        pivot: NonNull<T>,
        side: Dir,
    ) {
        unsafe {
            let parent = T::links(node).as_ref().parent();
            let toward_node = T::links(pivot).as_ref().child(!side);
            let toward_child = T::links(pivot).as_ref().child(side);

            self.replace_child_or_set_root(parent, node, Some(pivot));
            T::links(pivot).as_mut().set_parent(parent);

            T::links(node).as_mut().set_child(side, toward_node);
            self.maybe_set_parent(toward_node, Some(node));

            T::links(child).as_mut().set_child(!side, toward_child);
            self.maybe_set_parent(toward_child, Some(child));

            T::links(pivot).as_mut().set_child(!side, Some(node));
            T::links(node).as_mut().set_parent(Some(pivot));

            T::links(pivot).as_mut().set_child(side, Some(child));
            T::links(child).as_mut().set_parent(Some(pivot));
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node of the current subtree.
                let mut parent = T::links(cur).as_ref().parent();
                let mut cur = cur;
                while let Some(left) = T::links(cur).as_ref().left() {
                    parent = Some(cur);
                    cur = left;
                }

                let right = T::links(cur).as_ref().right();

                // Elevate the node's right child (which may be None). No
                // rebalancing: the tree is being torn down wholesale.
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                self.len -= 1;
                T::links(cur).as_mut().clear();
                drop(T::from_ptr(cur));

                // If the node had no right child, climb to the parent. If
                // it had no parent either, the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Support methods ========================================================

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    // Returns which child slot of `parent` holds `child`.
    pub(crate) unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        unsafe {
            if T::links(parent).as_ref().left() == Some(child) {
                Dir::Left
            } else {
                debug_assert_eq!(T::links(parent).as_ref().right(), Some(child));
                Dir::Right
            }
        }
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with
    // `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    #[cfg(not(debug_assertions))]
    #[inline]
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Option<NonNull<T>>,
    ) {
        unsafe {
            if T::links(parent).as_ref().child(Dir::Left) == Some(old_child) {
                T::links(parent).as_mut().set_child(Dir::Left, new_child);
            } else {
                T::links(parent).as_mut().set_child(Dir::Right, new_child);
            }
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with
    // `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    #[cfg(debug_assertions)]
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Option<NonNull<T>>,
    ) {
        unsafe {
            if T::links(parent).as_ref().child(Dir::Left) == Some(old_child) {
                if let Some(new_child) = new_child {
                    assert_ne!(
                        T::links(parent).as_ref().child(Dir::Right),
                        Some(new_child),
                        "`new_child` must not be a child of `parent`"
                    );
                }

                T::links(parent).as_mut().set_child(Dir::Left, new_child);
            } else if T::links(parent).as_ref().child(Dir::Right) == Some(old_child) {
                if let Some(new_child) = new_child {
                    assert_ne!(
                        T::links(parent).as_ref().child(Dir::Left),
                        Some(new_child),
                        "`new_child` must not be a child of `parent`"
                    );
                }

                T::links(parent).as_mut().set_child(Dir::Right, new_child);
            } else {
                unreachable!("`old_child` must be a child of `parent`");
            }
        }
    }

    pub(crate) unsafe fn links<'a>(&'a self, ptr: NonNull<T>) -> &'a Links<T> {
        unsafe { T::links(ptr).as_ref() }
    }

    pub(crate) unsafe fn links_mut<'a>(&'a mut self, ptr: NonNull<T>) -> &'a mut Links<T> {
        unsafe { T::links(ptr).as_mut() }
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                balance: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.left().is_none() && self.right().is_none()
    }

    #[inline]
    fn balance(&self) -> i8 {
        unsafe { (*self.inner.get()).balance }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_balance(&mut self, balance: i8) {
        self.inner.get_mut().balance = balance;
    }

    // Resets the links to their unlinked state.
    #[inline]
    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.balance = 0;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("balance", &self.balance())
            .finish()
    }
}
