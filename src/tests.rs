extern crate std;

use std::{ops::Range, prelude::v1::*};

use proptest::prelude::*;

use crate::model::{self, TestNode};

use super::*;

fn insert_find_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

#[test]
fn four_elems_find() {
    insert_find_all(&[0, 1, 2, 3]);
    insert_find_all(&[0, 1, 3, 2]);
    insert_find_all(&[0, 2, 1, 3]);
    insert_find_all(&[0, 2, 3, 1]);
    insert_find_all(&[0, 3, 1, 2]);
    insert_find_all(&[0, 3, 2, 1]);

    insert_find_all(&[1, 0, 2, 3]);
    insert_find_all(&[1, 0, 3, 2]);
    insert_find_all(&[1, 2, 0, 3]);
    insert_find_all(&[1, 2, 3, 0]);
    insert_find_all(&[1, 3, 0, 2]);
    insert_find_all(&[1, 3, 2, 0]);

    insert_find_all(&[2, 0, 1, 3]);
    insert_find_all(&[2, 0, 3, 1]);
    insert_find_all(&[2, 1, 0, 3]);
    insert_find_all(&[2, 1, 3, 0]);
    insert_find_all(&[2, 3, 0, 1]);
    insert_find_all(&[2, 3, 1, 0]);

    insert_find_all(&[3, 0, 1, 2]);
    insert_find_all(&[3, 0, 2, 1]);
    insert_find_all(&[3, 1, 0, 2]);
    insert_find_all(&[3, 1, 2, 0]);
    insert_find_all(&[3, 2, 0, 1]);
    insert_find_all(&[3, 2, 1, 0]);
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        unsafe { tree.remove_at(node) };
        tree.assert_invariants();
    }

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        let node = tree.get_raw(key).expect("item not found");
        unsafe { tree.remove_at(node) };
        tree.assert_invariants();
    }
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn remove_four() {
    insert_remove_all(&[0, 1, 2, 3]);
    insert_remove_all(&[0, 1, 3, 2]);
    insert_remove_all(&[0, 2, 1, 3]);
    insert_remove_all(&[0, 2, 3, 1]);
    insert_remove_all(&[0, 3, 1, 2]);
    insert_remove_all(&[0, 3, 2, 1]);

    insert_remove_all(&[1, 0, 2, 3]);
    insert_remove_all(&[1, 0, 3, 2]);
    insert_remove_all(&[1, 2, 0, 3]);
    insert_remove_all(&[1, 2, 3, 0]);
    insert_remove_all(&[1, 3, 0, 2]);
    insert_remove_all(&[1, 3, 2, 0]);

    insert_remove_all(&[2, 0, 1, 3]);
    insert_remove_all(&[2, 0, 3, 1]);
    insert_remove_all(&[2, 1, 0, 3]);
    insert_remove_all(&[2, 1, 3, 0]);
    insert_remove_all(&[2, 3, 0, 1]);
    insert_remove_all(&[2, 3, 1, 0]);

    insert_remove_all(&[3, 0, 1, 2]);
    insert_remove_all(&[3, 0, 2, 1]);
    insert_remove_all(&[3, 1, 0, 2]);
    insert_remove_all(&[3, 1, 2, 0]);
    insert_remove_all(&[3, 2, 0, 1]);
    insert_remove_all(&[3, 2, 1, 0]);
}

// Returns the measured height of the tree: the number of edges on the
// longest root-to-leaf path, or -1 for an empty tree.
fn height(tree: &AvlTree<TestNode>) -> i32 {
    fn height_at(node: Link<TestNode>) -> i32 {
        match node {
            None => -1,
            Some(node) => unsafe {
                let links = TestNode::links(node);
                let left = height_at(links.as_ref().left());
                let right = height_at(links.as_ref().right());
                1 + left.max(right)
            },
        }
    }

    height_at(tree.root)
}

#[test]
fn rotations_bound_height() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [5, 3, 8, 1, 4, 7, 9] {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    // Seven elements fit in a tree of height 2; anything taller means a
    // rotation was missed.
    assert_eq!(tree.len(), 7);
    assert!(height(&tree) <= 2);

    assert!(tree.contains_key(&8));
    assert!(!tree.contains_key(&6));

    let removed = tree.remove(&5).expect("item not found");
    assert_eq!(removed.key, 5);
    tree.assert_invariants();

    // The root was removed; an in-order neighbor must have been promoted
    // in its place.
    let root = tree.root.expect("tree must not be empty");
    assert!(matches!(unsafe { root.as_ref().key }, 4 | 7));
}

#[test]
fn duplicate_insert_rejected() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [2, 1, 3, 4] {
        assert!(tree.insert(TestNode::new(key)).is_none());
    }

    let snapshot: Vec<(u32, i8)> = tree.iter().map(|n| (n.key, n.links.balance())).collect();

    let rejected = tree.insert(TestNode::new(2)).expect("duplicate not rejected");
    assert_eq!(rejected.key, 2);

    // The rejected node must come back unlinked and the tree untouched:
    // same elements, same balance factors.
    assert!(rejected.links.is_leaf());
    assert_eq!(tree.len(), 4);

    let after: Vec<(u32, i8)> = tree.iter().map(|n| (n.key, n.links.balance())).collect();
    assert_eq!(snapshot, after);

    tree.assert_invariants();
}

#[test]
fn node_debug_is_formattable() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    tree.insert(TestNode::new(1));
    tree.insert(TestNode::new(2));

    let node = tree.get(&1).expect("item not found");
    let rendered = format!("{node:?}");
    assert!(rendered.contains("key: 1"));
    assert!(rendered.contains("balance"));
}

#[test]
#[cfg_attr(miri, ignore)]
fn invariants_random_churn() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    let mut present = [false; 512];

    let mut state = 0x243f_6a88_85a3_08d3_u64;
    let mut next_key = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as u32 % 512
    };

    for _ in 0..20_000 {
        let key = next_key();

        if present[key as usize] {
            let node = tree.get_raw(&key).expect("item not found");
            unsafe { tree.remove_at(node) };
            present[key as usize] = false;
        } else {
            assert!(tree.insert(TestNode::new(key)).is_none());
            present[key as usize] = true;
        }

        tree.assert_invariants();
    }

    assert_eq!(tree.len(), present.iter().filter(|&&p| p).count());
}

#[test]
fn empty_tree_lookups() {
    let tree: AvlTree<TestNode> = AvlTree::new();

    assert!(tree.is_empty());
    assert!(tree.get(&0).is_none());
    assert!(tree.first().is_none());
    assert!(tree.last().is_none());
    assert_eq!(tree.iter().count(), 0);
}

#[test]
fn remove_sole_node_empties_tree() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    tree.insert(TestNode::new(7));
    let removed = tree.remove(&7).expect("item not found");

    assert_eq!(removed.key, 7);
    assert!(tree.is_empty());
    assert!(tree.root.is_none());
    tree.assert_invariants();
}

#[test]
fn iter_yields_sorted_both_ways() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    let keys = [5, 3, 8, 1, 4, 7, 9, 2, 6, 0];
    for key in keys {
        tree.insert(TestNode::new(key));
    }

    let forward: Vec<u32> = tree.iter().map(|node| node.key).collect();
    assert_eq!(forward, (0..10).collect::<Vec<u32>>());

    let backward: Vec<u32> = tree.iter().rev().map(|node| node.key).collect();
    assert_eq!(backward, (0..10).rev().collect::<Vec<u32>>());

    assert_eq!(tree.iter().len(), 10);
}

#[test]
fn cursor_walks_and_wraps() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [2, 1, 3] {
        tree.insert(TestNode::new(key));
    }

    let mut curs = tree.cursor_first();
    assert_eq!(curs.get().map(|n| n.key), Some(1));

    curs.move_next();
    assert_eq!(curs.get().map(|n| n.key), Some(2));
    assert_eq!(curs.peek_prev().map(|n| n.key), Some(1));
    assert_eq!(curs.peek_next().map(|n| n.key), Some(3));

    curs.move_next();
    curs.move_next();
    assert_eq!(curs.get().map(|n| n.key), None);

    // Moving past the end wraps through the ghost element.
    curs.move_next();
    assert_eq!(curs.get().map(|n| n.key), Some(1));

    let mut curs = tree.cursor_last_mut();
    assert_eq!(curs.get().map(|n| n.key), Some(3));

    let removed = curs.remove_current().expect("cursor must point at an element");
    assert_eq!(removed.key, 3);
    assert_eq!(curs.get().map(|n| n.key), None);

    tree.assert_invariants();
    assert_eq!(tree.len(), 2);
}

#[test]
fn entry_vacant_and_occupied() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    match tree.entry(&5) {
        Entry::Occupied(_) => panic!("entry must be vacant"),
        Entry::Vacant(vacant) => {
            assert_eq!(*vacant.key(), 5);
            unsafe { vacant.insert(TestNode::new(5)) };
        }
    }

    tree.assert_invariants();
    assert_eq!(tree.len(), 1);

    match tree.entry(&5) {
        Entry::Vacant(_) => panic!("entry must be occupied"),
        Entry::Occupied(mut occupied) => {
            assert_eq!(occupied.get().key, 5);

            let old = unsafe { occupied.insert(TestNode::new(5)) };
            assert_eq!(old.key, 5);
        }
    }

    tree.assert_invariants();
    assert_eq!(tree.len(), 1);

    match tree.entry(&5) {
        Entry::Vacant(_) => panic!("entry must be occupied"),
        Entry::Occupied(occupied) => {
            let removed = occupied.remove();
            assert_eq!(removed.key, 5);
        }
    }

    tree.assert_invariants();
    assert!(tree.is_empty());
}

#[test]
fn map_insert_get_remove() {
    let mut map: AvlMap<u32, &str> = AvlMap::new();

    assert_eq!(map.insert(1, "one"), None);
    assert_eq!(map.insert(2, "two"), None);
    assert_eq!(map.insert(1, "uno"), Some("one"));

    assert_eq!(map.len(), 2);
    assert_eq!(map.get(&1), Some(&"uno"));
    assert!(map.contains_key(&2));
    assert!(!map.contains_key(&3));

    if let Some(value) = map.get_mut(&2) {
        *value = "dos";
    }

    assert_eq!(map.first_key_value(), Some((&1, &"uno")));
    assert_eq!(map.last_key_value(), Some((&2, &"dos")));

    assert_eq!(map.remove(&1), Some("uno"));
    assert_eq!(map.remove(&1), None);

    assert_eq!(map.pop_first(), Some((2, "dos")));
    assert!(map.is_empty());
}

#[test]
fn map_pop_ends() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for key in [4, 2, 6, 1, 3] {
        map.insert(key, key * 10);
    }

    assert_eq!(map.pop_first(), Some((1, 10)));
    assert_eq!(map.pop_last(), Some((6, 60)));
    assert_eq!(map.len(), 3);

    map.clear();
    assert!(map.is_empty());
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn cursor_equivalence(
        values in proptest::collection::vec(0u32..100, 0..50),
        ops in proptest::collection::vec(model::cursor_op_strategy(), FUZZ_RANGE),
    ) {
        model::run_cursor_equivalence(values, ops);
    }
}
