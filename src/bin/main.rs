use std::{fmt, ptr::NonNull};

use cordyceps::Linked;
use cordyceps_avl::{AvlTree, Links, TreeNode};

#[derive(Debug)]
#[repr(C)]
struct DemoNode {
    links: Links<DemoNode>,
    key: u32,
}

impl DemoNode {
    fn new(key: u32) -> Box<DemoNode> {
        Box::new(DemoNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<DemoNode>> for DemoNode {
    type Handle = Box<DemoNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::new(Box::into_raw(r)).unwrap()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<DemoNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<DemoNode>> for DemoNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

struct DotKey(u32);

impl From<&u32> for DotKey {
    fn from(key: &u32) -> DotKey {
        DotKey(*key)
    }
}

impl fmt::Display for DotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

fn main() {
    let mut tree: AvlTree<DemoNode> = AvlTree::new();

    for key in [5, 3, 8, 1, 4, 7, 9] {
        tree.insert(DemoNode::new(key));
        tree.assert_invariants();
        println!("{:?}", tree.iter().map(|node| node.key).collect::<Vec<_>>());
    }

    let mut dot = String::new();
    tree.dotgraph::<_, DotKey>("demo", &mut dot).unwrap();
    println!("{dot}");

    let one = tree.pop_first().unwrap().key;
    assert_eq!(one, 1);
    tree.assert_invariants();

    let five = tree.remove(&5).unwrap().key;
    assert_eq!(five, 5);
    tree.assert_invariants();

    println!("{:?}", tree.iter().map(|node| node.key).collect::<Vec<_>>());

    drop(tree);
}
