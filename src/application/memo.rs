//! Identity-keyed single-entry caches over the hot tree computations
//!
//! Each cached function remembers its most recent call. Inputs are compared by
//! identity (`Rc::ptr_eq`), never structurally, so a hit is O(1) and returns the
//! very same `Rc` as the previous call.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::domain::{
    flatten, get_descendant_count, insert_node, DomainResult, FlatRow, Inserted, KeyOf, NodeRef,
    Tree,
};

fn same_key_of(a: &Rc<dyn KeyOf>, b: &Rc<dyn KeyOf>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

struct FlattenEntry {
    tree: Tree,
    key_of: Rc<dyn KeyOf>,
    ignore_collapsed: bool,
    rows: Rc<Vec<FlatRow>>,
}

struct InsertEntry {
    tree: Tree,
    new_node: NodeRef,
    depth: usize,
    minimum_tree_index: usize,
    expand_parent: bool,
    key_of: Rc<dyn KeyOf>,
    inserted: Rc<Inserted>,
}

struct CountEntry {
    node: NodeRef,
    ignore_collapsed: bool,
    count: usize,
}

#[derive(Default)]
pub struct TreeDataMemo {
    flatten: RefCell<Option<FlattenEntry>>,
    insert: RefCell<Option<InsertEntry>>,
    descendants: RefCell<Option<CountEntry>>,
}

impl TreeDataMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flatten(&self, tree: &Tree, key_of: &Rc<dyn KeyOf>, ignore_collapsed: bool) -> Rc<Vec<FlatRow>> {
        if let Some(entry) = self.flatten.borrow().as_ref() {
            if entry.tree.ptr_eq(tree)
                && same_key_of(&entry.key_of, key_of)
                && entry.ignore_collapsed == ignore_collapsed
            {
                trace!("memo hit: flatten");
                return Rc::clone(&entry.rows);
            }
        }

        trace!("memo miss: flatten");
        let rows = Rc::new(flatten(tree, key_of.as_ref(), ignore_collapsed));
        *self.flatten.borrow_mut() = Some(FlattenEntry {
            tree: tree.clone(),
            key_of: Rc::clone(key_of),
            ignore_collapsed,
            rows: Rc::clone(&rows),
        });
        rows
    }

    /// Cached `insert_node`. Failed insertions are not cached.
    pub fn insert_node(
        &self,
        tree: &Tree,
        new_node: &NodeRef,
        depth: usize,
        minimum_tree_index: usize,
        expand_parent: bool,
        key_of: &Rc<dyn KeyOf>,
    ) -> DomainResult<Rc<Inserted>> {
        if let Some(entry) = self.insert.borrow().as_ref() {
            if entry.tree.ptr_eq(tree)
                && Rc::ptr_eq(&entry.new_node, new_node)
                && entry.depth == depth
                && entry.minimum_tree_index == minimum_tree_index
                && entry.expand_parent == expand_parent
                && same_key_of(&entry.key_of, key_of)
            {
                trace!("memo hit: insert_node");
                return Ok(Rc::clone(&entry.inserted));
            }
        }

        trace!("memo miss: insert_node");
        let inserted = Rc::new(insert_node(
            tree,
            new_node,
            depth,
            minimum_tree_index,
            expand_parent,
            key_of.as_ref(),
        )?);
        *self.insert.borrow_mut() = Some(InsertEntry {
            tree: tree.clone(),
            new_node: Rc::clone(new_node),
            depth,
            minimum_tree_index,
            expand_parent,
            key_of: Rc::clone(key_of),
            inserted: Rc::clone(&inserted),
        });
        Ok(inserted)
    }

    pub fn descendant_count(&self, node: &NodeRef, ignore_collapsed: bool) -> usize {
        if let Some(entry) = self.descendants.borrow().as_ref() {
            if Rc::ptr_eq(&entry.node, node) && entry.ignore_collapsed == ignore_collapsed {
                trace!("memo hit: descendant_count");
                return entry.count;
            }
        }

        trace!("memo miss: descendant_count");
        let count = get_descendant_count(node, ignore_collapsed);
        *self.descendants.borrow_mut() = Some(CountEntry {
            node: Rc::clone(node),
            ignore_collapsed,
            count,
        });
        count
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.flatten.borrow_mut().take();
        self.insert.borrow_mut().take();
        self.descendants.borrow_mut().take();
    }
}

impl std::fmt::Debug for TreeDataMemo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeDataMemo")
            .field("flatten", &self.flatten.borrow().is_some())
            .field("insert", &self.insert.borrow().is_some())
            .field("descendants", &self.descendants.borrow().is_some())
            .finish()
    }
}
