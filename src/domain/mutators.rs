//! Pure tree mutators: every operation returns a new tree sharing untouched subtrees

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::rc::Rc;

use tracing::{debug, instrument};

use super::error::{DomainError, DomainResult};
use super::node::{child_path, Children, KeyOf, Node, NodeKey, NodeRef, Tree, TreeIndexKey, TreePath};
use super::path::{with_node_at, Resolved};
use super::walk::{walk, Visit};

/// Outcome of `remove_node`.
#[derive(Debug, Clone)]
pub struct Removed {
    pub tree: Tree,
    pub node: NodeRef,
    /// Visible index the node had before removal
    pub tree_index: usize,
}

/// Outcome of `insert_node`.
#[derive(Debug, Clone)]
pub struct Inserted {
    pub tree: Tree,
    pub tree_index: usize,
    pub path: TreePath,
    /// `None` when the node became a root
    pub parent_node: Option<NodeRef>,
}

/// Outcome of `add_node_under_parent`.
#[derive(Debug, Clone)]
pub struct Added {
    pub tree: Tree,
    pub tree_index: usize,
}

/// Remove the node at `path` together with its subtree.
#[instrument(level = "debug", skip(tree, key_of))]
pub fn remove_node(tree: &Tree, path: &[NodeKey], key_of: &dyn KeyOf) -> DomainResult<Removed> {
    let (tree, Resolved { node, tree_index }) = with_node_at(tree, path, key_of, |_, _| None)?;
    debug!(tree_index, "removed node");
    Ok(Removed {
        tree,
        node,
        tree_index,
    })
}

/// Replace the node at `path` with `updater(old, tree_index)`.
pub fn change_node_at_path<U>(
    tree: &Tree,
    path: &[NodeKey],
    key_of: &dyn KeyOf,
    updater: U,
) -> DomainResult<Tree>
where
    U: FnOnce(&NodeRef, usize) -> NodeRef,
{
    with_node_at(tree, path, key_of, |old, index| Some(updater(old, index))).map(|(tree, _)| tree)
}

struct InsertInfo {
    tree_index: usize,
    parent_path: TreePath,
    parent_node: Option<NodeRef>,
}

struct InsertStep {
    node: NodeRef,
    next_index: isize,
    inserted: Option<InsertInfo>,
}

struct Inserter<'a> {
    target_depth: isize,
    minimum_tree_index: isize,
    new_node: &'a NodeRef,
    ignore_collapsed: bool,
    expand_parent: bool,
    key_of: &'a dyn KeyOf,
}

impl Inserter<'_> {
    fn skip(node: &NodeRef, next_index: isize) -> InsertStep {
        InsertStep {
            node: Rc::clone(node),
            next_index,
            inserted: None,
        }
    }

    fn visible_children<'n>(&self, node: &'n NodeRef, is_pseudo_root: bool) -> Option<&'n [NodeRef]> {
        if !is_pseudo_root && self.ignore_collapsed && !node.expanded {
            return None;
        }
        node.children.loaded()
    }

    fn with_children(&self, node: &NodeRef, children: Vec<NodeRef>, is_pseudo_root: bool) -> NodeRef {
        let mut next = (**node).clone();
        if self.expand_parent && !is_pseudo_root {
            next.expanded = true;
        }
        next.children = Children::Loaded(children);
        Rc::new(next)
    }

    fn add(
        &self,
        node: &NodeRef,
        is_pseudo_root: bool,
        is_last_child: bool,
        current_index: isize,
        current_depth: isize,
        path: &[NodeKey],
    ) -> DomainResult<InsertStep> {
        let has_children = node.children.has_loaded() || node.children.is_lazy();

        // The current position is the only remaining place to add
        if current_index >= self.minimum_tree_index - 1 || (is_last_child && !has_children) {
            let existing = match &node.children {
                Children::Lazy(_) => return Err(DomainError::lazy_children(path)),
                Children::Loaded(children) => children.as_slice(),
                Children::None => &[],
            };
            let mut children = Vec::with_capacity(existing.len() + 1);
            children.push(Rc::clone(self.new_node));
            children.extend(existing.iter().cloned());
            let next = self.with_children(node, children, is_pseudo_root);
            return Ok(InsertStep {
                node: Rc::clone(&next),
                next_index: current_index + 2,
                inserted: Some(InsertInfo {
                    tree_index: (current_index + 1) as usize,
                    parent_path: path.to_vec(),
                    parent_node: (!is_pseudo_root).then_some(next),
                }),
            });
        }

        // The new node can go among this node's children
        if current_depth >= self.target_depth - 1 {
            let Some(children) = self.visible_children(node, is_pseudo_root) else {
                return Ok(Self::skip(node, current_index + 1));
            };

            let mut child_index = current_index + 1;
            let mut slot = None;
            for (i, child) in children.iter().enumerate() {
                if child_index >= self.minimum_tree_index {
                    slot = Some((i, child_index));
                    break;
                }
                child_index += 1 + get_descendant_count(child, self.ignore_collapsed) as isize;
            }

            let (position, inserted_index) = match slot {
                Some(found) => found,
                None => {
                    // More rows follow this node; keep scanning for a later slot
                    if child_index < self.minimum_tree_index && !is_last_child {
                        return Ok(Self::skip(node, child_index));
                    }
                    (children.len(), child_index)
                }
            };

            let mut next_children = children.to_vec();
            next_children.insert(position, Rc::clone(self.new_node));
            let next = self.with_children(node, next_children, is_pseudo_root);
            return Ok(InsertStep {
                node: Rc::clone(&next),
                next_index: child_index,
                inserted: Some(InsertInfo {
                    tree_index: inserted_index as usize,
                    parent_path: path.to_vec(),
                    parent_node: (!is_pseudo_root).then_some(next),
                }),
            });
        }

        // Too shallow: descend
        let Some(children) = self.visible_children(node, is_pseudo_root) else {
            return Ok(Self::skip(node, current_index + 1));
        };

        let mut child_index = current_index + 1;
        let mut next_children = Vec::with_capacity(children.len());
        let mut inserted = None;
        let last = children.len().saturating_sub(1);
        for (i, child) in children.iter().enumerate() {
            if inserted.is_some() {
                next_children.push(Rc::clone(child));
                continue;
            }
            let own_path = child_path(path, child, child_index as usize, self.key_of);
            let step = self.add(
                child,
                false,
                is_last_child && i == last,
                child_index,
                current_depth + 1,
                &own_path,
            )?;
            inserted = step.inserted;
            child_index = step.next_index;
            next_children.push(step.node);
        }

        match inserted {
            None => Ok(Self::skip(node, child_index)),
            Some(info) => {
                let mut next = (**node).clone();
                next.children = Children::Loaded(next_children);
                Ok(InsertStep {
                    node: Rc::new(next),
                    next_index: child_index,
                    inserted: Some(info),
                })
            }
        }
    }
}

/// Insert `new_node` at `depth` in the first visible slot at or after `minimum_tree_index`.
///
/// When the scan reaches `minimum_tree_index - 1` before reaching `depth`, the node
/// is prepended to the children of the row found there, so the requested depth is
/// clamped to what the tree allows.
#[instrument(level = "debug", skip(tree, new_node, key_of))]
pub fn insert_node(
    tree: &Tree,
    new_node: &NodeRef,
    depth: usize,
    minimum_tree_index: usize,
    expand_parent: bool,
    key_of: &dyn KeyOf,
) -> DomainResult<Inserted> {
    let inserter = Inserter {
        target_depth: depth as isize,
        minimum_tree_index: minimum_tree_index as isize,
        new_node,
        ignore_collapsed: true,
        expand_parent,
        key_of,
    };
    let pseudo_root = Rc::new(Node {
        children: Children::Loaded(tree.roots().to_vec()),
        expanded: true,
        ..Node::default()
    });

    let step = inserter.add(&pseudo_root, true, true, -1, -1, &[])?;
    let info = step.inserted.ok_or(DomainError::NoInsertPosition {
        depth,
        minimum_tree_index,
    })?;
    let roots = step.node.children.loaded().map(<[NodeRef]>::to_vec).unwrap_or_default();
    let path = child_path(&info.parent_path, new_node, info.tree_index, key_of);
    debug!(tree_index = info.tree_index, depth = path.len() - 1, "inserted node");

    Ok(Inserted {
        tree: Tree::from_refs(roots),
        tree_index: info.tree_index,
        path,
        parent_node: info.parent_node,
    })
}

struct Mapper<'a, F> {
    key_of: &'a dyn KeyOf,
    ignore_collapsed: bool,
    callback: F,
    path: TreePath,
    lower_sibling_counts: Vec<usize>,
    next_index: usize,
}

impl<F> Mapper<'_, F>
where
    F: FnMut(&Visit<'_>) -> NodeRef,
{
    fn children(&mut self, children: &[NodeRef], parent: Option<&NodeRef>) -> Vec<NodeRef> {
        let count = children.len();
        let mut mapped = Vec::with_capacity(count);
        for (i, child) in children.iter().enumerate() {
            let tree_index = self.next_index;
            self.next_index += 1;
            let key = self.key_of.key_of(child, tree_index, &self.path);
            self.path.push(key);
            self.lower_sibling_counts.push(count - i - 1);

            let mut current = Rc::clone(child);
            if child.expanded || !self.ignore_collapsed {
                if let Some(grandchildren) = child.children.loaded() {
                    let next = self.children(grandchildren, Some(child));
                    let unchanged = next.iter().zip(grandchildren).all(|(a, b)| Rc::ptr_eq(a, b))
                        && next.len() == grandchildren.len();
                    if !unchanged {
                        let mut node = (**child).clone();
                        node.children = Children::Loaded(next);
                        current = Rc::new(node);
                    }
                }
            }

            let replacement = (self.callback)(&Visit {
                node: &current,
                parent_node: parent,
                path: &self.path,
                lower_sibling_counts: &self.lower_sibling_counts,
                tree_index,
            });
            mapped.push(replacement);

            self.path.pop();
            self.lower_sibling_counts.pop();
        }
        mapped
    }
}

/// Rebuild the tree bottom-up: each node's children are mapped before the node itself.
///
/// The callback sees the node with its already-mapped children and returns the
/// replacement. With `ignore_collapsed`, collapsed subtrees are not descended into.
#[instrument(level = "trace", skip_all, fields(ignore_collapsed))]
pub fn map<F>(tree: &Tree, key_of: &dyn KeyOf, ignore_collapsed: bool, callback: F) -> Tree
where
    F: FnMut(&Visit<'_>) -> NodeRef,
{
    let mut mapper = Mapper {
        key_of,
        ignore_collapsed,
        callback,
        path: Vec::new(),
        lower_sibling_counts: Vec::new(),
        next_index: 0,
    };
    Tree::from_refs(mapper.children(tree.roots(), None))
}

/// Set `expanded` on every node, hidden ones included.
#[instrument(level = "debug", skip(tree))]
pub fn toggle_expanded_for_all(tree: &Tree, expanded: bool) -> Tree {
    map(tree, &TreeIndexKey, false, |visit| {
        if visit.node.expanded == expanded {
            Rc::clone(visit.node)
        } else {
            Rc::new(Node {
                expanded,
                ..(**visit.node).clone()
            })
        }
    })
}

/// Height of the subtree below `node`: 0 for leaves, 1 for an unloaded lazy loader.
pub fn get_depth(node: &Node) -> usize {
    match &node.children {
        Children::None => 0,
        Children::Lazy(_) => 1,
        Children::Loaded(children) => children
            .iter()
            .map(|child| 1 + get_depth(child))
            .max()
            .unwrap_or(0),
    }
}

/// Number of descendants of `node` (not counting itself).
///
/// Unloaded lazy children count as zero; with `ignore_collapsed`, so do the
/// descendants of a collapsed node.
pub fn get_descendant_count(node: &Node, ignore_collapsed: bool) -> usize {
    if ignore_collapsed && !node.expanded {
        return 0;
    }
    match &node.children {
        Children::Loaded(children) => children
            .iter()
            .map(|child| 1 + get_descendant_count(child, ignore_collapsed))
            .sum(),
        _ => 0,
    }
}

/// Number of rows a collapse-aware flatten would produce.
pub fn get_visible_node_count(tree: &Tree) -> usize {
    tree.roots()
        .iter()
        .map(|root| 1 + get_descendant_count(root, true))
        .sum()
}

/// Identity-based ancestry test: is `younger` somewhere below `older`?
pub fn is_descendant(older: &Node, younger: &NodeRef) -> bool {
    older
        .children
        .loaded()
        .is_some_and(|children| children.iter().any(|c| Rc::ptr_eq(c, younger) || is_descendant(c, younger)))
}

/// Add `new_node` as the last (or first) child of the visible node keyed `parent_key`.
///
/// `None` adds a root.
#[instrument(level = "debug", skip(tree, new_node, key_of))]
pub fn add_node_under_parent(
    tree: &Tree,
    new_node: &NodeRef,
    parent_key: Option<&NodeKey>,
    key_of: &dyn KeyOf,
    expand_parent: bool,
    add_as_first_child: bool,
) -> DomainResult<Added> {
    let Some(parent_key) = parent_key else {
        let mut roots = tree.roots().to_vec();
        let tree_index = if add_as_first_child {
            roots.insert(0, Rc::clone(new_node));
            0
        } else {
            let index = get_visible_node_count(tree);
            roots.push(Rc::clone(new_node));
            index
        };
        return Ok(Added {
            tree: Tree::from_refs(roots),
            tree_index,
        });
    };

    let mut parent_path: Option<TreePath> = None;
    walk(tree, key_of, true, |visit| {
        if visit.path.last() == Some(parent_key) {
            parent_path = Some(visit.path.to_vec());
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    let parent_path = parent_path.ok_or_else(|| DomainError::ParentNotFound {
        key: parent_key.to_string(),
    })?;

    let mut outcome: DomainResult<usize> = Ok(0);
    let (tree, _) = with_node_at(tree, &parent_path, key_of, |parent, parent_index| {
        let existing = match &parent.children {
            Children::Lazy(_) => {
                outcome = Err(DomainError::lazy_children(&parent_path));
                return Some(Rc::clone(parent));
            }
            Children::Loaded(children) => children.as_slice(),
            Children::None => &[],
        };
        let mut children = existing.to_vec();
        outcome = Ok(if add_as_first_child {
            children.insert(0, Rc::clone(new_node));
            parent_index + 1
        } else {
            let index = parent_index
                + 1
                + existing
                    .iter()
                    .map(|c| 1 + get_descendant_count(c, true))
                    .sum::<usize>();
            children.push(Rc::clone(new_node));
            index
        });
        let mut next = (**parent).clone();
        if expand_parent {
            next.expanded = true;
        }
        next.children = Children::Loaded(children);
        Some(Rc::new(next))
    })?;

    Ok(Added {
        tree,
        tree_index: outcome?,
    })
}

/// A node described by its own key and its parent's key.
#[derive(Debug, Clone)]
pub struct FlatRecord {
    pub key: String,
    pub parent_key: Option<String>,
    pub node: Node,
}

/// Assemble a tree from flat records; records whose parent key equals `root_key` become roots.
///
/// Each record keeps its relative order among its siblings. Records not reachable
/// from the root key are dropped. Nodes without an id take their record key as id.
#[instrument(level = "debug", skip(records))]
pub fn get_tree_from_flat_data(
    records: impl IntoIterator<Item = FlatRecord>,
    root_key: Option<&str>,
) -> Tree {
    let mut by_parent: HashMap<Option<String>, Vec<FlatRecord>> = HashMap::new();
    for record in records {
        by_parent.entry(record.parent_key.clone()).or_default().push(record);
    }

    fn build(record: FlatRecord, by_parent: &mut HashMap<Option<String>, Vec<FlatRecord>>) -> NodeRef {
        let FlatRecord { key, node, .. } = record;
        let mut node = node;
        if let Some(children) = by_parent.remove(&Some(key.clone())) {
            node.children = Children::Loaded(
                children
                    .into_iter()
                    .map(|child| build(child, by_parent))
                    .collect(),
            );
        }
        if node.id.is_none() {
            node.id = Some(key);
        }
        Rc::new(node)
    }

    let roots = by_parent
        .remove(&root_key.map(str::to_string))
        .unwrap_or_default();
    let roots = roots
        .into_iter()
        .map(|record| build(record, &mut by_parent))
        .collect();
    Tree::from_refs(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[test]
    fn given_leaf_when_depth_then_zero() {
        assert_eq!(get_depth(&Node::new("x")), 0);
        assert_eq!(get_depth(&Node::new("x").with_children(vec![])), 0);
    }

    #[test]
    fn given_lazy_children_when_depth_then_counts_one_level() {
        let node = Node::new("x").with_lazy_children(|_| futures::future::ready(Ok(vec![])).boxed_local());
        assert_eq!(get_depth(&node), 1);
        assert_eq!(get_descendant_count(&node, false), 0);
    }

    #[test]
    fn given_collapsed_node_when_counting_visible_then_zero() {
        let node = Node::new("x").with_children(vec![Node::new("y")]);
        assert_eq!(get_descendant_count(&node, true), 0);
        assert_eq!(get_descendant_count(&node, false), 1);
    }
}
