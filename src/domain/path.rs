//! Path addressing: resolve key paths to nodes and rebuild the spine above them

use std::rc::Rc;

use tracing::{instrument, trace};

use super::error::{DomainError, DomainResult};
use super::mutators::get_descendant_count;
use super::node::{Children, KeyOf, NodeKey, NodeRef, Tree};

/// A node found at a path, with its visible row index.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub node: NodeRef,
    pub tree_index: usize,
}

struct Step {
    /// Position among its siblings
    position: usize,
    node: NodeRef,
    tree_index: usize,
}

/// Walk down `path`, matching each key against the keys of the current siblings.
///
/// Sibling tree indices advance by the visible size of each skipped subtree,
/// matching the indices `flatten(ignore_collapsed = true)` assigns.
fn locate(tree: &Tree, path: &[NodeKey], key_of: &dyn KeyOf) -> DomainResult<Vec<Step>> {
    if path.is_empty() {
        return Err(DomainError::path_resolution(path, "empty path"));
    }

    let mut chain: Vec<Step> = Vec::with_capacity(path.len());
    let mut siblings: &[NodeRef] = tree.roots();
    let mut first_index = 0;

    for (depth, wanted) in path.iter().enumerate() {
        let parent_path = &path[..depth];
        let mut tree_index = first_index;
        let mut found = None;
        for (position, child) in siblings.iter().enumerate() {
            if key_of.key_of(child, tree_index, parent_path) == *wanted {
                found = Some(position);
                break;
            }
            tree_index += 1 + get_descendant_count(child, true);
        }

        let position = found.ok_or_else(|| {
            DomainError::path_resolution(&path[..=depth], format!("no node with key {}", wanted))
        })?;
        let node = Rc::clone(&siblings[position]);
        chain.push(Step {
            position,
            node,
            tree_index,
        });

        if depth + 1 < path.len() {
            match &siblings[position].children {
                Children::Loaded(children) => {
                    siblings = children;
                    first_index = tree_index + 1;
                }
                Children::Lazy(_) => return Err(DomainError::lazy_children(&path[..=depth])),
                Children::None => {
                    return Err(DomainError::path_resolution(
                        path,
                        format!("node at {} has no children", depth),
                    ))
                }
            }
        }
    }
    Ok(chain)
}

/// Resolve `path` to its node.
#[instrument(level = "trace", skip(tree, key_of))]
pub fn resolve(tree: &Tree, path: &[NodeKey], key_of: &dyn KeyOf) -> DomainResult<Resolved> {
    let chain = locate(tree, path, key_of)?;
    let last = chain
        .into_iter()
        .last()
        .ok_or_else(|| DomainError::path_resolution(path, "empty path"))?;
    Ok(Resolved {
        node: last.node,
        tree_index: last.tree_index,
    })
}

/// Return a tree where the node at `path` is replaced by `updater(old, tree_index)`.
///
/// `None` from the updater removes the node and its subtree. Ancestors on the path
/// are shallow-cloned; every other subtree is shared with the input tree.
#[instrument(level = "trace", skip(tree, key_of, updater))]
pub fn with_node_at<U>(
    tree: &Tree,
    path: &[NodeKey],
    key_of: &dyn KeyOf,
    updater: U,
) -> DomainResult<(Tree, Resolved)>
where
    U: FnOnce(&NodeRef, usize) -> Option<NodeRef>,
{
    let chain = locate(tree, path, key_of)?;
    let target = chain
        .last()
        .ok_or_else(|| DomainError::path_resolution(path, "empty path"))?;
    let resolved = Resolved {
        node: Rc::clone(&target.node),
        tree_index: target.tree_index,
    };

    let mut replacement = updater(&target.node, target.tree_index);
    for depth in (0..chain.len()).rev() {
        let siblings: &[NodeRef] = if depth == 0 {
            tree.roots()
        } else {
            chain[depth - 1].node.children.loaded().unwrap_or(&[])
        };
        let position = chain[depth].position;

        let mut rebuilt = siblings.to_vec();
        match replacement.take() {
            Some(node) => rebuilt[position] = node,
            None => {
                rebuilt.remove(position);
            }
        }

        if depth == 0 {
            trace!(path = %super::format_path(path), "rebuilt spine");
            return Ok((Tree::from_refs(rebuilt), resolved));
        }

        let mut parent = (*chain[depth - 1].node).clone();
        parent.children = Children::Loaded(rebuilt);
        replacement = Some(Rc::new(parent));
    }

    Err(DomainError::path_resolution(path, "empty path"))
}
