//! Depth-first pre-order traversal with row bookkeeping

use std::ops::ControlFlow;

use tracing::instrument;

use super::node::{KeyOf, NodeKey, NodeRef, Tree, TreePath};

/// One visited node, as seen from its position in the flattened order.
pub struct Visit<'a> {
    pub node: &'a NodeRef,
    pub parent_node: Option<&'a NodeRef>,
    pub path: &'a [NodeKey],
    /// Remaining siblings below this node's ancestor at each depth (self last)
    pub lower_sibling_counts: &'a [usize],
    pub tree_index: usize,
}

impl Visit<'_> {
    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

/// Visit every node in pre-order.
///
/// With `ignore_collapsed`, collapsed nodes are visited but their descendants
/// are skipped and do not consume tree indices. Returning `Break` from the
/// callback stops the walk.
#[instrument(level = "trace", skip_all, fields(roots = tree.len(), ignore_collapsed))]
pub fn walk<F>(tree: &Tree, key_of: &dyn KeyOf, ignore_collapsed: bool, mut callback: F)
where
    F: FnMut(&Visit<'_>) -> ControlFlow<()>,
{
    let mut walker = Walker {
        key_of,
        ignore_collapsed,
        path: Vec::new(),
        lower_sibling_counts: Vec::new(),
        next_index: 0,
    };
    let _ = walker.children(tree.roots(), None, &mut callback);
}

struct Walker<'k> {
    key_of: &'k dyn KeyOf,
    ignore_collapsed: bool,
    path: TreePath,
    lower_sibling_counts: Vec<usize>,
    next_index: usize,
}

impl Walker<'_> {
    fn children<F>(
        &mut self,
        children: &[NodeRef],
        parent: Option<&NodeRef>,
        callback: &mut F,
    ) -> ControlFlow<()>
    where
        F: FnMut(&Visit<'_>) -> ControlFlow<()>,
    {
        let count = children.len();
        for (i, node) in children.iter().enumerate() {
            let tree_index = self.next_index;
            self.next_index += 1;

            let key = self.key_of.key_of(node, tree_index, &self.path);
            self.path.push(key);
            self.lower_sibling_counts.push(count - i - 1);

            let mut flow = callback(&Visit {
                node,
                parent_node: parent,
                path: &self.path,
                lower_sibling_counts: &self.lower_sibling_counts,
                tree_index,
            });

            if flow.is_continue() && (node.expanded || !self.ignore_collapsed) {
                if let Some(grandchildren) = node.children.loaded() {
                    flow = self.children(grandchildren, Some(node), callback);
                }
            }

            self.path.pop();
            self.lower_sibling_counts.pop();

            if flow.is_break() {
                return flow;
            }
        }
        ControlFlow::Continue(())
    }
}
