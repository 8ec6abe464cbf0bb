//! Tree to rows, and the row helpers renderers need

use std::ops::ControlFlow;
use std::rc::Rc;

use tracing::instrument;

use super::node::{KeyOf, NodeRef, Tree, TreePath};
use super::walk::{walk, Visit};

/// One renderable row of a flattened tree.
#[derive(Debug, Clone)]
pub struct FlatRow {
    pub node: NodeRef,
    pub parent_node: Option<NodeRef>,
    pub path: TreePath,
    pub lower_sibling_counts: Vec<usize>,
    pub tree_index: usize,
}

impl FlatRow {
    fn from_visit(visit: &Visit<'_>) -> Self {
        Self {
            node: Rc::clone(visit.node),
            parent_node: visit.parent_node.cloned(),
            path: visit.path.to_vec(),
            lower_sibling_counts: visit.lower_sibling_counts.to_vec(),
            tree_index: visit.tree_index,
        }
    }

    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Connector blocks for this row when rendered at position `list_index`.
    pub fn scaffold(&self, list_index: usize) -> Vec<ScaffoldLine> {
        scaffold(&self.lower_sibling_counts, list_index)
    }
}

/// Flatten in walk order. Collapsed subtrees are omitted when `ignore_collapsed`.
#[instrument(level = "trace", skip(tree, key_of))]
pub fn flatten(tree: &Tree, key_of: &dyn KeyOf, ignore_collapsed: bool) -> Vec<FlatRow> {
    let mut rows = Vec::new();
    walk(tree, key_of, ignore_collapsed, |visit| {
        rows.push(FlatRow::from_visit(visit));
        ControlFlow::Continue(())
    });
    rows
}

/// The visible row at `index`, if the tree has that many visible rows.
pub fn get_visible_node_info_at_index(tree: &Tree, index: usize, key_of: &dyn KeyOf) -> Option<FlatRow> {
    let mut found = None;
    walk(tree, key_of, true, |visit| {
        if visit.tree_index == index {
            found = Some(FlatRow::from_visit(visit));
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    found
}

/// Move the block `rows[from..from + count]` so that it starts at `to`.
///
/// `to` is an index into the rows that remain once the block is lifted out.
/// Out-of-range arguments are clamped.
pub fn slide_rows<T: Clone>(rows: &[T], from: usize, to: usize, count: usize) -> Vec<T> {
    let from = from.min(rows.len());
    let end = from.saturating_add(count).min(rows.len());

    let mut without: Vec<T> = Vec::with_capacity(rows.len());
    without.extend_from_slice(&rows[..from]);
    without.extend_from_slice(&rows[end..]);
    let to = to.min(without.len());

    let mut slid = Vec::with_capacity(rows.len());
    slid.extend_from_slice(&without[..to]);
    slid.extend_from_slice(&rows[from..end]);
    slid.extend_from_slice(&without[to..]);
    slid
}

/// Connector drawn in one indentation block of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaffoldLine {
    /// First row of the list, more siblings follow: right and down
    Corner,
    /// Block next to the content, more siblings follow: up, down and right
    Tee,
    /// An ancestor has more siblings below: straight through
    Vertical,
    /// First row of the list without siblings: right only
    Horizontal,
    /// Last sibling: up and right
    Last,
    Blank,
}

impl ScaffoldLine {
    pub fn glyph(self) -> &'static str {
        match self {
            ScaffoldLine::Corner => "┌─",
            ScaffoldLine::Tee => "├─",
            ScaffoldLine::Vertical => "│ ",
            ScaffoldLine::Horizontal => "──",
            ScaffoldLine::Last => "└─",
            ScaffoldLine::Blank => "  ",
        }
    }
}

/// Derive the per-depth connectors from a row's lower sibling counts.
pub fn scaffold(lower_sibling_counts: &[usize], list_index: usize) -> Vec<ScaffoldLine> {
    let last_block = lower_sibling_counts.len().saturating_sub(1);
    lower_sibling_counts
        .iter()
        .enumerate()
        .map(|(i, &count)| match (count > 0, list_index == 0, i == last_block) {
            (true, true, _) => ScaffoldLine::Corner,
            (true, false, true) => ScaffoldLine::Tee,
            (true, false, false) => ScaffoldLine::Vertical,
            (false, true, _) => ScaffoldLine::Horizontal,
            (false, false, true) => ScaffoldLine::Last,
            (false, false, false) => ScaffoldLine::Blank,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_block_when_sliding_forward_then_reorders() {
        let rows = vec!['a', 'b', 'c', 'd', 'e'];
        assert_eq!(slide_rows(&rows, 1, 2, 2), vec!['a', 'd', 'b', 'c', 'e']);
        assert_eq!(slide_rows(&rows, 3, 0, 1), vec!['d', 'a', 'b', 'c', 'e']);
    }

    #[test]
    fn given_out_of_range_arguments_when_sliding_then_clamps() {
        let rows = vec![1, 2, 3];
        assert_eq!(slide_rows(&rows, 2, 10, 5), vec![1, 2, 3]);
        assert_eq!(slide_rows(&rows, 9, 0, 1), vec![1, 2, 3]);
    }

    #[test]
    fn given_nested_last_child_when_deriving_scaffold_then_pass_through_and_last() {
        assert_eq!(scaffold(&[1, 0], 2), vec![ScaffoldLine::Vertical, ScaffoldLine::Last]);
        assert_eq!(scaffold(&[0, 1], 3), vec![ScaffoldLine::Blank, ScaffoldLine::Tee]);
    }

    #[test]
    fn given_first_row_when_deriving_scaffold_then_corner_or_horizontal() {
        assert_eq!(scaffold(&[2], 0), vec![ScaffoldLine::Corner]);
        assert_eq!(scaffold(&[0], 0), vec![ScaffoldLine::Horizontal]);
    }
}
