//! Drop targeting: which depth a hovering pointer means, and whether a drop is allowed

use tracing::trace;

use crate::config::{RowDirection, TreeSettings};
use crate::domain::{get_depth, FlatRow, Node, NodeKey, NodeRef};

/// Decides whether a node may receive children.
pub trait CanHaveChildren {
    fn can_have_children(&self, node: &Node) -> bool;
}

impl<F> CanHaveChildren for F
where
    F: Fn(&Node) -> bool,
{
    fn can_have_children(&self, node: &Node) -> bool {
        self(node)
    }
}

/// A prospective move, as offered to a `CanDrop` predicate.
#[derive(Debug, Clone)]
pub struct MoveIntent<'a> {
    pub node: &'a NodeRef,
    pub prev_path: &'a [NodeKey],
    pub prev_parent: Option<&'a NodeRef>,
    pub prev_tree_index: usize,
    pub next_path: &'a [NodeKey],
    pub next_parent: Option<&'a NodeRef>,
    pub next_tree_index: usize,
}

/// Caller veto over individual drops.
pub trait CanDrop {
    fn can_drop(&self, intent: &MoveIntent<'_>) -> bool;
}

impl<F> CanDrop for F
where
    F: Fn(&MoveIntent<'_>) -> bool,
{
    fn can_drop(&self, intent: &MoveIntent<'_>) -> bool {
        self(intent)
    }
}

/// Decides whether a node dropped onto another tree is copied (source kept) or moved.
pub trait ShouldCopyOnExternalDrop {
    fn should_copy(&self, node: &NodeRef, prev_path: &[NodeKey], prev_tree_index: usize) -> bool;
}

impl<F> ShouldCopyOnExternalDrop for F
where
    F: Fn(&NodeRef, &[NodeKey], usize) -> bool,
{
    fn should_copy(&self, node: &NodeRef, prev_path: &[NodeKey], prev_tree_index: usize) -> bool {
        self(node, prev_path, prev_tree_index)
    }
}

/// Where the dragged node came from, with the horizontal pointer information available.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragSource {
    /// Dragged inside this tree: original path length and horizontal travel since the drag started
    Internal { path_len: usize, offset_x: f64 },
    /// Dragged in from another tree: pointer offset from the tree's left edge, when known
    External { left_shift: Option<f64> },
}

/// Rounds half up, the way browsers round pointer offsets.
fn round_blocks(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Depth a drop would land at for the pointer over the row at `target_path_len`.
///
/// `row_above` is the row displayed above the pointer, if any. The result never
/// exceeds what the row above allows, and with `settings.max_depth` never pushes
/// the dragged subtree past that limit.
pub fn compute_target_depth(
    row_above: Option<&FlatRow>,
    target_path_len: usize,
    source: DragSource,
    dragged: &Node,
    settings: &TreeSettings,
    can_have_children: Option<&dyn CanHaveChildren>,
) -> usize {
    let above_limit = match row_above {
        None => 0,
        Some(row) => {
            let accepts_children = can_have_children.map_or(true, |c| c.can_have_children(&row.node));
            let above_len = if accepts_children {
                row.path.len()
            } else {
                row.path.len().saturating_sub(1)
            };
            above_len.min(target_path_len)
        }
    };

    let indent = settings.scaffold_block_px_width;
    let (initial_len, blocks) = match source {
        DragSource::Internal { path_len, offset_x } => {
            let direction = match settings.row_direction {
                RowDirection::Ltr => 1.0,
                RowDirection::Rtl => -1.0,
            };
            (path_len as i64, round_blocks(direction * offset_x / indent))
        }
        DragSource::External { left_shift: Some(shift) } => (0, round_blocks(shift / indent)),
        DragSource::External { left_shift: None } => (0, target_path_len as i64),
    };

    let wanted = (initial_len + blocks - 1).max(0) as usize;
    let mut depth = above_limit.min(wanted);

    if let Some(max_depth) = settings.max_depth {
        let allowed = max_depth as i64 - get_depth(dragged) as i64 - 1;
        depth = (depth as i64).min(allowed).max(0) as usize;
    }

    trace!(above_limit, blocks, depth, "computed target depth");
    depth
}

/// True when a drop at `target_depth` would make the node a child of a row
/// whose children are not loaded yet.
pub fn lands_in_lazy_children(row_above: Option<&FlatRow>, target_depth: usize) -> bool {
    row_above.is_some_and(|row| target_depth >= row.path.len() && row.node.children.is_lazy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_half_block_when_rounding_then_rounds_up() {
        assert_eq!(round_blocks(0.5), 1);
        assert_eq!(round_blocks(-0.5), 0);
        assert_eq!(round_blocks(-0.6), -1);
    }
}
