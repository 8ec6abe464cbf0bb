//! Drag-and-drop reordering as an explicit state machine
//!
//! `Idle -> Dragging -> Idle`. A drag removes the node from the working tree
//! (the dragging tree); every hover computes a preview by inserting it back at
//! the hovered position; a drop commits that insertion. Nothing here touches
//! the caller's tree: commits are returned and the caller decides.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, instrument, warn};

use super::error::{ApplicationError, ApplicationResult};
use super::memo::TreeDataMemo;
use super::targeting::{lands_in_lazy_children, CanDrop, MoveIntent, ShouldCopyOnExternalDrop};
use crate::domain::{
    change_node_at_path, remove_node, resolve, slide_rows, FlatRow, Inserted, KeyOf, Node,
    NodeKey, NodeRef, Removed, Tree, TreePath,
};

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one tree instance, so drops can tell internal moves from cross-tree ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(u64);

impl TreeId {
    pub fn next() -> Self {
        TreeId(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TreeId {
    fn default() -> Self {
        Self::next()
    }
}

/// Where the dragged node was before the drag.
#[derive(Debug, Clone)]
pub enum DragOrigin {
    /// Picked up from this tree
    Internal {
        prev_path: TreePath,
        prev_tree_index: usize,
        prev_parent: Option<NodeRef>,
    },
    /// Entered from another tree
    External {
        source: TreeId,
        prev_path: TreePath,
        prev_tree_index: usize,
    },
}

impl DragOrigin {
    pub fn prev_path(&self) -> &[NodeKey] {
        match self {
            DragOrigin::Internal { prev_path, .. } | DragOrigin::External { prev_path, .. } => prev_path,
        }
    }

    pub fn prev_tree_index(&self) -> usize {
        match self {
            DragOrigin::Internal { prev_tree_index, .. } | DragOrigin::External { prev_tree_index, .. } => {
                *prev_tree_index
            }
        }
    }

    pub fn prev_parent(&self) -> Option<&NodeRef> {
        match self {
            DragOrigin::Internal { prev_parent, .. } => prev_parent.as_ref(),
            DragOrigin::External { .. } => None,
        }
    }
}

/// Depth and minimum tree index of a hovered drop slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropPosition {
    pub depth: usize,
    pub minimum_tree_index: usize,
}

#[derive(Debug, Clone)]
pub struct DragSession {
    pub origin: DragOrigin,
    /// Tree as it was when the drag started
    pub source_tree: Tree,
    /// Source tree without the dragged node (internal drags)
    pub dragging_tree: Tree,
    pub dragged_node: NodeRef,
    /// Slot of the current preview; `None` until an external drag first hovers
    pub position: Option<DropPosition>,
    preview: Option<Rc<Inserted>>,
}

impl DragSession {
    /// The dragging tree with the node shown at the hovered slot.
    pub fn preview_tree(&self) -> &Tree {
        self.preview
            .as_ref()
            .map_or(&self.dragging_tree, |inserted| &inserted.tree)
    }

    pub fn preview(&self) -> Option<&Inserted> {
        self.preview.as_deref()
    }
}

#[derive(Debug, Clone, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragSession),
}

/// Reported after every committed move.
#[derive(Debug, Clone)]
pub struct MoveNodeEvent {
    pub tree: Tree,
    pub node: NodeRef,
    pub prev_path: TreePath,
    pub prev_tree_index: usize,
    /// `None` when the node left for another tree
    pub next_path: Option<TreePath>,
    pub next_tree_index: Option<usize>,
    pub next_parent_node: Option<NodeRef>,
}

/// A tree the caller should adopt, and the move that produced it.
#[derive(Debug, Clone)]
pub struct MoveCommit {
    pub tree: Tree,
    pub event: MoveNodeEvent,
}

/// Where a finished drag was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropDestination {
    Internal,
    External(TreeId),
}

/// What the pointer is over when asking whether a drop is allowed.
#[derive(Debug, Clone, Copy)]
pub struct DropTarget<'a> {
    pub row_above: Option<&'a FlatRow>,
    /// Position of the hovered row in the displayed list
    pub list_index: usize,
    pub is_over: bool,
}

/// Drag-time rows: the dragged block shown at its hovered slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapInfo {
    pub from: usize,
    pub to: usize,
    pub length: usize,
    pub depth: usize,
}

#[derive(Debug, Clone)]
pub struct DragRows {
    pub rows: Rc<Vec<FlatRow>>,
    pub swap: Option<SwapInfo>,
}

pub struct DragReorderMachine {
    tree_id: TreeId,
    key_of: Rc<dyn KeyOf>,
    memo: TreeDataMemo,
    state: DragState,
}

impl std::fmt::Debug for DragReorderMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragReorderMachine")
            .field("tree_id", &self.tree_id)
            .field("state", &self.state)
            .finish()
    }
}

impl DragReorderMachine {
    pub fn new(key_of: Rc<dyn KeyOf>) -> Self {
        Self {
            tree_id: TreeId::next(),
            key_of,
            memo: TreeDataMemo::new(),
            state: DragState::Idle,
        }
    }

    pub fn tree_id(&self) -> TreeId {
        self.tree_id
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.state {
            DragState::Dragging(session) => Some(session),
            DragState::Idle => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    fn session_mut(&mut self) -> ApplicationResult<&mut DragSession> {
        match &mut self.state {
            DragState::Dragging(session) => Ok(session),
            DragState::Idle => Err(ApplicationError::NoActiveDrag),
        }
    }

    /// Pick up the node at `path`.
    #[instrument(level = "debug", skip(self, tree))]
    pub fn start_drag(&mut self, tree: &Tree, path: &[NodeKey]) -> ApplicationResult<()> {
        if self.is_dragging() {
            return Err(ApplicationError::DragAlreadyActive);
        }

        let prev_parent = match path.len() {
            0 | 1 => None,
            n => Some(resolve(tree, &path[..n - 1], self.key_of.as_ref())?.node),
        };
        let Removed {
            tree: dragging_tree,
            node,
            tree_index,
        } = remove_node(tree, path, self.key_of.as_ref())?;

        let mut session = DragSession {
            origin: DragOrigin::Internal {
                prev_path: path.to_vec(),
                prev_tree_index: tree_index,
                prev_parent,
            },
            source_tree: tree.clone(),
            dragging_tree,
            dragged_node: node,
            position: None,
            preview: None,
        };

        let home = DropPosition {
            depth: path.len() - 1,
            minimum_tree_index: tree_index,
        };
        match self.insert_at(&session.dragging_tree, &session.dragged_node, home) {
            Ok(preview) => session.preview = Some(preview),
            Err(e) => warn!(error = %e, "no preview at the original slot"),
        }
        session.position = Some(home);

        debug!(tree_index, "drag started");
        self.state = DragState::Dragging(session);
        Ok(())
    }

    /// Accept a node dragged in from another tree.
    #[instrument(level = "debug", skip(self, tree, node))]
    pub fn start_external_drag(
        &mut self,
        tree: &Tree,
        node: NodeRef,
        source: TreeId,
        prev_path: TreePath,
        prev_tree_index: usize,
    ) -> ApplicationResult<()> {
        if self.is_dragging() {
            return Err(ApplicationError::DragAlreadyActive);
        }
        self.state = DragState::Dragging(DragSession {
            origin: DragOrigin::External {
                source,
                prev_path,
                prev_tree_index,
            },
            source_tree: tree.clone(),
            dragging_tree: tree.clone(),
            dragged_node: node,
            position: None,
            preview: None,
        });
        Ok(())
    }

    fn insert_at(&self, tree: &Tree, node: &NodeRef, position: DropPosition) -> ApplicationResult<Rc<Inserted>> {
        Ok(self.memo.insert_node(
            tree,
            node,
            position.depth,
            position.minimum_tree_index,
            true,
            &self.key_of,
        )?)
    }

    /// Move the preview to a new slot. Returns whether the preview changed.
    ///
    /// The parent receiving the preview is expanded in the dragging tree too,
    /// so hovering over a collapsed node opens it for the rest of the drag.
    #[instrument(level = "trace", skip(self))]
    pub fn drag_hover(&mut self, depth: usize, minimum_tree_index: usize) -> ApplicationResult<bool> {
        let position = DropPosition {
            depth,
            minimum_tree_index,
        };
        let session = self.session().ok_or(ApplicationError::NoActiveDrag)?;
        if session.position == Some(position) {
            return Ok(false);
        }

        let preview = self.insert_at(&session.dragging_tree, &session.dragged_node, position)?;
        let dragging_tree = self.expand_parent_in(&session.dragging_tree, &preview)?;
        let preview = if dragging_tree.ptr_eq(&session.dragging_tree) {
            preview
        } else {
            self.insert_at(&dragging_tree, &session.dragged_node, position)?
        };

        let session = self.session_mut()?;
        session.dragging_tree = dragging_tree;
        session.position = Some(position);
        session.preview = Some(preview);
        Ok(true)
    }

    fn expand_parent_in(&self, dragging_tree: &Tree, preview: &Inserted) -> ApplicationResult<Tree> {
        let parent_len = preview.path.len().saturating_sub(1);
        if parent_len == 0 {
            return Ok(dragging_tree.clone());
        }
        let parent_path = &preview.path[..parent_len];
        let parent = resolve(dragging_tree, parent_path, self.key_of.as_ref())?;
        if parent.node.expanded {
            return Ok(dragging_tree.clone());
        }
        debug!("expanding hovered parent");
        Ok(change_node_at_path(
            dragging_tree,
            parent_path,
            self.key_of.as_ref(),
            |old, _| {
                Rc::new(Node {
                    expanded: true,
                    ..(**old).clone()
                })
            },
        )?)
    }

    /// True when hovering the dragged node's own preview row at its current depth.
    pub fn is_own_slot(&self, target: &FlatRow, target_depth: usize) -> bool {
        self.session().is_some_and(|session| {
            Rc::ptr_eq(&target.node, &session.dragged_node) && target.depth() == target_depth
        })
    }

    /// Whether dropping at `target_depth` over `target` is allowed.
    pub fn can_drop(
        &self,
        target: &DropTarget<'_>,
        target_depth: usize,
        predicate: Option<&dyn CanDrop>,
    ) -> ApplicationResult<bool> {
        let session = self.session().ok_or(ApplicationError::NoActiveDrag)?;
        if !target.is_over || lands_in_lazy_children(target.row_above, target_depth) {
            return Ok(false);
        }
        let Some(predicate) = predicate else {
            return Ok(true);
        };

        let position = DropPosition {
            depth: target_depth,
            minimum_tree_index: target.list_index,
        };
        let inserted = match self.insert_at(&session.dragging_tree, &session.dragged_node, position) {
            Ok(inserted) => inserted,
            Err(e) => {
                debug!(error = %e, "drop slot not insertable");
                return Ok(false);
            }
        };
        Ok(predicate.can_drop(&MoveIntent {
            node: &session.dragged_node,
            prev_path: session.origin.prev_path(),
            prev_parent: session.origin.prev_parent(),
            prev_tree_index: session.origin.prev_tree_index(),
            next_path: &inserted.path,
            next_parent: inserted.parent_node.as_ref(),
            next_tree_index: inserted.tree_index,
        }))
    }

    /// Commit the move into the slot at `depth` / `minimum_tree_index` and end the drag.
    #[instrument(level = "debug", skip(self))]
    pub fn drop(&mut self, depth: usize, minimum_tree_index: usize) -> ApplicationResult<MoveCommit> {
        let session = self.session().ok_or(ApplicationError::NoActiveDrag)?;
        let inserted = self.insert_at(
            &session.dragging_tree,
            &session.dragged_node,
            DropPosition {
                depth,
                minimum_tree_index,
            },
        )?;

        let commit = MoveCommit {
            tree: inserted.tree.clone(),
            event: MoveNodeEvent {
                tree: inserted.tree.clone(),
                node: Rc::clone(&session.dragged_node),
                prev_path: session.origin.prev_path().to_vec(),
                prev_tree_index: session.origin.prev_tree_index(),
                next_path: Some(inserted.path.clone()),
                next_tree_index: Some(inserted.tree_index),
                next_parent_node: inserted.parent_node.clone(),
            },
        };
        debug!(next_tree_index = inserted.tree_index, "drop committed");
        self.reset();
        Ok(commit)
    }

    /// Finish a drag after the pointer was released.
    ///
    /// `None` cancels. A drop onto another tree commits the removal here, unless
    /// `should_copy` keeps the source intact. Internal drops were already
    /// committed by `drop`, so they only end the session.
    #[instrument(level = "debug", skip(self, should_copy))]
    pub fn end_drag(
        &mut self,
        destination: Option<DropDestination>,
        should_copy: &dyn ShouldCopyOnExternalDrop,
    ) -> ApplicationResult<Option<MoveCommit>> {
        let session = match std::mem::take(&mut self.state) {
            DragState::Dragging(session) => session,
            DragState::Idle => {
                return match destination {
                    None => Err(ApplicationError::NoActiveDrag),
                    Some(_) => Ok(None),
                };
            }
        };
        self.memo.clear();

        let target = match destination {
            None => {
                debug!("drag cancelled");
                return Ok(None);
            }
            Some(DropDestination::External(id)) if id != self.tree_id => id,
            Some(_) => return Ok(None),
        };

        let prev_path = session.origin.prev_path().to_vec();
        let prev_tree_index = session.origin.prev_tree_index();
        let node = session.dragged_node;

        let tree = if should_copy.should_copy(&node, &prev_path, prev_tree_index) {
            change_node_at_path(&session.source_tree, &prev_path, self.key_of.as_ref(), |old, _| {
                Rc::new((**old).clone())
            })?
        } else {
            session.dragging_tree
        };
        debug!(?target, "node dropped onto another tree");

        Ok(Some(MoveCommit {
            tree: tree.clone(),
            event: MoveNodeEvent {
                tree,
                node,
                prev_path,
                prev_tree_index,
                next_path: None,
                next_tree_index: None,
                next_parent_node: None,
            },
        }))
    }

    /// Abandon any drag without a commit.
    pub fn reset(&mut self) {
        if self.is_dragging() {
            debug!("drag state reset");
        }
        self.state = DragState::Idle;
        self.memo.clear();
    }

    /// Rows to display while dragging, or `None` when idle.
    ///
    /// The preview is flattened and the dragged block is slid from its preview
    /// index to the hovered minimum tree index.
    pub fn rows(&self) -> Option<DragRows> {
        let session = self.session()?;
        let (Some(preview), Some(position)) = (&session.preview, session.position) else {
            return Some(DragRows {
                rows: self.memo.flatten(&session.dragging_tree, &self.key_of, true),
                swap: None,
            });
        };

        let flat = self.memo.flatten(&preview.tree, &self.key_of, true);
        let swap = SwapInfo {
            from: preview.tree_index,
            to: position.minimum_tree_index,
            length: 1 + self.memo.descendant_count(&session.dragged_node, true),
            depth: position.depth,
        };
        Some(DragRows {
            rows: Rc::new(slide_rows(flat.as_slice(), swap.from, swap.to, swap.length)),
            swap: Some(swap),
        })
    }
}
