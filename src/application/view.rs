//! Caller-facing tree controller
//!
//! `TreeView` owns the working tree, the search state and the drag machine.
//! Every change it makes is adopted internally and reported through `TreeEvents`.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument};

use super::drag::{DragReorderMachine, DragRows, DragSession, DropDestination, DropTarget, MoveNodeEvent, SwapInfo, TreeId};
use super::error::{ApplicationError, ApplicationResult};
use super::lazy::{apply_loaded_children, pending_loads, LoadedChildren};
use super::memo::TreeDataMemo;
use super::targeting::{compute_target_depth, CanDrop, CanHaveChildren, DragSource, ShouldCopyOnExternalDrop};
use super::throttle::HoverThrottle;
use crate::config::TreeSettings;
use crate::domain::{
    change_node_at_path, find, resolve, toggle_expanded_for_all, FlatRow, KeyOf, LoadRequest, Node,
    NodeKey, NodeRef, SearchMatch, SearchMatcher, SearchOptions, Tree, TreePath,
};

/// Reported after a node is expanded or collapsed by the user.
#[derive(Debug, Clone)]
pub struct VisibilityToggleEvent {
    pub tree: Tree,
    /// The node as it was before the toggle
    pub node: NodeRef,
    /// New state
    pub expanded: bool,
    pub path: TreePath,
}

/// Event sink for a `TreeView`. Every method defaults to doing nothing.
pub trait TreeEvents {
    /// The view adopted a new tree.
    fn on_change(&self, _tree: &Tree) {}

    fn on_move_node(&self, _event: &MoveNodeEvent) {}

    fn on_visibility_toggle(&self, _event: &VisibilityToggleEvent) {}

    fn on_drag_state_changed(&self, _dragging: bool, _node: Option<&NodeRef>) {}

    fn on_search_finished(&self, _matches: &[SearchMatch]) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl TreeEvents for NoopEvents {}

/// A displayed row with its search annotations.
#[derive(Debug, Clone)]
pub struct ViewRow {
    pub row: FlatRow,
    pub list_index: usize,
    pub is_search_match: bool,
    pub is_search_focus: bool,
}

/// The row under the pointer during a drag, and the row displayed above it.
#[derive(Debug, Clone, Copy)]
pub struct HoverTarget<'a> {
    pub row: &'a FlatRow,
    pub row_above: Option<&'a FlatRow>,
    pub list_index: usize,
    pub source: DragSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingHover {
    depth: usize,
    minimum_tree_index: usize,
}

#[derive(Debug, Clone, Default)]
struct SearchState {
    query: Option<String>,
    focus_offset: Option<usize>,
    matches: Vec<SearchMatch>,
    focus_tree_index: Option<usize>,
}

pub struct TreeView {
    settings: TreeSettings,
    key_of: Rc<dyn KeyOf>,
    tree: Tree,
    matcher: Option<Rc<dyn SearchMatcher>>,
    can_drop: Option<Rc<dyn CanDrop>>,
    can_have_children: Option<Rc<dyn CanHaveChildren>>,
    should_copy: Option<Rc<dyn ShouldCopyOnExternalDrop>>,
    events: Rc<dyn TreeEvents>,
    search: SearchState,
    drag: DragReorderMachine,
    throttle: HoverThrottle<PendingHover>,
    pointer_over: bool,
    memo: TreeDataMemo,
}

impl TreeView {
    pub fn new(tree: Tree, key_of: Rc<dyn KeyOf>, settings: TreeSettings) -> Self {
        let frame_interval = Duration::from_millis(settings.frame_interval_ms);
        Self {
            settings,
            drag: DragReorderMachine::new(Rc::clone(&key_of)),
            key_of,
            tree,
            matcher: None,
            can_drop: None,
            can_have_children: None,
            should_copy: None,
            events: Rc::new(NoopEvents),
            search: SearchState::default(),
            throttle: HoverThrottle::new(frame_interval),
            pointer_over: false,
            memo: TreeDataMemo::new(),
        }
    }

    pub fn with_events(mut self, events: Rc<dyn TreeEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn with_matcher(mut self, matcher: Rc<dyn SearchMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn with_can_drop(mut self, can_drop: Rc<dyn CanDrop>) -> Self {
        self.can_drop = Some(can_drop);
        self
    }

    pub fn with_can_have_children(mut self, can_have_children: Rc<dyn CanHaveChildren>) -> Self {
        self.can_have_children = Some(can_have_children);
        self
    }

    pub fn with_should_copy(mut self, should_copy: Rc<dyn ShouldCopyOnExternalDrop>) -> Self {
        self.should_copy = Some(should_copy);
        self
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn settings(&self) -> &TreeSettings {
        &self.settings
    }

    pub fn tree_id(&self) -> TreeId {
        self.drag.tree_id()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn drag_session(&self) -> Option<&DragSession> {
        self.drag.session()
    }

    pub fn search_matches(&self) -> &[SearchMatch] {
        &self.search.matches
    }

    pub fn search_focus_tree_index(&self) -> Option<usize> {
        self.search.focus_tree_index
    }

    /// Lazy loads the current tree asks for.
    pub fn pending_loads(&self) -> Vec<LoadRequest> {
        pending_loads(
            &self.tree,
            self.key_of.as_ref(),
            self.settings.load_collapsed_lazy_children,
        )
    }

    /// Replace the working tree.
    ///
    /// A structurally different tree ends any drag, clears the search focus and
    /// re-runs the search without expanding. Returns the lazy loads to start.
    #[instrument(level = "debug", skip_all)]
    pub fn set_tree(&mut self, tree: Tree) -> Vec<LoadRequest> {
        if tree == self.tree {
            self.tree = tree;
            return Vec::new();
        }

        debug!("tree changed");
        self.tree = tree;
        self.drag.reset();
        self.throttle.cancel();
        self.pointer_over = false;
        self.search.focus_tree_index = None;
        self.run_search(false, false, false);
        self.pending_loads()
    }

    fn commit(&mut self, tree: Tree) -> Vec<LoadRequest> {
        self.events.on_change(&tree);
        self.set_tree(tree)
    }

    /// Update the search query and focus.
    ///
    /// A new query searches and expands every match path; a new focus alone
    /// expands only the path to the focused match.
    #[instrument(level = "debug", skip(self))]
    pub fn set_search(&mut self, query: Option<&str>, focus_offset: Option<usize>) {
        let query = query.filter(|q| !q.is_empty()).map(str::to_string);
        let query_changed = query != self.search.query;
        let focus_changed = focus_offset != self.search.focus_offset;
        self.search.query = query;
        self.search.focus_offset = focus_offset;

        if query_changed {
            self.run_search(true, true, false);
        } else if focus_changed {
            self.run_search(true, true, true);
        }
    }

    fn run_search(&mut self, seek_index: bool, expand: bool, single_search: bool) {
        if self.search.query.is_none() && self.matcher.is_none() {
            self.search.matches.clear();
            self.search.focus_tree_index = None;
            self.events.on_search_finished(&[]);
            return;
        }

        let base = if self.settings.only_expand_searched_nodes {
            toggle_expanded_for_all(&self.tree, false)
        } else {
            self.tree.clone()
        };
        let options = SearchOptions {
            expand_all_match_paths: expand && !single_search,
            expand_focus_match_paths: expand,
            focus_offset: self.search.focus_offset,
        };
        let found = find(
            &base,
            self.search.query.as_deref(),
            self.matcher.as_deref(),
            &options,
            self.key_of.as_ref(),
        );

        if expand {
            // Adopted without the tree-changed handling, so it does not re-search.
            self.events.on_change(&found.tree);
            self.tree = found.tree;
        }
        self.events.on_search_finished(&found.matches);

        self.search.focus_tree_index = match (seek_index, self.search.focus_offset) {
            (true, Some(offset)) => found.matches.get(offset).and_then(|m| m.tree_index),
            _ => None,
        };
        self.search.matches = found.matches;
    }

    /// Flip `expanded` on the node at `path`.
    #[instrument(level = "debug", skip(self))]
    pub fn toggle_children_visibility(&mut self, path: &[NodeKey]) -> ApplicationResult<Vec<LoadRequest>> {
        let node = resolve(&self.tree, path, self.key_of.as_ref())?.node;
        let tree = change_node_at_path(&self.tree, path, self.key_of.as_ref(), |old, _| {
            Rc::new(Node {
                expanded: !old.expanded,
                ..(**old).clone()
            })
        })?;
        let event = VisibilityToggleEvent {
            tree: tree.clone(),
            expanded: !node.expanded,
            node,
            path: path.to_vec(),
        };

        let loads = self.commit(tree);
        self.events.on_visibility_toggle(&event);
        Ok(loads)
    }

    /// Put children delivered by a lazy load in place.
    pub fn apply_loaded(&mut self, loaded: LoadedChildren) -> Vec<LoadRequest> {
        let next = apply_loaded_children(&self.tree, loaded, self.key_of.as_ref());
        if next.ptr_eq(&self.tree) {
            return Vec::new();
        }
        self.commit(next)
    }

    /// Memoized rows of the committed tree.
    pub fn flat_rows(&self) -> Rc<Vec<FlatRow>> {
        self.memo.flatten(&self.tree, &self.key_of, true)
    }

    /// Rows to display, with drag preview and search annotations.
    pub fn rows(&self) -> (Vec<ViewRow>, Option<SwapInfo>) {
        let (rows, swap) = match self.drag.rows() {
            Some(DragRows { rows, swap }) => (rows, swap),
            None => (self.flat_rows(), None),
        };

        let match_paths: HashMap<&[NodeKey], usize> = self
            .search
            .matches
            .iter()
            .enumerate()
            .map(|(i, m)| (m.path.as_slice(), i))
            .collect();

        let annotated = rows
            .iter()
            .enumerate()
            .map(|(list_index, row)| {
                let matched = match_paths.get(row.path.as_slice()).copied();
                ViewRow {
                    row: row.clone(),
                    list_index,
                    is_search_match: matched.is_some(),
                    is_search_focus: matched.is_some() && matched == self.search.focus_offset,
                }
            })
            .collect();
        (annotated, swap)
    }

    /// Pick up the node at `path`.
    pub fn start_drag(&mut self, path: &[NodeKey]) -> ApplicationResult<()> {
        self.drag.start_drag(&self.tree, path)?;
        self.search.focus_tree_index = None;
        let node = self.drag.session().map(|s| Rc::clone(&s.dragged_node));
        self.events.on_drag_state_changed(true, node.as_ref());
        Ok(())
    }

    /// Accept a node dragged in from another tree.
    pub fn start_external_drag(
        &mut self,
        node: NodeRef,
        source: TreeId,
        prev_path: TreePath,
        prev_tree_index: usize,
    ) -> ApplicationResult<()> {
        self.drag
            .start_external_drag(&self.tree, Rc::clone(&node), source, prev_path, prev_tree_index)?;
        self.events.on_drag_state_changed(true, Some(&node));
        Ok(())
    }

    /// Depth a drop over `target` would land at.
    pub fn target_depth(&self, target: &HoverTarget<'_>) -> ApplicationResult<usize> {
        let session = self.drag.session().ok_or(ApplicationError::NoActiveDrag)?;
        Ok(compute_target_depth(
            target.row_above,
            target.row.path.len(),
            target.source,
            &session.dragged_node,
            &self.settings,
            self.can_have_children.as_deref(),
        ))
    }

    /// Pointer moved over `target`. Returns whether a preview update was scheduled.
    pub fn hover(&mut self, target: &HoverTarget<'_>) -> ApplicationResult<bool> {
        let depth = self.target_depth(target)?;
        self.pointer_over = true;
        if self.drag.is_own_slot(target.row, depth) {
            return Ok(false);
        }
        self.throttle.request(PendingHover {
            depth,
            minimum_tree_index: target.list_index,
        });
        Ok(true)
    }

    /// Pointer left the tree.
    pub fn pointer_left(&mut self) {
        self.pointer_over = false;
    }

    /// Frame tick from the host. Returns whether the preview changed.
    pub fn on_animation_frame(&mut self, now: Instant) -> ApplicationResult<bool> {
        match self.throttle.poll_frame(now) {
            Some(hover) => self.apply_hover(hover),
            None => Ok(false),
        }
    }

    /// Apply any pending hover right away.
    pub fn flush_hover(&mut self) -> ApplicationResult<bool> {
        match self.throttle.fire() {
            Some(hover) => self.apply_hover(hover),
            None => Ok(false),
        }
    }

    fn apply_hover(&mut self, hover: PendingHover) -> ApplicationResult<bool> {
        if !self.drag.is_dragging() || !self.pointer_over {
            debug!("discarding hover released after drag or pointer left");
            return Ok(false);
        }
        self.drag.drag_hover(hover.depth, hover.minimum_tree_index)
    }

    /// Whether the node may be dropped over `target`.
    pub fn can_drop(&self, target: &HoverTarget<'_>, is_over: bool) -> ApplicationResult<bool> {
        let depth = self.target_depth(target)?;
        self.drag.can_drop(
            &DropTarget {
                row_above: target.row_above,
                list_index: target.list_index,
                is_over,
            },
            depth,
            self.can_drop.as_deref(),
        )
    }

    /// Drop over `target`.
    pub fn drop(&mut self, target: &HoverTarget<'_>) -> ApplicationResult<Vec<LoadRequest>> {
        let depth = self.target_depth(target)?;
        self.drop_at(depth, target.row.tree_index)
    }

    /// Drop onto the placeholder shown for an empty tree.
    pub fn drop_on_placeholder(&mut self) -> ApplicationResult<Vec<LoadRequest>> {
        self.drop_at(0, 0)
    }

    /// Drop into the slot at `depth` / `minimum_tree_index`.
    #[instrument(level = "debug", skip(self))]
    pub fn drop_at(&mut self, depth: usize, minimum_tree_index: usize) -> ApplicationResult<Vec<LoadRequest>> {
        let commit = self.drag.drop(depth, minimum_tree_index)?;
        self.throttle.cancel();
        self.pointer_over = false;

        let loads = self.commit(commit.tree);
        self.events.on_move_node(&commit.event);
        self.events.on_drag_state_changed(false, None);
        Ok(loads)
    }

    /// Release after a drag: cancel (`None`), or the drop target's verdict.
    #[instrument(level = "debug", skip(self))]
    pub fn end_drag(&mut self, destination: Option<DropDestination>) -> ApplicationResult<Vec<LoadRequest>> {
        let was_dragging = self.drag.is_dragging();
        let fixed = self.settings.should_copy_on_outside_drop;
        let fallback = move |_: &NodeRef, _: &[NodeKey], _: usize| fixed;
        let should_copy: &dyn ShouldCopyOnExternalDrop = match &self.should_copy {
            Some(custom) => custom.as_ref(),
            None => &fallback,
        };

        let commit = self.drag.end_drag(destination, should_copy)?;
        self.throttle.cancel();
        self.pointer_over = false;

        let loads = match commit {
            Some(commit) => {
                let loads = self.commit(commit.tree);
                self.events.on_move_node(&commit.event);
                loads
            }
            None => Vec::new(),
        };
        if was_dragging {
            self.events.on_drag_state_changed(false, None);
        }
        Ok(loads)
    }
}
