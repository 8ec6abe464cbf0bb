//! Application layer: stateful services over the domain
//!
//! Drag sessions, lazy loading, memoization and the tree view controller.

pub mod drag;
pub mod error;
pub mod lazy;
pub mod memo;
pub mod targeting;
pub mod throttle;
pub mod view;

pub use drag::{
    DragOrigin, DragReorderMachine, DragRows, DragSession, DragState, DropDestination,
    DropPosition, DropTarget, MoveCommit, MoveNodeEvent, SwapInfo, TreeId,
};
pub use error::{ApplicationError, ApplicationResult};
pub use lazy::{apply_loaded_children, pending_loads, LazyLoad, LoadFuture, LoadedChildren};
pub use memo::TreeDataMemo;
pub use targeting::{
    compute_target_depth, lands_in_lazy_children, CanDrop, CanHaveChildren, DragSource,
    MoveIntent, ShouldCopyOnExternalDrop,
};
pub use throttle::HoverThrottle;
pub use view::{HoverTarget, NoopEvents, TreeEvents, TreeView, ViewRow, VisibilityToggleEvent};
