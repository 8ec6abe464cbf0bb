//! Lazy children: find loaders to run, run them cancellably, apply results
//!
//! Loads run on the caller's executor. A result re-enters the tree through a
//! path-addressed update that only applies while the node at that path is still
//! the node the load was started for.

use std::ops::ControlFlow;
use std::rc::Rc;

use futures::future::{abortable, AbortHandle, FutureExt, LocalBoxFuture};
use tracing::{debug, instrument, warn};

use super::error::{ApplicationError, ApplicationResult};
use crate::domain::{
    change_node_at_path, format_path, walk, Children, KeyOf, LoadRequest, Node, Tree,
};

/// Children delivered by a finished load, with the request that produced them.
#[derive(Debug)]
pub struct LoadedChildren {
    pub request: LoadRequest,
    pub children: Vec<Node>,
}

pub type LoadFuture = LocalBoxFuture<'static, ApplicationResult<LoadedChildren>>;

/// Lazy nodes whose loaders should run now.
///
/// Walks the visible tree; a collapsed node is considered but its descendants
/// are not. Collapsed lazy nodes are included only with `load_collapsed`.
#[instrument(level = "debug", skip(tree, key_of))]
pub fn pending_loads(tree: &Tree, key_of: &dyn KeyOf, load_collapsed: bool) -> Vec<LoadRequest> {
    let mut requests = Vec::new();
    walk(tree, key_of, true, |visit| {
        if visit.node.children.is_lazy() && (visit.node.expanded || load_collapsed) {
            requests.push(LoadRequest {
                node: Rc::clone(visit.node),
                path: visit.path.to_vec(),
                tree_index: visit.tree_index,
                lower_sibling_counts: visit.lower_sibling_counts.to_vec(),
            });
        }
        ControlFlow::Continue(())
    });
    debug!(count = requests.len(), "pending lazy loads");
    requests
}

/// Handle to a running load.
#[derive(Debug)]
pub struct LazyLoad {
    path: String,
    handle: AbortHandle,
}

impl LazyLoad {
    /// Invoke the node's loader. The returned future resolves to the children,
    /// or to `ApplicationError::LazyLoad` on failure or abort.
    pub fn start(request: LoadRequest) -> ApplicationResult<(Self, LoadFuture)> {
        let path = format_path(&request.path);
        let Children::Lazy(loader) = &request.node.children else {
            return Err(ApplicationError::LazyLoad {
                path,
                message: "node has no lazy children".into(),
            });
        };

        let (future, handle) = abortable(loader.load(&request));
        let error_path = path.clone();
        let future = async move {
            match future.await {
                Ok(Ok(children)) => Ok(LoadedChildren { request, children }),
                Ok(Err(e)) => {
                    warn!(path = %error_path, error = %e, "lazy load failed");
                    Err(ApplicationError::LazyLoad {
                        path: error_path,
                        message: e.message,
                    })
                }
                Err(_aborted) => Err(ApplicationError::LazyLoad {
                    path: error_path,
                    message: "load aborted".into(),
                }),
            }
        }
        .boxed_local();

        debug!(%path, "lazy load started");
        Ok((Self { path, handle }, future))
    }

    pub fn abort(&self) {
        debug!(path = %self.path, "lazy load aborted");
        self.handle.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.handle.is_aborted()
    }
}

/// Put loaded children in place, unless the tree has moved on.
///
/// The update applies only if the node at the request's path is still the very
/// node the load started from; otherwise the tree is returned unchanged.
#[instrument(level = "debug", skip_all)]
pub fn apply_loaded_children(tree: &Tree, loaded: LoadedChildren, key_of: &dyn KeyOf) -> Tree {
    let LoadedChildren { request, children } = loaded;
    let children: Vec<_> = children.into_iter().map(Rc::new).collect();

    let mut applied = false;
    let result = change_node_at_path(tree, &request.path, key_of, |old, _| {
        if Rc::ptr_eq(old, &request.node) {
            applied = true;
            Rc::new(Node {
                children: Children::Loaded(children),
                ..(**old).clone()
            })
        } else {
            Rc::clone(old)
        }
    });

    match result {
        Ok(next) if applied => next,
        Ok(_) => {
            debug!(path = %format_path(&request.path), "stale lazy load ignored");
            tree.clone()
        }
        Err(e) => {
            debug!(error = %e, "lazy load target gone");
            tree.clone()
        }
    }
}
