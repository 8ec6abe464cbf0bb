//! JSON tree documents read and written by the CLI
//!
//! Either nested (`nodes`) or flat (`flat` records with `parent` keys):
//!
//! ```json
//! { "nodes": [ { "id": "a", "title": "A", "expanded": true, "children": [ { "title": "B" } ] } ] }
//! { "flat": [ { "id": "1", "title": "A" }, { "id": "2", "parent": "1", "title": "B" } ] }
//! ```

use std::path::Path;
use std::rc::Rc;

use futures::future::{self, FutureExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::error::{CliError, CliResult};
use crate::domain::{get_tree_from_flat_data, Children, FlatRecord, LazyChildren, Node, Tree};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NodeDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub expanded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeDocument>>,
    /// Children only delivered when loaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lazy_children: Option<Vec<NodeDocument>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FlatNodeDocument {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub expanded: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreeDocument {
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
    #[serde(default)]
    pub flat: Vec<FlatNodeDocument>,
    /// Parent key of the roots in `flat` (default: none)
    #[serde(default)]
    pub root: Option<String>,
}

impl NodeDocument {
    pub fn into_node(self) -> Node {
        let children = match (self.children, self.lazy_children) {
            (Some(children), _) => Children::Loaded(
                children
                    .into_iter()
                    .map(|c| Rc::new(c.into_node()))
                    .collect(),
            ),
            (None, Some(deferred)) => Children::Lazy(LazyChildren::new(move |_request| {
                let children = deferred.iter().cloned().map(NodeDocument::into_node).collect();
                future::ready(Ok(children)).boxed_local()
            })),
            (None, None) => Children::None,
        };
        Node {
            id: self.id,
            title: self.title.map(Into::into),
            subtitle: self.subtitle.map(Into::into),
            children,
            expanded: self.expanded,
        }
    }

    /// Plain-text view of `node`; unloaded lazy children are left out.
    pub fn from_node(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            title: node.title.as_ref().and_then(|l| l.as_text()).map(str::to_string),
            subtitle: node
                .subtitle
                .as_ref()
                .and_then(|l| l.as_text())
                .map(str::to_string),
            expanded: node.expanded,
            children: node
                .children
                .loaded()
                .map(|children| children.iter().map(|c| Self::from_node(c)).collect()),
            lazy_children: None,
        }
    }
}

impl TreeDocument {
    pub fn into_tree(self, path: &Path) -> CliResult<Tree> {
        match (self.nodes.is_empty(), self.flat.is_empty()) {
            (false, false) => Err(CliError::Document {
                path: path.to_path_buf(),
                message: "use either 'nodes' or 'flat', not both".into(),
            }),
            (_, true) => Ok(Tree::new(self.nodes.into_iter().map(NodeDocument::into_node))),
            (true, false) => {
                let records = self.flat.into_iter().map(|item| FlatRecord {
                    node: Node {
                        id: Some(item.id.clone()),
                        title: item.title.map(Into::into),
                        subtitle: item.subtitle.map(Into::into),
                        children: Children::None,
                        expanded: item.expanded,
                    },
                    key: item.id,
                    parent_key: item.parent,
                });
                Ok(get_tree_from_flat_data(records, self.root.as_deref()))
            }
        }
    }
}

/// Read and parse a tree document.
#[instrument(level = "debug")]
pub fn load_tree(path: &Path) -> CliResult<Tree> {
    let content = std::fs::read_to_string(path).map_err(|e| CliError::Io {
        context: format!("read {}", path.display()),
        source: e,
    })?;
    let document: TreeDocument = serde_json::from_str(&content).map_err(|e| CliError::Document {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let tree = document.into_tree(path)?;
    debug!(roots = tree.len(), "document loaded");
    Ok(tree)
}

/// Serialize `tree` as a nested document.
pub fn tree_to_json(tree: &Tree) -> CliResult<String> {
    let nodes: Vec<NodeDocument> = tree.roots().iter().map(|n| NodeDocument::from_node(n)).collect();
    serde_json::to_string_pretty(&serde_json::json!({ "nodes": nodes })).map_err(|e| CliError::Document {
        path: "<stdout>".into(),
        message: e.to_string(),
    })
}
