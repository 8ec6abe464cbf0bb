//! Tree entities: nodes, labels, children, keys and paths

use std::borrow::Cow;
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use futures::future::LocalBoxFuture;
use itertools::Itertools;
use thiserror::Error;

/// Shared handle to an immutable node.
pub type NodeRef = Rc<Node>;

/// Root-first sequence of per-level keys ending at the addressed node.
pub type TreePath = Vec<NodeKey>;

/// Sibling-unique key of a node inside one tree snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    Index(usize),
    Name(String),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Index(i) => write!(f, "{}", i),
            NodeKey::Name(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for NodeKey {
    type Err = Infallible;

    /// Numeric input becomes an index key, anything else a name key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(s.parse::<usize>()
            .map(NodeKey::Index)
            .unwrap_or_else(|_| NodeKey::Name(s.to_string())))
    }
}

impl From<usize> for NodeKey {
    fn from(index: usize) -> Self {
        NodeKey::Index(index)
    }
}

impl From<&str> for NodeKey {
    fn from(name: &str) -> Self {
        NodeKey::Name(name.to_string())
    }
}

/// Render a path for error messages and logs, e.g. `[0, 3]`.
pub fn format_path(path: &[NodeKey]) -> String {
    format!("[{}]", path.iter().join(", "))
}

/// Context handed to computed labels.
pub struct LabelContext<'a> {
    pub node: &'a Node,
    pub path: &'a [NodeKey],
    pub tree_index: usize,
}

/// Title or subtitle of a node: plain text, or text computed from the node's position.
#[derive(Clone)]
pub enum Label {
    Text(String),
    Computed(Rc<dyn Fn(&LabelContext<'_>) -> String>),
}

impl Label {
    pub fn computed(f: impl Fn(&LabelContext<'_>) -> String + 'static) -> Self {
        Label::Computed(Rc::new(f))
    }

    pub fn resolve(&self, ctx: &LabelContext<'_>) -> Cow<'_, str> {
        match self {
            Label::Text(text) => Cow::Borrowed(text.as_str()),
            Label::Computed(f) => Cow::Owned(f(ctx)),
        }
    }

    /// Plain text, if this label is not computed.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Label::Text(text) => Some(text),
            Label::Computed(_) => None,
        }
    }
}

impl From<&str> for Label {
    fn from(text: &str) -> Self {
        Label::Text(text.to_string())
    }
}

impl From<String> for Label {
    fn from(text: String) -> Self {
        Label::Text(text)
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Label::Text(a), Label::Text(b)) => a == b,
            (Label::Computed(a), Label::Computed(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Text(text) => write!(f, "{:?}", text),
            Label::Computed(_) => write!(f, "<computed>"),
        }
    }
}

/// Failure reported by a lazy children loader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct LoadError {
    pub message: String,
}

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Future yielded by a lazy loader.
pub type ChildrenFuture = LocalBoxFuture<'static, Result<Vec<Node>, LoadError>>;

/// Everything a loader knows about the node whose children it fetches.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub node: NodeRef,
    pub path: TreePath,
    pub tree_index: usize,
    pub lower_sibling_counts: Vec<usize>,
}

/// Deferred children: a capability that produces a future of the child sequence.
#[derive(Clone)]
pub struct LazyChildren {
    loader: Rc<dyn Fn(&LoadRequest) -> ChildrenFuture>,
}

impl LazyChildren {
    pub fn new(loader: impl Fn(&LoadRequest) -> ChildrenFuture + 'static) -> Self {
        Self {
            loader: Rc::new(loader),
        }
    }

    pub fn load(&self, request: &LoadRequest) -> ChildrenFuture {
        (self.loader)(request)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.loader, &other.loader)
    }
}

impl fmt::Debug for LazyChildren {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LazyChildren(<loader>)")
    }
}

/// Children of a node: absent, present, or not loaded yet.
#[derive(Debug, Clone, Default)]
pub enum Children {
    #[default]
    None,
    Loaded(Vec<NodeRef>),
    Lazy(LazyChildren),
}

impl Children {
    pub fn loaded(&self) -> Option<&[NodeRef]> {
        match self {
            Children::Loaded(children) => Some(children),
            _ => None,
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Children::Lazy(_))
    }

    /// True only for a non-empty loaded child sequence.
    pub fn has_loaded(&self) -> bool {
        self.loaded().is_some_and(|c| !c.is_empty())
    }
}

impl PartialEq for Children {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Children::None, Children::None) => true,
            (Children::Loaded(a), Children::Loaded(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Rc::ptr_eq(x, y) || x == y)
            }
            (Children::Lazy(a), Children::Lazy(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Immutable tree element. Mutators always produce new nodes and share the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    /// Content-stable identifier supplied by the caller
    pub id: Option<String>,
    pub title: Option<Label>,
    pub subtitle: Option<Label>,
    pub children: Children,
    /// Collapsed nodes hide their descendants from flattening
    pub expanded: bool,
}

impl Node {
    pub fn new(title: impl Into<Label>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<Label>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children = Children::Loaded(children.into_iter().map(Rc::new).collect());
        self
    }

    pub fn with_lazy_children(
        mut self,
        loader: impl Fn(&LoadRequest) -> ChildrenFuture + 'static,
    ) -> Self {
        self.children = Children::Lazy(LazyChildren::new(loader));
        self
    }

    pub fn expanded(mut self, expanded: bool) -> Self {
        self.expanded = expanded;
        self
    }

    /// Plain-text title, empty for computed or missing titles.
    pub fn title_text(&self) -> &str {
        self.title.as_ref().and_then(Label::as_text).unwrap_or("")
    }
}

/// An ordered forest of root nodes. Cloning shares the roots.
#[derive(Clone, Default)]
pub struct Tree {
    roots: Rc<Vec<NodeRef>>,
}

impl Tree {
    pub fn new(roots: impl IntoIterator<Item = Node>) -> Self {
        Self::from_refs(roots.into_iter().map(Rc::new).collect())
    }

    pub fn from_refs(roots: Vec<NodeRef>) -> Self {
        Self {
            roots: Rc::new(roots),
        }
    }

    pub fn roots(&self) -> &[NodeRef] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Identity comparison used by memoization.
    pub fn ptr_eq(&self, other: &Tree) -> bool {
        Rc::ptr_eq(&self.roots, &other.roots)
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.roots.len() == other.roots.len()
                && self
                    .roots
                    .iter()
                    .zip(other.roots.iter())
                    .all(|(a, b)| Rc::ptr_eq(a, b) || a == b))
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.roots.iter()).finish()
    }
}

/// Produces sibling-unique keys for nodes; paths are built from these keys.
pub trait KeyOf {
    fn key_of(&self, node: &Node, tree_index: usize, parent_path: &[NodeKey]) -> NodeKey;
}

impl<F> KeyOf for F
where
    F: Fn(&Node, usize, &[NodeKey]) -> NodeKey,
{
    fn key_of(&self, node: &Node, tree_index: usize, parent_path: &[NodeKey]) -> NodeKey {
        self(node, tree_index, parent_path)
    }
}

/// Keys nodes by their linear row index.
///
/// Only stable within one flatten pass: any structural change above a node
/// changes its key, so paths taken before a mutation go stale after it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeIndexKey;

impl KeyOf for TreeIndexKey {
    fn key_of(&self, _node: &Node, tree_index: usize, _parent_path: &[NodeKey]) -> NodeKey {
        NodeKey::Index(tree_index)
    }
}

/// Keys nodes by `Node::id`, falling back to the row index for nodes without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdKey;

impl KeyOf for IdKey {
    fn key_of(&self, node: &Node, tree_index: usize, _parent_path: &[NodeKey]) -> NodeKey {
        match &node.id {
            Some(id) => NodeKey::Name(id.clone()),
            None => NodeKey::Index(tree_index),
        }
    }
}

/// Extend `parent` with the key of `node`.
pub(crate) fn child_path(
    parent: &[NodeKey],
    node: &Node,
    tree_index: usize,
    key_of: &dyn KeyOf,
) -> TreePath {
    let mut path = Vec::with_capacity(parent.len() + 1);
    path.extend_from_slice(parent);
    path.push(key_of.key_of(node, tree_index, parent));
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_numeric_string_when_parsing_key_then_returns_index() {
        assert_eq!("12".parse::<NodeKey>().unwrap(), NodeKey::Index(12));
        assert_eq!("docs".parse::<NodeKey>().unwrap(), NodeKey::Name("docs".into()));
    }

    #[test]
    fn given_path_when_formatting_then_joins_keys() {
        let path = vec![NodeKey::Index(0), NodeKey::Name("b".into())];
        assert_eq!(format_path(&path), "[0, b]");
    }

    #[test]
    fn given_same_structure_when_comparing_trees_then_equal() {
        let a = Tree::new(vec![Node::new("A").with_children(vec![Node::new("B")])]);
        let b = Tree::new(vec![Node::new("A").with_children(vec![Node::new("B")])]);
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn given_id_key_when_node_has_no_id_then_falls_back_to_index() {
        let node = Node::new("x");
        assert_eq!(IdKey.key_of(&node, 4, &[]), NodeKey::Index(4));
        let node = node.with_id("n1");
        assert_eq!(IdKey.key_of(&node, 4, &[]), NodeKey::Name("n1".into()));
    }

    #[test]
    fn given_computed_label_when_resolving_then_uses_context() {
        let label = Label::computed(|ctx| format!("row {}", ctx.tree_index));
        let node = Node::default();
        let ctx = LabelContext {
            node: &node,
            path: &[],
            tree_index: 7,
        };
        assert_eq!(label.resolve(&ctx), "row 7");
    }
}
