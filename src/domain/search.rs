//! Predicate search with ancestor expansion

use std::rc::Rc;

use regex::Regex;
use tracing::{debug, instrument};

use super::node::{child_path, Children, KeyOf, Label, LabelContext, Node, NodeKey, NodeRef, Tree, TreePath};

/// What a matcher sees for each node.
pub struct MatchContext<'a> {
    pub node: &'a Node,
    pub path: &'a [NodeKey],
    pub tree_index: usize,
    pub query: Option<&'a str>,
}

impl MatchContext<'_> {
    fn label_text(&self, label: &Label) -> String {
        label
            .resolve(&LabelContext {
                node: self.node,
                path: self.path,
                tree_index: self.tree_index,
            })
            .into_owned()
    }

    /// Resolved title and subtitle, in that order.
    pub fn labels(&self) -> impl Iterator<Item = String> + '_ {
        [self.node.title.as_ref(), self.node.subtitle.as_ref()]
            .into_iter()
            .flatten()
            .map(move |label| self.label_text(label))
    }
}

pub trait SearchMatcher {
    fn matches(&self, ctx: &MatchContext<'_>) -> bool;
}

impl<F> SearchMatcher for F
where
    F: Fn(&MatchContext<'_>) -> bool,
{
    fn matches(&self, ctx: &MatchContext<'_>) -> bool {
        self(ctx)
    }
}

/// Case-sensitive substring search over title, then subtitle.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMatcher;

impl SearchMatcher for DefaultMatcher {
    fn matches(&self, ctx: &MatchContext<'_>) -> bool {
        let Some(query) = ctx.query else {
            return false;
        };
        ctx.labels().any(|text| text.contains(query))
    }
}

/// Matches titles and subtitles against a compiled pattern; the query string is ignored.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }
}

impl SearchMatcher for RegexMatcher {
    fn matches(&self, ctx: &MatchContext<'_>) -> bool {
        ctx.labels().any(|text| self.regex.is_match(&text))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// Expand the ancestors of every match
    pub expand_all_match_paths: bool,
    /// Expand the ancestors of the focused match
    pub expand_focus_match_paths: bool,
    pub focus_offset: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            expand_all_match_paths: false,
            expand_focus_match_paths: true,
            focus_offset: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchMatch {
    pub node: NodeRef,
    pub path: TreePath,
    /// `None` while the match stays hidden under a collapsed ancestor
    pub tree_index: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Found {
    pub tree: Tree,
    pub matches: Vec<SearchMatch>,
}

struct Visited {
    node: NodeRef,
    /// Index of the last visible row in this subtree
    last_index: isize,
    matches: Vec<SearchMatch>,
    has_focus_match: bool,
}

struct Finder<'a> {
    key_of: &'a dyn KeyOf,
    query: Option<&'a str>,
    matcher: &'a dyn SearchMatcher,
    options: &'a SearchOptions,
    match_count: usize,
}

impl Finder<'_> {
    fn visit(&mut self, node: &NodeRef, is_pseudo_root: bool, current_index: isize, path: &[NodeKey]) -> Visited {
        let mut is_self_match = false;
        let mut has_focus_match = false;

        if !is_pseudo_root {
            let ctx = MatchContext {
                node,
                path,
                tree_index: current_index as usize,
                query: self.query,
            };
            if self.matcher.matches(&ctx) {
                if self.options.focus_offset == Some(self.match_count) {
                    has_focus_match = true;
                }
                self.match_count += 1;
                is_self_match = true;
            }
        }

        let mut matches = Vec::new();
        let mut child_index = current_index;
        let mut expanded = node.expanded;
        let mut next_children = None;

        if let Some(children) = node.children.loaded().filter(|c| !c.is_empty()) {
            let mut mapped = Vec::with_capacity(children.len());
            for child in children {
                let index = child_index + 1;
                let own_path = child_path(path, child, index as usize, self.key_of);
                let result = self.visit(child, false, index, &own_path);
                if result.node.expanded {
                    child_index = result.last_index;
                } else {
                    child_index += 1;
                }

                if !result.matches.is_empty() {
                    if result.has_focus_match {
                        has_focus_match = true;
                    }
                    let expand_all = self.options.expand_all_match_paths;
                    let expand_focus = expand_all || self.options.expand_focus_match_paths;
                    if expand_all || (expand_focus && result.has_focus_match) {
                        expanded = true;
                    }
                    matches.extend(result.matches);
                }
                mapped.push(result.node);
            }
            next_children = Some(mapped);
        }

        if !is_pseudo_root && !expanded {
            for hidden in &mut matches {
                hidden.tree_index = None;
            }
        }

        if matches.is_empty() && !is_self_match {
            return Visited {
                node: Rc::clone(node),
                last_index: child_index,
                matches,
                has_focus_match,
            };
        }

        let mut next = (**node).clone();
        next.expanded = expanded;
        if let Some(children) = next_children {
            next.children = Children::Loaded(children);
        }
        let next = Rc::new(next);

        if is_self_match {
            matches.insert(
                0,
                SearchMatch {
                    node: Rc::clone(&next),
                    path: path.to_vec(),
                    tree_index: Some(current_index as usize),
                },
            );
        }

        Visited {
            node: next,
            last_index: child_index,
            matches,
            has_focus_match,
        }
    }
}

/// Search every node, hidden ones included, and expand match ancestors per `options`.
///
/// Matches are in traversal order and carry the node in its final form. Subtrees
/// without matches are shared with the input. Without a query and a matcher the
/// tree is returned as is with no matches.
#[instrument(level = "debug", skip(tree, matcher, key_of))]
pub fn find(
    tree: &Tree,
    query: Option<&str>,
    matcher: Option<&dyn SearchMatcher>,
    options: &SearchOptions,
    key_of: &dyn KeyOf,
) -> Found {
    if query.is_none() && matcher.is_none() {
        return Found {
            tree: tree.clone(),
            matches: Vec::new(),
        };
    }

    let mut finder = Finder {
        key_of,
        query,
        matcher: matcher.unwrap_or(&DefaultMatcher),
        options,
        match_count: 0,
    };
    let pseudo_root = Rc::new(Node {
        children: Children::Loaded(tree.roots().to_vec()),
        expanded: true,
        ..Node::default()
    });
    let result = finder.visit(&pseudo_root, true, -1, &[]);
    debug!(matches = result.matches.len(), "search finished");

    let tree = if Rc::ptr_eq(&result.node, &pseudo_root) {
        tree.clone()
    } else {
        Tree::from_refs(result.node.children.loaded().map(<[NodeRef]>::to_vec).unwrap_or_default())
    };
    Found {
        tree,
        matches: result.matches,
    }
}
