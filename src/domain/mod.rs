//! Domain layer: tree entities and pure tree algorithms
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod error;
pub mod flatten;
pub mod mutators;
pub mod node;
pub mod path;
pub mod search;
pub mod walk;

pub use error::{DomainError, DomainResult};
pub use flatten::{flatten, get_visible_node_info_at_index, scaffold, slide_rows, FlatRow, ScaffoldLine};
pub use mutators::{
    add_node_under_parent, change_node_at_path, get_depth, get_descendant_count,
    get_tree_from_flat_data, get_visible_node_count, insert_node, is_descendant, map,
    remove_node, toggle_expanded_for_all, Added, FlatRecord, Inserted, Removed,
};
pub use node::{
    format_path, Children, ChildrenFuture, IdKey, KeyOf, Label, LabelContext, LazyChildren,
    LoadError, LoadRequest, Node, NodeKey, NodeRef, Tree, TreeIndexKey, TreePath,
};
pub use path::{resolve, with_node_at, Resolved};
pub use search::{
    find, DefaultMatcher, Found, MatchContext, RegexMatcher, SearchMatch, SearchMatcher,
    SearchOptions,
};
pub use walk::{walk, Visit};
