//! Integration tests for the pure tree mutators.
//!
//! Trees are keyed by row index unless a test says otherwise, so a path like
//! `[0, 1, 3]` means "root at row 0, its child at row 1, grandchild at row 3".

use std::rc::Rc;

use futures::future::{self, FutureExt};
use rstest::rstest;

use sortree::domain::{
    add_node_under_parent, change_node_at_path, flatten, get_depth, get_descendant_count,
    get_tree_from_flat_data, get_visible_node_count, insert_node, is_descendant, map,
    remove_node, resolve, toggle_expanded_for_all, DomainError, FlatRecord, IdKey, Node, NodeKey,
    Tree, TreeIndexKey,
};
use sortree::util::testing::{branch, init_test_setup, leaf, sample_tree, titles};

fn path(indices: &[usize]) -> Vec<NodeKey> {
    indices.iter().map(|&i| NodeKey::Index(i)).collect()
}

// ============================================================
// Scenarios: flatten, collapse, move, search
// ============================================================

fn two_level_tree() -> Tree {
    Tree::new([branch("A", [leaf("B")])])
}

#[test]
fn given_expanded_parent_when_flattening_then_child_row_follows() {
    init_test_setup();
    let rows = flatten(&two_level_tree(), &TreeIndexKey, true);

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].node.title_text(), "A");
    assert_eq!((rows[0].tree_index, rows[0].depth()), (0, 0));
    assert_eq!(rows[1].node.title_text(), "B");
    assert_eq!((rows[1].tree_index, rows[1].depth()), (1, 1));
    assert_eq!(rows[1].path, path(&[0, 1]));
}

#[test]
fn given_collapsed_parent_when_flattening_then_child_hidden() {
    init_test_setup();
    let tree = change_node_at_path(&two_level_tree(), &path(&[0]), &TreeIndexKey, |old, _| {
        Rc::new(Node {
            expanded: false,
            ..(**old).clone()
        })
    })
    .unwrap();

    let rows = flatten(&tree, &TreeIndexKey, true);

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].node.title_text(), "A");
}

#[test]
fn given_child_removed_when_inserting_as_first_root_then_it_precedes_parent() {
    init_test_setup();
    let removed = remove_node(&two_level_tree(), &path(&[0, 1]), &TreeIndexKey).unwrap();

    let inserted = insert_node(&removed.tree, &removed.node, 0, 0, false, &TreeIndexKey).unwrap();

    assert_eq!(titles(&inserted.tree), ["B", "A"]);
    assert_eq!(inserted.tree_index, 0);
    assert!(inserted.parent_node.is_none());
}

// ============================================================
// remove_node / insert_node
// ============================================================

#[rstest]
#[case::root(&[0])]
#[case::inner(&[0, 1])]
#[case::first_grandchild(&[0, 1, 2])]
#[case::last_grandchild(&[0, 1, 3])]
#[case::last_child(&[0, 4])]
#[case::last_root(&[5])]
fn given_removed_node_when_reinserted_at_its_slot_then_tree_restored(#[case] at: &[usize]) {
    init_test_setup();
    let tree = sample_tree();
    let removed = remove_node(&tree, &path(at), &TreeIndexKey).unwrap();
    assert_eq!(titles(&removed.tree).len() + 1 + get_descendant_count(&removed.node, true), 6);

    let inserted = insert_node(
        &removed.tree,
        &removed.node,
        at.len() - 1,
        removed.tree_index,
        false,
        &TreeIndexKey,
    )
    .unwrap();

    assert_eq!(inserted.tree, tree);
    assert_eq!(inserted.tree_index, removed.tree_index);
    assert_eq!(inserted.path, path(at));
}

#[test]
fn given_removal_when_inspecting_result_then_siblings_are_shared() {
    init_test_setup();
    let tree = sample_tree();

    let removed = remove_node(&tree, &path(&[0, 4]), &TreeIndexKey).unwrap();

    assert_eq!(removed.tree_index, 4);
    assert_eq!(removed.node.title_text(), "E");
    assert!(Rc::ptr_eq(&removed.tree.roots()[1], &tree.roots()[1]));
    let old_b = &tree.roots()[0].children.loaded().unwrap()[0];
    let new_b = &removed.tree.roots()[0].children.loaded().unwrap()[0];
    assert!(Rc::ptr_eq(old_b, new_b));
}

#[test]
fn given_depth_deeper_than_tree_allows_when_inserting_then_depth_clamped() {
    init_test_setup();
    let tree = Tree::new([leaf("A"), leaf("F")]);
    let node = Rc::new(leaf("X"));

    let inserted = insert_node(&tree, &node, 3, 1, true, &TreeIndexKey).unwrap();

    assert_eq!(inserted.path, path(&[0, 1]));
    assert_eq!(inserted.tree_index, 1);
    let parent = inserted.parent_node.expect("parent");
    assert_eq!(parent.title_text(), "A");
    assert!(parent.expanded, "expand_parent opens the receiving node");
    assert_eq!(titles(&inserted.tree), ["A", "X", "F"]);
}

#[test]
fn given_unloaded_lazy_parent_when_inserting_under_it_then_fails() {
    init_test_setup();
    let tree = Tree::new([leaf("A")
        .with_lazy_children(|_| future::pending().boxed_local())
        .expanded(true)]);
    let node = Rc::new(leaf("X"));

    let result = insert_node(&tree, &node, 1, 1, false, &TreeIndexKey);

    assert!(matches!(result, Err(DomainError::LazyChildrenNotLoaded { .. })));
}

#[test]
fn given_empty_tree_when_inserting_root_then_single_row() {
    init_test_setup();
    let node = Rc::new(leaf("X"));

    let inserted = insert_node(&Tree::default(), &node, 0, 0, false, &TreeIndexKey).unwrap();

    assert_eq!(titles(&inserted.tree), ["X"]);
    assert_eq!(inserted.path, path(&[0]));
}

// ============================================================
// Path resolution errors
// ============================================================

#[rstest]
#[case::unknown_root(&[9])]
#[case::unknown_child(&[0, 7])]
#[case::below_leaf(&[5, 6])]
fn given_unresolvable_path_when_removing_then_path_resolution_error(#[case] at: &[usize]) {
    init_test_setup();
    let result = remove_node(&sample_tree(), &path(at), &TreeIndexKey);
    assert!(matches!(result, Err(DomainError::PathResolution { .. })));
}

#[test]
fn given_empty_path_when_resolving_then_error() {
    init_test_setup();
    assert!(resolve(&sample_tree(), &[], &TreeIndexKey).is_err());
}

#[test]
fn given_id_keys_when_resolving_then_names_address_nodes() {
    init_test_setup();
    let keys: Vec<NodeKey> = vec!["A".into(), "B".into(), "D".into()];

    let resolved = resolve(&sample_tree(), &keys, &IdKey).unwrap();

    assert_eq!(resolved.node.title_text(), "D");
    assert_eq!(resolved.tree_index, 3);
}

// ============================================================
// map / toggle_expanded_for_all
// ============================================================

#[test]
fn given_identity_callback_when_mapping_then_nodes_shared() {
    init_test_setup();
    let tree = sample_tree();

    let mapped = map(&tree, &TreeIndexKey, true, |visit| Rc::clone(visit.node));

    assert!(Rc::ptr_eq(&mapped.roots()[0], &tree.roots()[0]));
    assert!(Rc::ptr_eq(&mapped.roots()[1], &tree.roots()[1]));
}

#[test]
fn given_callback_when_mapping_then_children_are_visited_first() {
    init_test_setup();
    let mut order = Vec::new();

    map(&sample_tree(), &TreeIndexKey, true, |visit| {
        order.push(visit.node.title_text().to_string());
        Rc::clone(visit.node)
    });

    assert_eq!(order, ["C", "D", "B", "E", "A", "F"]);
}

#[test]
fn given_collapsed_tree_when_expanding_all_then_hidden_nodes_toggled_too() {
    init_test_setup();
    let collapsed = toggle_expanded_for_all(&sample_tree(), false);
    assert_eq!(titles(&collapsed), ["A", "F"]);

    let expanded = toggle_expanded_for_all(&collapsed, true);

    assert_eq!(titles(&expanded), ["A", "B", "C", "D", "E", "F"]);
}

// ============================================================
// Depth and counts
// ============================================================

#[test]
fn given_nodes_when_measuring_depth_then_lazy_counts_as_one_level() {
    init_test_setup();
    let tree = sample_tree();
    let lazy = leaf("L").with_lazy_children(|_| future::pending().boxed_local());

    assert_eq!(get_depth(&tree.roots()[0]), 2);
    assert_eq!(get_depth(&tree.roots()[1]), 0);
    assert_eq!(get_depth(&lazy), 1);
    assert_eq!(get_depth(&leaf("E").with_children([])), 0);
}

#[rstest]
#[case::expanded(true, true, 4)]
#[case::collapsed_ignored(false, true, 0)]
#[case::collapsed_counted(false, false, 4)]
fn given_subtree_when_counting_descendants_then_collapse_respected(
    #[case] expanded: bool,
    #[case] ignore_collapsed: bool,
    #[case] expected: usize,
) {
    init_test_setup();
    let root = Node {
        expanded,
        ..(*sample_tree().roots()[0]).clone()
    };
    assert_eq!(get_descendant_count(&root, ignore_collapsed), expected);
}

#[test]
fn given_tree_when_counting_visible_nodes_then_matches_flatten() {
    init_test_setup();
    let tree = sample_tree();
    let partly = change_node_at_path(&tree, &path(&[0, 1]), &TreeIndexKey, |old, _| {
        Rc::new(Node {
            expanded: false,
            ..(**old).clone()
        })
    })
    .unwrap();

    assert_eq!(get_visible_node_count(&tree), 6);
    assert_eq!(get_visible_node_count(&partly), 4);
    assert_eq!(get_visible_node_count(&partly), flatten(&partly, &TreeIndexKey, true).len());
}

#[test]
fn given_nodes_when_checking_ancestry_then_identity_based() {
    init_test_setup();
    let tree = sample_tree();
    let a = &tree.roots()[0];
    let b = &a.children.loaded().unwrap()[0];
    let c = &b.children.loaded().unwrap()[0];
    let e = &a.children.loaded().unwrap()[1];

    assert!(is_descendant(a, c));
    assert!(!is_descendant(b, e));
    assert!(!is_descendant(a, &Rc::new(leaf("C"))));
}

// ============================================================
// add_node_under_parent
// ============================================================

#[rstest]
#[case::last_child(false, ["A", "B", "C", "D", "X", "E", "F"], 4)]
#[case::first_child(true, ["A", "B", "X", "C", "D", "E", "F"], 2)]
fn given_parent_key_when_adding_then_placed_under_parent(
    #[case] first: bool,
    #[case] expected: [&str; 7],
    #[case] tree_index: usize,
) {
    init_test_setup();
    let node = Rc::new(leaf("X"));

    let added =
        add_node_under_parent(&sample_tree(), &node, Some(&"B".into()), &IdKey, true, first).unwrap();

    assert_eq!(titles(&added.tree), expected);
    assert_eq!(added.tree_index, tree_index);
}

#[test]
fn given_no_parent_key_when_adding_then_new_last_root() {
    init_test_setup();
    let node = Rc::new(leaf("X"));

    let added = add_node_under_parent(&sample_tree(), &node, None, &IdKey, false, false).unwrap();

    assert_eq!(added.tree_index, 6);
    assert_eq!(added.tree.len(), 3);
}

#[test]
fn given_unknown_parent_key_when_adding_then_parent_not_found() {
    init_test_setup();
    let node = Rc::new(leaf("X"));

    let result = add_node_under_parent(&sample_tree(), &node, Some(&"Z".into()), &IdKey, false, false);

    assert!(matches!(result, Err(DomainError::ParentNotFound { key }) if key == "Z"));
}

// ============================================================
// get_tree_from_flat_data
// ============================================================

fn record(key: &str, parent: Option<&str>) -> FlatRecord {
    FlatRecord {
        key: key.into(),
        parent_key: parent.map(str::to_string),
        node: Node::new(format!("node {key}")),
    }
}

#[test]
fn given_flat_records_when_building_tree_then_nested_by_parent_key() {
    init_test_setup();
    let records = vec![
        record("1", None),
        record("2", Some("1")),
        record("3", Some("1")),
        record("4", Some("2")),
        record("5", None),
    ];

    let tree = get_tree_from_flat_data(records, None);

    let rows = flatten(&tree, &IdKey, false);
    let shape: Vec<(String, usize)> = rows
        .iter()
        .map(|row| (row.node.id.clone().unwrap_or_default(), row.depth()))
        .collect();
    assert_eq!(
        shape,
        [
            ("1".to_string(), 0),
            ("2".to_string(), 1),
            ("4".to_string(), 2),
            ("3".to_string(), 1),
            ("5".to_string(), 0)
        ]
    );
}

#[test]
fn given_root_key_when_building_tree_then_only_its_subtree() {
    init_test_setup();
    let records = vec![record("1", None), record("2", Some("1")), record("3", Some("2"))];

    let tree = get_tree_from_flat_data(records, Some("1"));

    assert_eq!(tree.len(), 1);
    assert_eq!(tree.roots()[0].title_text(), "node 2");
    assert_eq!(get_descendant_count(&tree.roots()[0], false), 1);
}
