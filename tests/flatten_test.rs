//! Integration tests for flattening, visible row lookup and row scaffolding.

use std::rc::Rc;

use rstest::rstest;

use sortree::domain::{
    flatten, get_visible_node_count, get_visible_node_info_at_index, scaffold, slide_rows,
    toggle_expanded_for_all, walk, IdKey, Node, NodeKey, ScaffoldLine, TreeIndexKey,
};
use sortree::util::testing::{init_test_setup, sample_tree};

use ScaffoldLine::{Blank, Corner, Horizontal, Last, Tee, Vertical};

// ============================================================
// flatten
// ============================================================

#[test]
fn given_expanded_tree_when_flattening_then_preorder_with_increasing_indices() {
    init_test_setup();

    let rows = flatten(&sample_tree(), &TreeIndexKey, true);

    let shape: Vec<(&str, usize, usize)> = rows
        .iter()
        .map(|row| (row.node.title_text(), row.tree_index, row.depth()))
        .collect();
    assert_eq!(
        shape,
        [
            ("A", 0, 0),
            ("B", 1, 1),
            ("C", 2, 2),
            ("D", 3, 2),
            ("E", 4, 1),
            ("F", 5, 0)
        ]
    );
    for row in &rows {
        assert_eq!(row.path.len(), row.lower_sibling_counts.len());
        assert_eq!(row.path.last(), Some(&NodeKey::Index(row.tree_index)));
    }
}

#[test]
fn given_rows_when_inspecting_parents_then_parent_node_is_set() {
    init_test_setup();

    let rows = flatten(&sample_tree(), &IdKey, true);

    assert!(rows[0].parent_node.is_none());
    assert_eq!(rows[2].parent_node.as_ref().map(|p| p.title_text()), Some("B"));
    assert_eq!(rows[4].parent_node.as_ref().map(|p| p.title_text()), Some("A"));
    assert_eq!(
        rows[3].path,
        vec![NodeKey::from("A"), NodeKey::from("B"), NodeKey::from("D")]
    );
}

#[rstest]
#[case::visible_only(true, 2)]
#[case::everything(false, 6)]
fn given_collapsed_tree_when_flattening_then_collapse_respected(
    #[case] ignore_collapsed: bool,
    #[case] expected: usize,
) {
    init_test_setup();
    let tree = toggle_expanded_for_all(&sample_tree(), false);

    let rows = flatten(&tree, &TreeIndexKey, ignore_collapsed);

    assert_eq!(rows.len(), expected);
}

#[test]
fn given_collapsed_tree_when_counting_then_count_matches_rows() {
    init_test_setup();
    let tree = toggle_expanded_for_all(&sample_tree(), false);
    assert_eq!(get_visible_node_count(&tree), flatten(&tree, &TreeIndexKey, true).len());
}

#[test]
fn given_walk_when_breaking_then_stops_early() {
    init_test_setup();
    let mut seen = Vec::new();

    walk(&sample_tree(), &TreeIndexKey, true, |visit| {
        seen.push(visit.node.title_text().to_string());
        if visit.tree_index == 2 {
            std::ops::ControlFlow::Break(())
        } else {
            std::ops::ControlFlow::Continue(())
        }
    });

    assert_eq!(seen, ["A", "B", "C"]);
}

// ============================================================
// get_visible_node_info_at_index
// ============================================================

#[rstest]
#[case(0, Some("A"))]
#[case(3, Some("D"))]
#[case(5, Some("F"))]
#[case(6, None)]
fn given_index_when_looking_up_visible_row_then_row_or_none(
    #[case] index: usize,
    #[case] expected: Option<&str>,
) {
    init_test_setup();

    let row = get_visible_node_info_at_index(&sample_tree(), index, &TreeIndexKey);

    assert_eq!(row.as_ref().map(|r| r.node.title_text()), expected);
    if let Some(row) = row {
        assert_eq!(row.tree_index, index);
    }
}

// ============================================================
// Scaffolding
// ============================================================

#[test]
fn given_sample_rows_when_scaffolding_then_connectors_follow_siblings() {
    init_test_setup();
    let rows = flatten(&sample_tree(), &TreeIndexKey, true);

    let lines: Vec<Vec<ScaffoldLine>> = rows
        .iter()
        .enumerate()
        .map(|(list_index, row)| row.scaffold(list_index))
        .collect();

    assert_eq!(
        lines,
        vec![
            vec![Corner],
            vec![Vertical, Tee],
            vec![Vertical, Vertical, Tee],
            vec![Vertical, Vertical, Last],
            vec![Vertical, Last],
            vec![Last],
        ]
    );
}

#[rstest]
#[case::single_first_row(&[0], 0, vec![Horizontal])]
#[case::nested_last(&[0, 0], 3, vec![Blank, Last])]
#[case::first_row_with_siblings(&[2], 0, vec![Corner])]
fn given_sibling_counts_when_scaffolding_then_expected_lines(
    #[case] counts: &[usize],
    #[case] list_index: usize,
    #[case] expected: Vec<ScaffoldLine>,
) {
    assert_eq!(scaffold(counts, list_index), expected);
}

#[test]
fn given_lines_when_rendering_glyphs_then_box_drawing() {
    let rendered: String = [Vertical, Tee].iter().map(|line| line.glyph()).collect();
    assert_eq!(rendered, "│ ├─");
}

// ============================================================
// slide_rows
// ============================================================

#[test]
fn given_dragged_block_when_sliding_back_then_block_moves_as_unit() {
    init_test_setup();
    let rows = flatten(&sample_tree(), &TreeIndexKey, true);

    // Lift B with its two children and show them after E
    let slid = slide_rows(&rows, 1, 2, 3);

    let titles: Vec<&str> = slid.iter().map(|row| row.node.title_text()).collect();
    assert_eq!(titles, ["A", "E", "B", "C", "D", "F"]);
    assert!(Rc::ptr_eq(&slid[2].node, &rows[1].node));
}

#[test]
fn given_zero_count_when_sliding_then_rows_unchanged() {
    let rows: Vec<Node> = vec![Node::new("x"), Node::new("y")];
    let slid = slide_rows(&rows, 0, 1, 0);
    assert_eq!(slid, rows);
}
