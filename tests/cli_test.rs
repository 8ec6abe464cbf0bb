//! End-to-end tests running the sortree binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

use sortree::exitcode;

const TREE: &str = r#"{ "nodes": [
    { "id": "a", "title": "A", "expanded": true, "children": [ { "id": "b", "title": "B" }, { "id": "c", "title": "C" } ] },
    { "id": "d", "title": "D" }
] }"#;

fn write_document(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("tree.json");
    fs::write(&path, content).unwrap();
    path
}

fn sortree(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sortree"))
        .args(args)
        .env("XDG_CONFIG_HOME", dir)
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run sortree")
}

fn root_titles(stdout: &[u8]) -> Vec<String> {
    let document: serde_json::Value = serde_json::from_slice(stdout).unwrap();
    document["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|node| node["title"].as_str().unwrap_or_default().to_string())
        .collect()
}

// ============================================================
// move
// ============================================================

#[test]
fn given_index_path_when_moving_then_node_lands_at_root() {
    let dir = TempDir::new().unwrap();
    let file = write_document(&dir, TREE);
    let file = file.to_str().unwrap();

    let output = sortree(
        dir.path(),
        &["move", file, "--from", "0,1", "--depth", "0", "--index", "0", "--json"],
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(root_titles(&output.stdout), ["B", "A", "D"]);
}

#[test]
fn given_id_path_when_moving_then_resolved_by_id() {
    let dir = TempDir::new().unwrap();
    let file = write_document(&dir, TREE);
    let file = file.to_str().unwrap();

    let output = sortree(
        dir.path(),
        &[
            "move", file, "--key", "id", "--from", "a,c", "--depth", "0", "--index", "0", "--json",
        ],
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(root_titles(&output.stdout), ["C", "A", "D"]);
}

#[test]
fn given_path_through_lazy_children_when_moving_then_loaded_first() {
    let dir = TempDir::new().unwrap();
    let file = write_document(
        &dir,
        r#"{ "nodes": [ { "title": "dir", "lazy_children": [ { "title": "x" } ] }, { "title": "y" } ] }"#,
    );
    let file = file.to_str().unwrap();

    let output = sortree(
        dir.path(),
        &["move", file, "--from", "0,1", "--depth", "0", "--index", "0", "--json"],
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(root_titles(&output.stdout), ["x", "dir", "y"]);
}

#[test]
fn given_move_without_json_when_run_then_reports_move() {
    let dir = TempDir::new().unwrap();
    let file = write_document(&dir, TREE);
    let file = file.to_str().unwrap();

    let output = sortree(
        dir.path(),
        &["move", file, "--from", "3", "--depth", "1", "--index", "1"],
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Moved: D"), "{stdout}");
    assert!(stdout.contains("under A"), "{stdout}");
}

#[test]
fn given_unknown_path_when_moving_then_dataerr() {
    let dir = TempDir::new().unwrap();
    let file = write_document(&dir, TREE);
    let file = file.to_str().unwrap();

    let output = sortree(
        dir.path(),
        &["move", file, "--from", "7", "--depth", "0", "--index", "0"],
    );

    assert_eq!(output.status.code(), Some(exitcode::DATAERR));
}

// ============================================================
// rows
// ============================================================

#[test]
fn given_document_when_listing_rows_then_paths_printed() {
    let dir = TempDir::new().unwrap();
    let file = write_document(&dir, TREE);

    let output = sortree(dir.path(), &["rows", file.to_str().unwrap()]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("#1 depth 1 [0, 1]"), "{stdout}");
    assert!(stdout.contains("#3 depth 0 [3]"), "{stdout}");
}

#[test]
fn given_missing_document_when_listing_rows_then_noinput() {
    let dir = TempDir::new().unwrap();

    let output = sortree(dir.path(), &["rows", "absent.json"]);

    assert_eq!(output.status.code(), Some(exitcode::NOINPUT));
}
