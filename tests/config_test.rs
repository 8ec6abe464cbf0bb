//! Integration tests for layered settings loading.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use rstest::rstest;
use tempfile::TempDir;

use sortree::application::ApplicationError;
use sortree::config::{RowDirection, TreeSettings};
use sortree::exitcode;
use sortree::util::testing::init_test_setup;

fn write_local(content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sortree.toml");
    fs::write(&path, content).unwrap();
    (dir, path)
}

// ============================================================
// Local file layer
// ============================================================

#[test]
fn given_local_file_when_loading_then_overrides_defaults() {
    init_test_setup();
    let (_dir, path) = write_local(
        r#"
max_depth = 3
row_direction = "rtl"
only_expand_searched_nodes = true
"#,
    );

    let settings = TreeSettings::load(Some(&path)).unwrap();

    assert_eq!(settings.max_depth, Some(3));
    assert_eq!(settings.row_direction, RowDirection::Rtl);
    assert!(settings.only_expand_searched_nodes);
    assert_eq!(settings.scaffold_block_px_width, 44.0);
}

#[rstest]
#[case::zero_depth("max_depth = 0")]
#[case::zero_width("scaffold_block_px_width = 0.0")]
#[case::zero_interval("frame_interval_ms = 0")]
fn given_invalid_value_when_loading_then_config_error(#[case] content: &str) {
    init_test_setup();
    let (_dir, path) = write_local(content);

    let result = TreeSettings::load(Some(&path));

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}

#[test]
fn given_missing_local_file_when_loading_then_read_error() {
    init_test_setup();
    let dir = TempDir::new().unwrap();

    let result = TreeSettings::load(Some(&dir.path().join("absent.toml")));

    assert!(matches!(result, Err(ApplicationError::Config { message }) if message.starts_with("read ")));
}

#[test]
fn given_malformed_toml_when_loading_then_parse_error() {
    init_test_setup();
    let (_dir, path) = write_local("max_depth = [");

    let result = TreeSettings::load(Some(&path));

    assert!(matches!(result, Err(ApplicationError::Config { message }) if message.starts_with("parse ")));
}

#[test]
fn given_unknown_direction_when_loading_then_error() {
    init_test_setup();
    let (_dir, path) = write_local(r#"row_direction = "sideways""#);

    assert!(TreeSettings::load(Some(&path)).is_err());
}

// ============================================================
// Environment layer
// ============================================================

#[test]
fn given_env_var_when_loading_then_wins_over_local_file() {
    init_test_setup();
    let (_dir, path) = write_local("should_copy_on_outside_drop = false");
    std::env::set_var("SORTREE_SHOULD_COPY_ON_OUTSIDE_DROP", "true");

    let result = TreeSettings::load(Some(&path));
    std::env::remove_var("SORTREE_SHOULD_COPY_ON_OUTSIDE_DROP");

    assert!(result.unwrap().should_copy_on_outside_drop);
}

#[rstest]
#[case::non_numeric_depth("SORTREE_MAX_DEPTH", "abc")]
#[case::non_numeric_interval("SORTREE_FRAME_INTERVAL_MS", "fast")]
#[case::non_numeric_width("SORTREE_SCAFFOLD_BLOCK_PX_WIDTH", "wide")]
#[case::non_boolean_flag("SORTREE_ONLY_EXPAND_SEARCHED_NODES", "maybe")]
#[case::negative_depth("SORTREE_MAX_DEPTH", "-1")]
fn given_malformed_env_var_when_showing_config_then_config_error(
    #[case] name: &str,
    #[case] value: &str,
) {
    let dir = TempDir::new().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_sortree"))
        .args(["config", "show"])
        .env("XDG_CONFIG_HOME", dir.path())
        .env("NO_COLOR", "1")
        .env(name, value)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(exitcode::CONFIG));
    assert!(String::from_utf8_lossy(&output.stderr).contains("config error"));
}

// ============================================================
// Rendering
// ============================================================

#[test]
fn given_settings_when_rendered_then_toml_reads_back() {
    let settings = TreeSettings {
        max_depth: Some(4),
        row_direction: RowDirection::Rtl,
        ..TreeSettings::default()
    };

    let rendered = settings.to_toml().unwrap();

    assert!(rendered.contains("row_direction = \"rtl\""));
    assert!(rendered.contains("max_depth = 4"));
    let parsed: TreeSettings = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed, settings);
}

#[test]
fn given_template_when_inspected_then_documents_every_setting() {
    let template = TreeSettings::template();

    for key in [
        "scaffold_block_px_width",
        "row_direction",
        "max_depth",
        "only_expand_searched_nodes",
        "load_collapsed_lazy_children",
        "should_copy_on_outside_drop",
        "frame_interval_ms",
    ] {
        assert!(template.contains(&format!("# {key} = ")), "missing {key}");
    }
}
