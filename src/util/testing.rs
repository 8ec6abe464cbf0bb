//! Test support: one-time logging setup and small tree builders

use std::env;
use std::sync::Once;

use tracing::{debug, info};
use tracing_subscriber::{
    filter::filter_fn,
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::domain::{Node, Tree};

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", "trace");
        }
        // global logging subscriber, used by all tracing log macros
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    // Hover throttling logs every frame
    let noisy_modules = ["sortree::application::throttle"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_target(true)
            .with_thread_names(false)
            .with_test_writer()
            .with_span_events(FmtSpan::ENTER)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(module_filter)
            .with_filter(env_filter),
    );

    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

/// Leaf node titled and keyed by `title`.
pub fn leaf(title: &str) -> Node {
    Node::new(title).with_id(title)
}

/// Expanded node titled and keyed by `title`.
pub fn branch(title: &str, children: impl IntoIterator<Item = Node>) -> Node {
    leaf(title).with_children(children).expanded(true)
}

/// Visible titles in row order.
pub fn titles(tree: &Tree) -> Vec<String> {
    crate::domain::flatten(tree, &crate::domain::TreeIndexKey, true)
        .iter()
        .map(|row| row.node.title_text().to_string())
        .collect()
}

/// ```text
/// A
/// ├─ B
/// │  ├─ C
/// │  └─ D
/// └─ E
/// F
/// ```
/// Everything expanded.
pub fn sample_tree() -> Tree {
    Tree::new([
        branch(
            "A",
            [branch("B", [leaf("C"), leaf("D")]), leaf("E")],
        ),
        leaf("F"),
    ])
}
