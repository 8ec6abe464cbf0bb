//! Command dispatch and the per-command handlers

use std::cell::RefCell;
use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::rc::Rc;

use clap::CommandFactory;
use futures::executor::block_on;
use tracing::{debug, info, instrument};

use super::args::{Cli, Commands, ConfigCommands, KeyStrategy};
use super::document::{load_tree, tree_to_json};
use super::error::{CliError, CliResult};
use super::output::{self, RowMark};
use crate::application::{
    apply_loaded_children, pending_loads, ApplicationError, LazyLoad, MoveNodeEvent, TreeEvents,
    TreeView,
};
use crate::config::{global_config_path, TreeSettings};
use crate::domain::{
    find, flatten, format_path, toggle_expanded_for_all, DefaultMatcher, FlatRow, IdKey, KeyOf,
    Node, NodeKey, RegexMatcher, SearchMatcher, SearchOptions, Tree, TreeIndexKey,
};

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Rows {
            file,
            all,
            load,
            key,
        }) => _rows(cli, file, *all, *load, *key),
        Some(Commands::Tree { file }) => _tree(file),
        Some(Commands::Search {
            file,
            query,
            regex,
            focus,
            expand_all,
            key,
        }) => _search(cli, file, query, *regex, *focus, *expand_all, *key),
        Some(Commands::Move {
            file,
            from,
            depth,
            index,
            json,
            key,
        }) => _move(cli, file, from, *depth, *index, *json, *key),
        Some(Commands::Config { command }) => _config(cli, command),
        Some(Commands::Completion { shell }) => _completion(*shell),
        None => Err(CliError::Usage(
            "no command given, see 'sortree --help'".into(),
        )),
    }
}

fn key_strategy(key: KeyStrategy) -> Rc<dyn KeyOf> {
    match key {
        KeyStrategy::Index => Rc::new(TreeIndexKey),
        KeyStrategy::Id => Rc::new(IdKey),
    }
}

fn settings(cli: &Cli) -> CliResult<TreeSettings> {
    Ok(TreeSettings::load(cli.config.as_deref())?)
}

/// Run lazy loaders until none are pending.
fn load_lazy_children(mut tree: Tree, key_of: &dyn KeyOf, load_collapsed: bool) -> CliResult<Tree> {
    loop {
        let requests = pending_loads(&tree, key_of, load_collapsed);
        if requests.is_empty() {
            return Ok(tree);
        }
        for request in requests {
            let (_load, future) = LazyLoad::start(request)?;
            let loaded = block_on(future)?;
            tree = apply_loaded_children(&tree, loaded, key_of);
        }
    }
}

fn print_rows(rows: &[FlatRow], mark: impl Fn(&FlatRow) -> RowMark) {
    for (list_index, row) in rows.iter().enumerate() {
        let scaffold: String = row
            .scaffold(list_index)
            .into_iter()
            .map(|line| line.glyph())
            .collect();
        let expander = match (row.node.children.loaded(), row.node.children.is_lazy()) {
            (_, true) => "? ",
            (Some(children), _) if !children.is_empty() => {
                if row.node.expanded {
                    "- "
                } else {
                    "+ "
                }
            }
            _ => "",
        };
        let meta = format!(
            "#{} depth {} {}",
            row.tree_index,
            row.depth(),
            format_path(&row.path)
        );
        output::row(
            &scaffold,
            &format!("{}{}", expander, row.node.title_text()),
            &meta,
            mark(row),
        );
    }
}

#[instrument(skip(cli))]
fn _rows(cli: &Cli, file: &Path, all: bool, load: bool, key: KeyStrategy) -> CliResult<()> {
    let key_of = key_strategy(key);
    let mut tree = load_tree(file)?;
    if load {
        let settings = settings(cli)?;
        tree = load_lazy_children(tree, key_of.as_ref(), settings.load_collapsed_lazy_children || all)?;
    }

    let rows = flatten(&tree, key_of.as_ref(), !all);
    debug!(rows = rows.len(), "flattened");
    print_rows(&rows, |_| RowMark::Plain);
    Ok(())
}

fn diagram(node: &Node) -> termtree::Tree<String> {
    let mut label = node.title_text().to_string();
    if node.children.is_lazy() {
        label.push_str(" (lazy)");
    } else if !node.expanded && node.children.loaded().is_some_and(|c| !c.is_empty()) {
        label.push_str(" (collapsed)");
    }
    let children = node.children.loaded().unwrap_or_default();
    termtree::Tree::new(label).with_leaves(children.iter().map(|child| diagram(child)))
}

#[instrument]
fn _tree(file: &Path) -> CliResult<()> {
    let tree = load_tree(file)?;
    if tree.is_empty() {
        output::warning("tree is empty");
        return Ok(());
    }
    for root in tree.roots() {
        output::info(&diagram(root));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
#[instrument(skip(cli))]
fn _search(
    cli: &Cli,
    file: &Path,
    query: &str,
    regex: bool,
    focus: Option<usize>,
    expand_all: bool,
    key: KeyStrategy,
) -> CliResult<()> {
    let settings = settings(cli)?;
    let key_of = key_strategy(key);
    let mut tree = load_tree(file)?;
    if settings.only_expand_searched_nodes {
        tree = toggle_expanded_for_all(&tree, false);
    }

    let matcher: Box<dyn SearchMatcher> = if regex {
        Box::new(RegexMatcher::new(query).map_err(|e| CliError::InvalidArgs(format!("invalid pattern: {e}")))?)
    } else {
        Box::new(DefaultMatcher)
    };
    let options = SearchOptions {
        expand_all_match_paths: expand_all,
        expand_focus_match_paths: true,
        focus_offset: focus,
    };
    let found = find(&tree, Some(query), Some(matcher.as_ref()), &options, key_of.as_ref());
    info!(matches = found.matches.len(), "search finished");

    output::header(&format!("{} match(es)", found.matches.len()));
    for (offset, m) in found.matches.iter().enumerate() {
        let marker = if Some(offset) == focus { "*" } else { " " };
        output::detail(&format!(
            "{} {} {}",
            marker,
            format_path(&m.path),
            m.node.title_text()
        ));
    }

    let visible: HashSet<usize> = found.matches.iter().filter_map(|m| m.tree_index).collect();
    let focused = focus
        .and_then(|offset| found.matches.get(offset))
        .and_then(|m| m.tree_index);
    let rows = flatten(&found.tree, key_of.as_ref(), true);
    print_rows(&rows, |row| {
        if Some(row.tree_index) == focused {
            RowMark::Focus
        } else if visible.contains(&row.tree_index) {
            RowMark::Match
        } else {
            RowMark::Plain
        }
    });
    Ok(())
}

/// Remembers the last move reported by the view.
#[derive(Default)]
struct MoveRecorder {
    last: RefCell<Option<MoveNodeEvent>>,
}

impl TreeEvents for MoveRecorder {
    fn on_move_node(&self, event: &MoveNodeEvent) {
        self.last.replace(Some(event.clone()));
    }
}

#[allow(clippy::too_many_arguments)]
#[instrument(skip(cli))]
fn _move(
    cli: &Cli,
    file: &Path,
    from: &[NodeKey],
    depth: usize,
    index: usize,
    json: bool,
    key: KeyStrategy,
) -> CliResult<()> {
    let settings = settings(cli)?;
    let key_of = key_strategy(key);
    let recorder = Rc::new(MoveRecorder::default());
    let mut view = TreeView::new(load_tree(file)?, Rc::clone(&key_of), settings)
        .with_events(Rc::clone(&recorder) as Rc<dyn TreeEvents>);

    match view.start_drag(from) {
        Err(ApplicationError::Domain(e)) if e.is_retryable() => {
            debug!(error = %e, "loading lazy children before retrying");
            let loaded = load_lazy_children(view.tree().clone(), key_of.as_ref(), true)?;
            view.set_tree(loaded);
            view.start_drag(from)?;
        }
        started => started?,
    }
    let loads = view.drop_at(depth, index)?;
    if !loads.is_empty() {
        debug!(count = loads.len(), "lazy loads left pending");
    }

    let event = recorder.last.take().ok_or_else(|| {
        CliError::InvalidArgs(format!("nothing moved from {}", format_path(from)))
    })?;

    if json {
        output::info(&tree_to_json(view.tree())?);
        return Ok(());
    }

    output::action("Moved", &event.node.title_text());
    output::detail(&format!(
        "from {} (#{})",
        format_path(&event.prev_path),
        event.prev_tree_index
    ));
    if let (Some(path), Some(tree_index)) = (&event.next_path, event.next_tree_index) {
        output::detail(&format!("to   {} (#{})", format_path(path), tree_index));
    }
    if let Some(parent) = &event.next_parent_node {
        output::detail(&format!("under {}", parent.title_text()));
    }
    let rows = view.flat_rows();
    let moved = event.next_tree_index;
    print_rows(&rows, |row| {
        if Some(row.tree_index) == moved {
            RowMark::Focus
        } else {
            RowMark::Plain
        }
    });
    Ok(())
}

#[instrument(skip(cli))]
fn _config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = settings(cli)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Template => output::info(&TreeSettings::template()),
        ConfigCommands::Path => match global_config_path() {
            Some(path) => {
                let status = if path.exists() { "" } else { " (not present)" };
                output::info(&format!("{}{}", path.display(), status));
            }
            None => output::warning("no config directory on this platform"),
        },
    }
    Ok(())
}

fn _completion(shell: clap_complete::Shell) -> CliResult<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}
