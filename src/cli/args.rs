//! CLI argument definitions using clap

use std::convert::Infallible;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, ValueHint};

use crate::domain::NodeKey;

/// Inspect and reorder trees stored as JSON documents
#[derive(Parser, Debug)]
#[command(name = "sortree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity: -d info, -dd debug, -ddd trace
    #[arg(short = 'd', long = "debug", action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Settings file layered over the global config
    #[arg(short = 'c', long = "config", global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Numeric segments become index keys, anything else a name key.
fn parse_node_key(s: &str) -> Result<NodeKey, Infallible> {
    s.parse()
}

/// How nodes are keyed in paths.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Row index (paths go stale after structural changes)
    #[default]
    Index,
    /// Node id, falling back to the row index
    Id,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the visible rows with connectors, depth and tree index
    Rows {
        /// Tree document (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Include rows hidden under collapsed nodes
        #[arg(long)]
        all: bool,
        /// Load lazy children before printing
        #[arg(long)]
        load: bool,
        #[arg(long, value_enum, default_value_t = KeyStrategy::Index)]
        key: KeyStrategy,
    },

    /// Show the whole forest as a diagram
    Tree {
        /// Tree document (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Search titles and subtitles, expanding the paths to matches
    Search {
        /// Tree document (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Substring (or pattern with --regex)
        query: String,
        /// Treat the query as a regular expression
        #[arg(long)]
        regex: bool,
        /// Index of the focused match
        #[arg(long)]
        focus: Option<usize>,
        /// Expand the paths to all matches, not only the focused one
        #[arg(long)]
        expand_all: bool,
        #[arg(long, value_enum, default_value_t = KeyStrategy::Index)]
        key: KeyStrategy,
    },

    /// Drag a node to a new slot and print the move
    Move {
        /// Tree document (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Path of the node to move, comma separated (e.g. 0,2)
        #[arg(long, value_delimiter = ',', required = true, value_parser = parse_node_key)]
        from: Vec<NodeKey>,
        /// Target depth (0 = root)
        #[arg(long)]
        depth: usize,
        /// Minimum tree index of the target slot
        #[arg(long)]
        index: usize,
        /// Print the resulting tree as JSON
        #[arg(long)]
        json: bool,
        #[arg(long, value_enum, default_value_t = KeyStrategy::Index)]
        key: KeyStrategy,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings
    Show,
    /// Print a commented template
    Template,
    /// Show the global config file location
    Path,
}
