//! CLI layer: argument parsing, documents and command dispatch

pub mod args;
pub mod commands;
pub mod document;
pub mod error;
pub mod output;

pub use args::{Cli, Commands};
pub use error::{CliError, CliResult};
