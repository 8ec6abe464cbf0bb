//! sortree: immutable trees with flattening, search, lazy children and drag-and-drop reordering
//!
//! Layers: `domain` holds the pure tree algorithms, `application` the stateful
//! controllers (drag sessions, lazy loads, memoization, `TreeView`), `cli` the
//! command line front end over JSON tree documents.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod util;
