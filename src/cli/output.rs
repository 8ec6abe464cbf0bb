//! Terminal output formatting with colors
//!
//! Respects NO_COLOR, CLICOLOR, CLICOLOR_FORCE automatically.

use colored::Colorize;

/// Print error (red bold "error:" prefix) to stderr
pub fn error(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

/// Print warning (yellow "Warning:" prefix) to stderr
pub fn warning(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "Warning".yellow(), msg);
}

/// Print completed action (green label)
pub fn action(label: &str, msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}: {}", label.green(), msg);
}

/// Print section header (cyan bold)
pub fn header(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Print indented detail (no color)
pub fn detail(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {}", msg);
}

/// Print plain output (no color, for data)
pub fn info(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg);
}

/// Highlight of a printed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowMark {
    Plain,
    Match,
    Focus,
}

/// Print one tree row: dimmed connectors, the title, dimmed metadata.
pub fn row(scaffold: &str, title: &str, meta: &str, mark: RowMark) {
    let title = match mark {
        RowMark::Plain => title.normal(),
        RowMark::Match => title.yellow(),
        RowMark::Focus => title.yellow().bold().underline(),
    };
    println!("{}{}  {}", scaffold.dimmed(), title, meta.dimmed());
}
