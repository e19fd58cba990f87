//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag.
//! When `--json` is enabled, output is machine-readable JSON.

use std::fmt::Display;

use serde::Serialize;

use crate::core::element::ContainerDiff;
use crate::core::history::State;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Print a value as pretty JSON (always shown).
pub fn json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Abbreviated hash shown in listings.
pub const SHORT_HASH: usize = 10;

/// One log line: `<hash> <timestamp> <author>  <message>`.
///
/// Temporary states are marked with `(temporary)`, states off the valid
/// path with `(invalid)`.
pub fn format_state(state: &State) -> String {
    let meta = state.metadata();
    let mut line = format!(
        "{} {} {}  {}",
        state.fingerprint().short(SHORT_HASH),
        meta.timestamp,
        meta.author,
        first_line(&meta.message)
    );
    if state.is_temporary() {
        line.push_str(" (temporary)");
    }
    if !meta.valid {
        line.push_str(" (invalid)");
    }
    line
}

/// Status listing with `A`, `D` and `M` markers.
pub fn format_changes(diff: &ContainerDiff) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.extend(diff.added.iter().map(|p| format!("A {}", p.display())));
    lines.extend(diff.removed.iter().map(|p| format!("D {}", p.display())));
    lines.extend(diff.modified.iter().map(|p| format!("M {}", p.display())));
    lines.sort_by(|a, b| a[2..].cmp(&b[2..]));
    lines.join("\n")
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

/// Serializable view of a state.
#[derive(Debug, Serialize)]
pub struct StateView {
    pub hash: String,
    pub id: String,
    pub content: Option<String>,
    pub previous: Vec<String>,
    pub valid_previous: Option<String>,
    pub timestamp: String,
    pub author: String,
    pub valid: bool,
    pub message: String,
    pub route: String,
}

impl From<&State> for StateView {
    fn from(state: &State) -> Self {
        let meta = state.metadata();
        Self {
            hash: state.fingerprint().to_string(),
            id: state.id().to_string(),
            content: state.content().map(ToString::to_string),
            previous: state.previous().iter().map(ToString::to_string).collect(),
            valid_previous: state.valid_previous().map(ToString::to_string),
            timestamp: meta.timestamp.to_string(),
            author: meta.author.clone(),
            valid: meta.valid,
            message: meta.message.clone(),
            route: state.route().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::history::StateDraft;
    use crate::core::types::{StateId, UtcTimestamp};
    use std::path::PathBuf;

    fn sample(content: bool) -> State {
        let mut draft = StateDraft::new("ada", "first line\nsecond line");
        if content {
            draft.content = Some(crate::core::fingerprint::hash_str("tree"));
        }
        State::mint(draft, StateId::from_string("id-1"), UtcTimestamp::now())
    }

    #[test]
    fn verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn state_line_shows_first_message_line() {
        let state = sample(true);
        let line = format_state(&state);
        assert!(line.starts_with(state.fingerprint().short(SHORT_HASH)));
        assert!(line.contains("ada"));
        assert!(line.ends_with("first line"));
    }

    #[test]
    fn temporary_state_marked() {
        assert!(format_state(&sample(false)).ends_with("(temporary)"));
    }

    #[test]
    fn changes_sorted_by_path() {
        let diff = ContainerDiff {
            added: vec![PathBuf::from("b.txt")],
            removed: vec![PathBuf::from("a.txt")],
            modified: vec![PathBuf::from("c.txt")],
        };
        assert_eq!(format_changes(&diff), "D a.txt\nA b.txt\nM c.txt");
    }

    #[test]
    fn state_view_serializes() {
        let state = sample(true);
        let value = serde_json::to_value(StateView::from(&state)).unwrap();
        assert_eq!(value["author"], "ada");
        assert_eq!(value["id"], "id-1");
        assert_eq!(value["route"], "*1+0");
    }

    #[test]
    fn format_list_prefixes_items() {
        assert_eq!(format_list(&["a", "b"], "- "), "- a\n- b");
    }
}
