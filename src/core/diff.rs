//! core::diff
//!
//! Line diffs by the Hunt–McIlroy longest common subsequence method.
//!
//! # Algorithm
//!
//! 1. Index the destination lines: each distinct line maps to the ascending
//!    list of destination positions holding it.
//! 2. Keep candidate traces ordered by destination position, seeded with the
//!    origin `(0, 0)` and a terminal `(m + 1, n + 1)`. For each source line,
//!    visit its destination matches from last to first and extend the longest
//!    trace that ends strictly before the match. A trace already ending at
//!    the match makes the candidate redundant.
//! 3. The trace before the terminal is a longest common subsequence. Walk its
//!    matched pairs: a gap on the source side is a delete, on the destination
//!    side an add, on both a replace.
//!
//! Line numbers in a [`Change`] are 1-based positions in the source where the
//! edit starts. An add inserts before that source line.
//!
//! An empty source is treated as one blank line that matches nothing, so
//! every non-empty destination yields a single replace of that line.
//!
//! ```
//! use strata::core::diff::{Change, HmDiff};
//!
//! let changes = HmDiff::new(&["a", "b", "b", "c"], &["a", "b", "c"]).changes();
//! assert_eq!(
//!     changes.changes(),
//!     &[Change::Delete { line_number: 3, lines: vec!["b".into()] }]
//! );
//! ```

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;
use thiserror::Error;

/// Errors from applying a change set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    #[error("change at line {line} does not match the source")]
    Mismatch { line: usize },

    #[error("change at line {line} is beyond the end of a {len} line source")]
    OutOfRange { line: usize, len: usize },
}

/// One edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    Add {
        line_number: usize,
        lines: Vec<String>,
    },
    Delete {
        line_number: usize,
        lines: Vec<String>,
    },
    /// `lines` holds the deleted lines followed by the added ones.
    Replace {
        line_number: usize,
        lines: Vec<String>,
        num_deleted: usize,
    },
}

impl Change {
    pub fn line_number(&self) -> usize {
        match self {
            Change::Add { line_number, .. }
            | Change::Delete { line_number, .. }
            | Change::Replace { line_number, .. } => *line_number,
        }
    }

    /// Source lines removed by this change.
    pub fn deleted(&self) -> &[String] {
        match self {
            Change::Add { .. } => &[],
            Change::Delete { lines, .. } => lines,
            Change::Replace {
                lines, num_deleted, ..
            } => &lines[..*num_deleted],
        }
    }

    /// Destination lines introduced by this change.
    pub fn added(&self) -> &[String] {
        match self {
            Change::Add { lines, .. } => lines,
            Change::Delete { .. } => &[],
            Change::Replace {
                lines, num_deleted, ..
            } => &lines[*num_deleted..],
        }
    }
}

/// Ordered, non-overlapping edits turning a source into a destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Apply the edits to `from`, checking every deleted line.
    pub fn apply<S: AsRef<str>>(&self, from: &[S]) -> Result<Vec<String>, DiffError> {
        let mut work: Vec<String> = from.iter().map(|s| s.as_ref().to_string()).collect();
        if work.is_empty() && !self.changes.is_empty() {
            work.push(String::new());
        }

        for change in self.changes.iter().rev() {
            let line = change.line_number();
            let start = line.checked_sub(1).ok_or(DiffError::OutOfRange {
                line,
                len: work.len(),
            })?;
            let deleted = change.deleted();
            let end = start + deleted.len();
            if end > work.len() {
                return Err(DiffError::OutOfRange {
                    line,
                    len: work.len(),
                });
            }
            if work[start..end] != *deleted {
                return Err(DiffError::Mismatch { line });
            }
            work.splice(start..end, change.added().iter().cloned());
        }
        Ok(work)
    }
}

#[derive(Debug, Clone, Copy)]
struct Link {
    from: usize,
    to: usize,
    prev: Option<usize>,
}

/// A computed diff between two line sequences.
#[derive(Debug, Clone)]
pub struct HmDiff {
    from: Vec<String>,
    to: Vec<String>,
    links: Vec<Link>,
    traces: Vec<usize>,
    pairs: Vec<(usize, usize)>,
}

impl HmDiff {
    pub fn new<A: AsRef<str>, B: AsRef<str>>(from: &[A], to: &[B]) -> Self {
        let from: Vec<String> = from.iter().map(|s| s.as_ref().to_string()).collect();
        let to: Vec<String> = to.iter().map(|s| s.as_ref().to_string()).collect();

        // An empty source stands for one blank line that never matches.
        let virtual_source = from.is_empty() && !to.is_empty();
        let m = if virtual_source { 1 } else { from.len() };
        let n = to.len();

        let mut matches: HashMap<&str, Vec<usize>> = HashMap::new();
        for (j, line) in to.iter().enumerate() {
            matches.entry(line.as_str()).or_default().push(j + 1);
        }

        let mut links = vec![
            Link {
                from: 0,
                to: 0,
                prev: None,
            },
            Link {
                from: m + 1,
                to: n + 1,
                prev: None,
            },
        ];
        let mut traces = vec![0usize, 1usize];

        if !virtual_source {
            for (i, line) in from.iter().enumerate() {
                let Some(candidates) = matches.get(line.as_str()) else {
                    continue;
                };
                for &j in candidates.iter().rev() {
                    let k = traces.partition_point(|&t| links[t].to < j) - 1;
                    if links[traces[k + 1]].to == j {
                        continue;
                    }
                    links.push(Link {
                        from: i + 1,
                        to: j,
                        prev: Some(traces[k]),
                    });
                    let link = links.len() - 1;
                    if k + 1 == traces.len() - 1 {
                        traces.insert(k + 1, link);
                    } else {
                        traces[k + 1] = link;
                    }
                }
            }
        }

        let terminal = traces[traces.len() - 1];
        links[terminal].prev = Some(traces[traces.len() - 2]);

        let mut pairs = Vec::new();
        let mut cursor = Some(terminal);
        while let Some(index) = cursor {
            let link = links[index];
            pairs.push((link.from, link.to));
            cursor = link.prev;
        }
        pairs.reverse();

        Self {
            from,
            to,
            links,
            traces,
            pairs,
        }
    }

    /// Candidate traces as `(from, to)` ends, ordered by destination line,
    /// including the origin and terminal.
    pub fn traces(&self) -> Vec<(usize, usize)> {
        self.traces
            .iter()
            .map(|&t| (self.links[t].from, self.links[t].to))
            .collect()
    }

    /// Number of candidate traces, origin and terminal included.
    pub fn trace_count(&self) -> usize {
        self.traces.len()
    }

    /// Matched `(from, to)` line pairs of the longest common subsequence.
    pub fn lcs(&self) -> Vec<(usize, usize)> {
        self.pairs[1..self.pairs.len() - 1].to_vec()
    }

    fn source_line(&self, index: usize) -> String {
        self.from.get(index).cloned().unwrap_or_default()
    }

    pub fn changes(&self) -> ChangeSet {
        let mut changes = Vec::new();
        for window in self.pairs.windows(2) {
            let (a, b) = (window[0], window[1]);
            let deleted: Vec<String> = (a.0..b.0 - 1).map(|i| self.source_line(i)).collect();
            let added: Vec<String> = self.to[a.1..b.1 - 1].to_vec();
            let line_number = a.0 + 1;
            let change = match (deleted.is_empty(), added.is_empty()) {
                (true, true) => continue,
                (false, true) => Change::Delete {
                    line_number,
                    lines: deleted,
                },
                (true, false) => Change::Add {
                    line_number,
                    lines: added,
                },
                (false, false) => {
                    let num_deleted = deleted.len();
                    let mut lines = deleted;
                    lines.extend(added);
                    Change::Replace {
                        line_number,
                        lines,
                        num_deleted,
                    }
                }
            };
            changes.push(change);
        }
        ChangeSet { changes }
    }
}

/// Diff two texts line by line.
///
/// Texts are split with [`str::lines`], so line endings are not compared:
/// `"a"` and `"a\n"` give an empty diff, as do `"a\n"` and `"a\r\n"`.
/// Compare the raw bytes when a final newline matters.
pub fn diff_text(from: &str, to: &str) -> ChangeSet {
    let from: Vec<&str> = from.lines().collect();
    let to: Vec<&str> = to.lines().collect();
    HmDiff::new(&from, &to).changes()
}

/// Render `changes` against their source as an annotated listing.
///
/// Unchanged lines are prefixed with two spaces, deletions with `- ` and
/// additions with `+ `, followed by the source and destination line
/// numbers.
pub fn describe_transformation<A: AsRef<str>>(from: &[A], changes: &ChangeSet) -> String {
    let from: Vec<&str> = if from.is_empty() && !changes.is_empty() {
        vec![""]
    } else {
        from.iter().map(AsRef::as_ref).collect()
    };
    let mut out = String::new();
    let (mut f, mut t) = (0usize, 0usize);
    let unchanged_until = |out: &mut String, f: &mut usize, t: &mut usize, stop: usize| {
        while *f < stop && *f < from.len() {
            let _ = writeln!(out, "  {:>4} {:>4}  {}", *f + 1, *t + 1, from[*f]);
            *f += 1;
            *t += 1;
        }
    };

    for change in changes.changes() {
        unchanged_until(&mut out, &mut f, &mut t, change.line_number() - 1);
        for line in change.deleted() {
            let _ = writeln!(out, "- {:>4} {:>4}  {}", f + 1, "", line);
            f += 1;
        }
        for line in change.added() {
            let _ = writeln!(out, "+ {:>4} {:>4}  {}", "", t + 1, line);
            t += 1;
        }
    }
    unchanged_until(&mut out, &mut f, &mut t, usize::MAX);
    out
}
