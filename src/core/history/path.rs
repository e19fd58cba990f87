//! core::history::path
//!
//! Routes through the state graph.
//!
//! A [`Step`] is a `(branch, distance)` pair: take parent number `branch`
//! (1-indexed) for the first hop, then follow first parents for the
//! remaining `distance - 1` hops. A [`Path`] is a sequence of steps read
//! left to right from a head toward an ancestor.
//!
//! # String form
//!
//! ```text
//! *1+3*2+1      three mainline hops, then one hop through the second parent
//! *1+0          no movement
//! ```
//!
//! ```
//! use strata::core::history::{Path, Step};
//!
//! let path: Path = "*2+3".parse().unwrap();
//! assert_eq!(path.steps(), &[Step::new(2, 3).unwrap()]);
//! assert!("*1+0".parse::<Path>().unwrap().is_empty());
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors from building or parsing routes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("branch numbers start at 1")]
    ZeroBranch,

    #[error("malformed path '{0}'")]
    Malformed(String),
}

/// One run of hops along a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Step {
    branch: usize,
    distance: i64,
}

impl Step {
    pub fn new(branch: usize, distance: i64) -> Result<Self, PathError> {
        if branch == 0 {
            return Err(PathError::ZeroBranch);
        }
        Ok(Self { branch, distance })
    }

    pub fn branch(&self) -> usize {
        self.branch
    }

    pub fn distance(&self) -> i64 {
        self.distance
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "*{}{:+}", self.branch, self.distance)
    }
}

impl FromStr for Step {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || PathError::Malformed(s.to_string());
        let body = s.strip_prefix('*').ok_or_else(malformed)?;
        let sign = body.find(['+', '-']).ok_or_else(malformed)?;
        let branch: usize = body[..sign].parse().map_err(|_| malformed())?;
        let distance: i64 = body[sign..].parse().map_err(|_| malformed())?;
        Step::new(branch, distance)
    }
}

/// An ordered sequence of steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    steps: Vec<Step>,
}

impl Path {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// True when the path describes no movement.
    pub fn is_empty(&self) -> bool {
        self.steps.iter().all(|s| s.distance == 0)
    }

    /// Total hops of a route. Negative steps count as zero.
    pub fn hops(&self) -> u64 {
        self.steps
            .iter()
            .map(|s| u64::try_from(s.distance).unwrap_or(0))
            .sum()
    }

    /// The route after one more hop through parent `branch`.
    ///
    /// Mainline hops lengthen the last step. A step that has not moved yet
    /// is taken over by the new branch.
    pub fn extended(&self, branch: usize) -> Path {
        let mut steps = self.steps.clone();
        match steps.last_mut() {
            Some(last) if last.distance == 0 => {
                *last = Step { branch, distance: 1 };
            }
            Some(last) if branch == 1 && last.distance > 0 => {
                last.distance += 1;
            }
            _ => steps.push(Step { branch, distance: 1 }),
        }
        Path { steps }
    }

    /// The route with its last `n` hops removed, or `None` if it is shorter.
    pub fn retreat(&self, n: u64) -> Option<Path> {
        let mut steps = self.steps.clone();
        let mut remaining = n;
        while remaining > 0 {
            let last = steps.last_mut()?;
            let distance = u64::try_from(last.distance).ok()?;
            if distance > remaining {
                last.distance -= remaining as i64;
                remaining = 0;
            } else {
                remaining -= distance;
                steps.pop();
            }
        }
        Some(Path { steps })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("*1+0");
        }
        for step in &self.steps {
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Path::default());
        }
        if !s.starts_with('*') {
            return Err(PathError::Malformed(s.to_string()));
        }
        s.split('*')
            .skip(1)
            .map(|part| format!("*{part}").parse())
            .collect::<Result<Vec<Step>, _>>()
            .map(Path::new)
    }
}
