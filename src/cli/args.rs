//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// Strata - content-addressed version control for workspace units
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if strata was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a repository in the current directory
    #[command(
        name = "init",
        long_about = "Create a repository in the current directory.\n\n\
            Writes a `.strata` directory holding the object store, refs and \
            the repository configuration. The workspace itself is not touched."
    )]
    Init,

    /// Show what changed since the current state
    #[command(
        name = "status",
        after_help = "\
WORKFLOW EXAMPLES:
    # Changes across the whole workspace (or the focused unit)
    strata status

    # Changes inside one unit, as JSON
    strata status --unit docs --json"
    )]
    Status {
        /// Inspect this unit instead of the stage
        #[arg(long)]
        unit: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record the workspace as a new state
    #[command(
        name = "commit",
        long_about = "Record the workspace as a new state.\n\n\
            Commits on top of the current state. If the head has moved on \
            since, it is kept as a second parent. Nothing is recorded when \
            the workspace matches the current state, unless `force_commit` \
            is set in the repository configuration.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Commit the stage (or the focused unit)
    strata commit -m \"describe the change\"

    # Commit one unit
    strata commit --unit docs -m \"update docs\"

    # Commit every managed unit, then the stage
    strata commit --all -m \"release\"

    # Record a placeholder without content
    strata commit --temporary -m \"wip\""
    )]
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Commit this unit instead of the stage
        #[arg(long, conflicts_with = "all")]
        unit: Option<String>,

        /// Commit every managed unit, then the stage
        #[arg(long)]
        all: bool,

        /// Record a state without content
        #[arg(long, conflicts_with = "all")]
        temporary: bool,
    },

    /// Restore an earlier state into the workspace
    #[command(
        name = "revert",
        group(ArgGroup::new("target").required(true).args(["hash", "relative", "path"])),
        long_about = "Restore an earlier state into the workspace.\n\n\
            The target is given by hash (a unique prefix is enough), by one \
            relative step from the current state, or by a path of steps from \
            the head. A path is written `*<branch>+<distance>...`, where \
            branch 1 is the first parent.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Go back to a state by hash
    strata revert 3f2a9c

    # Two states back along the first parent
    strata revert --relative 1 2

    # Undo the last relative move
    strata revert --relative 1 -1

    # Second parent of the head, then one step back
    strata revert --path '*2+1*1+1'"
    )]
    Revert {
        /// Target state hash or unique prefix
        hash: Option<String>,

        /// Branch and distance from the current state
        #[arg(
            long,
            num_args = 2,
            value_names = ["BRANCH", "DISTANCE"],
            allow_negative_numbers = true
        )]
        relative: Option<Vec<i64>>,

        /// Path of steps from the head
        #[arg(long)]
        path: Option<String>,

        /// Search breadth first instead of the configured order
        #[arg(long)]
        bfs: bool,

        /// Revert this unit instead of the stage
        #[arg(long)]
        unit: Option<String>,
    },

    /// Show the mainline history
    #[command(name = "log")]
    Log {
        /// Show this unit instead of the stage
        #[arg(long)]
        unit: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare a file with its recorded version
    #[command(
        name = "diff",
        long_about = "Compare a workspace file with the version recorded in the \
            current state, line by line."
    )]
    Diff {
        /// File to compare
        path: PathBuf,

        /// Resolve the file inside this unit
        #[arg(long)]
        unit: Option<String>,

        /// Output the change set as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start versioning a subdirectory as a logical unit
    #[command(name = "manage")]
    Manage {
        /// Unit (directory) name
        name: String,
    },

    /// Stop managing a logical unit
    #[command(
        name = "ignore",
        long_about = "Stop managing a logical unit.\n\n\
            The unit's directory and history are kept; `strata manage` picks \
            the history up again."
    )]
    Ignore {
        /// Unit name
        name: String,
    },

    /// Focus a unit so commands act on it by default
    #[command(name = "focus")]
    Focus {
        /// Unit name; omit to show the focused unit
        #[arg(conflicts_with = "clear")]
        name: Option<String>,

        /// Clear the focus
        #[arg(long)]
        clear: bool,
    },

    /// List managed units
    #[command(name = "units")]
    Units {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Insert a state between two existing states
    #[command(
        name = "insert",
        long_about = "Insert a state between two existing states.\n\n\
            The workspace is recorded as a new state after `--prev` and added \
            as an extra parent of `--next`. The workspace is then restored to \
            the current state."
    )]
    Insert {
        /// State the new one follows
        #[arg(long)]
        prev: String,

        /// State that gains the new one as a parent
        #[arg(long)]
        next: String,

        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Insert into this unit instead of the stage
        #[arg(long)]
        unit: Option<String>,
    },

    /// Replace a state with the workspace and a new message
    #[command(
        name = "amend",
        long_about = "Replace a state with the workspace and a new message.\n\n\
            The replacement keeps the original parents. The original state \
            stays in the store; every link to it now leads to the replacement."
    )]
    Amend {
        /// State to replace
        hash: String,

        /// New commit message
        #[arg(short, long)]
        message: String,

        /// Amend in this unit instead of the stage
        #[arg(long)]
        unit: Option<String>,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    strata completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    strata completion zsh >> ~/.zshrc

    # Fish
    strata completion fish > ~/.config/fish/completions/strata.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn revert_relative_accepts_negative_distance() {
        let cli = Cli::try_parse_from(["strata", "revert", "--relative", "1", "-1"]).unwrap();
        match cli.command {
            Command::Revert { relative, .. } => assert_eq!(relative, Some(vec![1, -1])),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn revert_requires_a_target() {
        assert!(Cli::try_parse_from(["strata", "revert"]).is_err());
        assert!(Cli::try_parse_from(["strata", "revert", "abc", "--path", "*1+1"]).is_err());
    }

    #[test]
    fn commit_all_conflicts_with_unit() {
        assert!(
            Cli::try_parse_from(["strata", "commit", "-m", "x", "--all", "--unit", "docs"]).is_err()
        );
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["strata", "status", "--debug", "-q"]).unwrap();
        assert!(cli.debug);
        assert!(cli.quiet);
    }
}
