//! init command - Create a repository in the working directory

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::engine::{Session, SessionError};
use crate::ui::output;

/// Create a repository in the working directory.
///
/// Running it twice is not an error; the existing repository is kept.
pub fn init(ctx: &Context) -> Result<()> {
    let dir = ctx.working_dir()?;
    match Session::init(&dir) {
        Ok(session) => {
            output::print(
                format!(
                    "Initialized empty strata repository in {}",
                    session.paths().repo_dir().display()
                ),
                ctx.verbosity(),
            );
            Ok(())
        }
        Err(SessionError::AlreadyInitialized(path)) => {
            output::print(
                format!("Strata is already initialized in {}", path.display()),
                ctx.verbosity(),
            );
            Ok(())
        }
        Err(err) => Err(err).context("failed to initialize repository"),
    }
}
