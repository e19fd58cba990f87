//! commit command - Record the workspace as a new state

use anyhow::Result;

use super::{lock, open_session, Target};
use crate::cli::Context;
use crate::engine::Stage;
use crate::ui::output;

/// Record the workspace as a new state.
///
/// # Arguments
///
/// * `ctx` - Execution context
/// * `message` - Commit message
/// * `unit` - Commit this unit instead of the stage or focused unit
/// * `all` - Commit every managed unit, then the stage
/// * `temporary` - Record a state without content
pub fn commit(
    ctx: &Context,
    message: &str,
    unit: Option<&str>,
    all: bool,
    temporary: bool,
) -> Result<()> {
    let session = open_session(ctx)?;
    let _lock = lock(&session)?;
    let author = session.config().author();
    let mut stage = Stage::load(&session)?;
    let verbosity = ctx.verbosity();

    if all {
        let outcome = stage.commit_all(&session, &author, message)?;
        for (name, hash) in &outcome.units {
            match hash {
                Some(hash) => output::print(
                    format!("Committed unit '{}' {}", name, hash.short(output::SHORT_HASH)),
                    verbosity,
                ),
                None => output::print(format!("Unit '{}' unchanged", name), verbosity),
            }
        }
        match &outcome.stage {
            Some(hash) => output::print(
                format!("Committed stage {}", hash.short(output::SHORT_HASH)),
                verbosity,
            ),
            None => output::warn("nothing to commit on the stage", verbosity),
        }
        return Ok(());
    }

    let mut target = Target::resolve(&mut stage, unit)?;
    let hash = if temporary {
        target.commit_temporary(&session, &author, message)?
    } else {
        target.commit_valid_path(&session, &author, message)?
    };
    match hash {
        Some(hash) => output::print(
            format!(
                "Committed {} {}",
                target.label(),
                hash.short(output::SHORT_HASH)
            ),
            verbosity,
        ),
        None => output::warn(
            format!("nothing to commit, {} matches the current state", target.label()),
            verbosity,
        ),
    }
    Ok(())
}
