//! revert command - Restore an earlier state into the workspace

use anyhow::{bail, Context as _, Result};

use super::{lock, open_session, resolve_hash, Target};
use crate::cli::Context;
use crate::core::history::Path as Route;
use crate::engine::Stage;
use crate::ui::output;

/// How the target state is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertTo {
    /// By hash or unique prefix.
    Hash { hash: String, bfs: bool },
    /// One step from the current state.
    Relative { branch: usize, distance: i64 },
    /// Steps from the head.
    Path(String),
}

impl RevertTo {
    /// Build a relative target from `[branch, distance]`.
    pub fn relative(values: &[i64]) -> Result<Self> {
        let [branch, distance] = values else {
            bail!("--relative takes a branch and a distance");
        };
        let branch = usize::try_from(*branch)
            .ok()
            .filter(|b| *b >= 1)
            .with_context(|| format!("branch must be 1 or more, got {}", branch))?;
        Ok(RevertTo::Relative {
            branch,
            distance: *distance,
        })
    }
}

/// Restore an earlier state into the workspace.
pub fn revert(ctx: &Context, how: RevertTo, unit: Option<&str>) -> Result<()> {
    let session = open_session(ctx)?;
    let _lock = lock(&session)?;
    let mut stage = Stage::load(&session)?;
    let mut target = Target::resolve(&mut stage, unit)?;

    let (reverted, wanted) = match &how {
        RevertTo::Hash { hash, bfs } => {
            let hash = resolve_hash(target.element(), hash)?;
            let depth_first = !bfs && session.depth_first();
            let ok = target.revert_hash(&session, &hash, depth_first)?;
            (ok, hash.short(output::SHORT_HASH).to_string())
        }
        RevertTo::Relative { branch, distance } => {
            let ok = target.revert_relative(&session, *branch, *distance)?;
            (ok, format!("*{}{:+}", branch, distance))
        }
        RevertTo::Path(text) => {
            let route: Route = text.parse()?;
            let ok = target.revert_path(&session, &route)?;
            (ok, route.to_string())
        }
    };

    if !reverted {
        bail!("could not revert {} to {}", target.label(), wanted);
    }
    if let Some(current) = target.element().current() {
        output::print(
            format!(
                "Reverted {} to {} ({})",
                target.label(),
                current.fingerprint().short(output::SHORT_HASH),
                current.route()
            ),
            ctx.verbosity(),
        );
    }
    Ok(())
}
