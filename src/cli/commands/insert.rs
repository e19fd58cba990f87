//! insert command - Insert a state between two existing states

use anyhow::Result;

use super::{lock, open_session, resolve_hash, Target};
use crate::cli::Context;
use crate::engine::Stage;
use crate::ui::output;

/// Record the workspace after `prev` and graft it onto `next`.
pub fn insert(
    ctx: &Context,
    prev: &str,
    next: &str,
    message: &str,
    unit: Option<&str>,
) -> Result<()> {
    let session = open_session(ctx)?;
    let _lock = lock(&session)?;
    let author = session.config().author();
    let mut stage = Stage::load(&session)?;
    let mut target = Target::resolve(&mut stage, unit)?;

    let prev = resolve_hash(target.element(), prev)?;
    let next = resolve_hash(target.element(), next)?;
    match target.commit_insert(&session, &author, message, &prev, &next)? {
        Some(hash) => output::print(
            format!(
                "Inserted {} between {} and {}",
                hash.short(output::SHORT_HASH),
                prev.short(output::SHORT_HASH),
                next.short(output::SHORT_HASH)
            ),
            ctx.verbosity(),
        ),
        None => output::warn("nothing inserted", ctx.verbosity()),
    }
    Ok(())
}
