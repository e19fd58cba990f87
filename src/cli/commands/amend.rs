//! amend command - Replace a state with the workspace and a new message

use anyhow::Result;

use super::{lock, open_session, resolve_hash, Target};
use crate::cli::Context;
use crate::engine::Stage;
use crate::ui::output;

pub fn amend(ctx: &Context, hash: &str, message: &str, unit: Option<&str>) -> Result<()> {
    let session = open_session(ctx)?;
    let _lock = lock(&session)?;
    let author = session.config().author();
    let mut stage = Stage::load(&session)?;
    let mut target = Target::resolve(&mut stage, unit)?;

    let hash = resolve_hash(target.element(), hash)?;
    match target.commit_update(&session, &hash, &author, message)? {
        Some(new) => output::print(
            format!(
                "Replaced {} with {}",
                hash.short(output::SHORT_HASH),
                new.short(output::SHORT_HASH)
            ),
            ctx.verbosity(),
        ),
        None => output::warn("nothing amended", ctx.verbosity()),
    }
    Ok(())
}
