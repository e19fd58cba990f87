//! diff command - Compare a file with its recorded version

use std::path::Path;

use anyhow::{bail, Context as _, Result};

use super::{open_session, Target};
use crate::cli::Context;
use crate::core::diff::{describe_transformation, HmDiff};
use crate::engine::Stage;
use crate::ui::output;

/// Compare a workspace file with the version recorded in the current state.
pub fn diff(ctx: &Context, path: &Path, unit: Option<&str>, json: bool) -> Result<()> {
    let session = open_session(ctx)?;
    let mut stage = Stage::load(&session)?;
    let target = Target::resolve(&mut stage, unit)?;
    let element = target.element();

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        ctx.working_dir()?.join(path)
    };
    let Ok(relative) = absolute.strip_prefix(element.root()) else {
        bail!(
            "'{}' is outside {} ({})",
            path.display(),
            target.label(),
            element.root().display()
        );
    };

    let recorded = element
        .recorded_lines(&session, relative)?
        .unwrap_or_default();
    let workspace: Vec<String> = if absolute.is_file() {
        std::fs::read_to_string(&absolute)
            .with_context(|| format!("cannot read {}", absolute.display()))?
            .lines()
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };

    let changes = HmDiff::new(&recorded, &workspace).changes();
    if json {
        return output::json(&changes);
    }
    if changes.is_empty() {
        output::print("no differences", ctx.verbosity());
    } else {
        output::print(
            describe_transformation(&recorded, &changes).trim_end(),
            ctx.verbosity(),
        );
    }
    Ok(())
}
