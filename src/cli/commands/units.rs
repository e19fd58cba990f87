//! manage, ignore, focus and units commands - Logical unit management

use anyhow::Result;
use serde_json::json;

use super::{lock, open_session};
use crate::cli::Context;
use crate::engine::Stage;
use crate::ui::output;

/// Start versioning a subdirectory as a logical unit.
pub fn manage(ctx: &Context, name: &str) -> Result<()> {
    let session = open_session(ctx)?;
    let _lock = lock(&session)?;
    let mut stage = Stage::load(&session)?;
    if stage.manage(&session, name)? {
        output::print(format!("Managing unit '{}'", name), ctx.verbosity());
    } else {
        output::print(format!("Unit '{}' is already managed", name), ctx.verbosity());
    }
    Ok(())
}

/// Stop managing a logical unit.
pub fn ignore(ctx: &Context, name: &str) -> Result<()> {
    let session = open_session(ctx)?;
    let _lock = lock(&session)?;
    let mut stage = Stage::load(&session)?;
    if stage.ignore(&session, name)? {
        output::print(format!("No longer managing unit '{}'", name), ctx.verbosity());
    } else {
        output::warn(format!("unit '{}' is not managed", name), ctx.verbosity());
    }
    Ok(())
}

/// Focus a unit, clear the focus, or show it.
pub fn focus(ctx: &Context, name: Option<&str>, clear: bool) -> Result<()> {
    let session = open_session(ctx)?;
    let mut stage = Stage::load(&session)?;
    let verbosity = ctx.verbosity();

    if clear {
        let _lock = lock(&session)?;
        stage.unfocus(&session)?;
        output::print("Focus cleared", verbosity);
    } else if let Some(name) = name {
        let _lock = lock(&session)?;
        stage.focus(&session, name)?;
        output::print(format!("Focused unit '{}'", name), verbosity);
    } else {
        match stage.focused() {
            Some(unit) => output::print(unit.name(), verbosity),
            None => output::print("No unit focused", verbosity),
        }
    }
    Ok(())
}

/// List managed units.
pub fn units(ctx: &Context, json: bool) -> Result<()> {
    let session = open_session(ctx)?;
    let stage = Stage::load(&session)?;
    let focused = stage.focused().map(|u| u.name().clone());

    if json {
        let list: Vec<_> = stage
            .units()
            .map(|unit| {
                json!({
                    "name": unit.name(),
                    "head": unit.head(),
                    "current": unit.current().map(|c| c.fingerprint()),
                    "focused": Some(unit.name()) == focused.as_ref(),
                })
            })
            .collect();
        return output::json(&list);
    }

    let lines: Vec<String> = stage
        .units()
        .map(|unit| {
            let marker = if Some(unit.name()) == focused.as_ref() {
                "*"
            } else {
                " "
            };
            let head = unit
                .head()
                .map(|h| h.short(output::SHORT_HASH).to_string())
                .unwrap_or_else(|| "(no commits)".to_string());
            format!("{} {} {}", marker, unit.name(), head)
        })
        .collect();
    if lines.is_empty() {
        output::print("No managed units", ctx.verbosity());
    } else {
        output::print(output::format_list(&lines, ""), ctx.verbosity());
    }
    Ok(())
}
