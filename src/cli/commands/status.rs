//! status command - Show what changed since the current state

use anyhow::Result;
use serde_json::json;

use super::{open_session, Target};
use crate::cli::Context;
use crate::core::types::Fingerprint;
use crate::engine::Stage;
use crate::ui::output;

/// Show what changed since the current state.
pub fn status(ctx: &Context, unit: Option<&str>, json: bool) -> Result<()> {
    let session = open_session(ctx)?;
    let mut stage = Stage::load(&session)?;
    let mut target = Target::resolve(&mut stage, unit)?;
    let changes = target.changes(&session)?;
    let element = target.element();
    let head = element.head();
    let current = element.current().map(|c| c.fingerprint());

    if json {
        return output::json(&json!({
            "target": target.label(),
            "head": head,
            "current": current,
            "route": element.current().map(|c| c.route().to_string()),
            "added": changes.added,
            "removed": changes.removed,
            "modified": changes.modified,
        }));
    }

    let verbosity = ctx.verbosity();
    let short = |h: Option<&Fingerprint>| {
        h.map(|h| h.short(output::SHORT_HASH).to_string())
            .unwrap_or_else(|| "(none)".to_string())
    };
    output::print(format!("On {}", target.label()), verbosity);
    output::print(format!("head:    {}", short(head)), verbosity);
    output::print(format!("current: {}", short(current)), verbosity);
    if let Some(state) = element.current() {
        if !state.route().is_empty() {
            output::print(format!("route:   {}", state.route()), verbosity);
        }
    }
    if changes.is_empty() {
        output::print("nothing changed", verbosity);
    } else {
        output::print(output::format_changes(&changes), verbosity);
    }
    Ok(())
}
