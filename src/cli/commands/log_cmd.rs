//! log command - Show the mainline history

use anyhow::Result;

use super::{open_session, Target};
use crate::cli::Context;
use crate::engine::Stage;
use crate::ui::output::{self, StateView};

/// Show the mainline history, newest first.
///
/// The current state is marked with `*`.
pub fn log(ctx: &Context, unit: Option<&str>, json: bool) -> Result<()> {
    let session = open_session(ctx)?;
    let mut stage = Stage::load(&session)?;
    let target = Target::resolve(&mut stage, unit)?;
    let element = target.element();
    let states = element.log();

    if json {
        let views: Vec<StateView> = states.iter().map(StateView::from).collect();
        return output::json(&views);
    }

    if states.is_empty() {
        output::print(format!("No states recorded for {}", target.label()), ctx.verbosity());
        return Ok(());
    }
    let current = element.current().map(|c| c.fingerprint());
    for state in &states {
        let marker = if Some(state.fingerprint()) == current {
            "*"
        } else {
            " "
        };
        output::print(
            format!("{} {}", marker, output::format_state(state)),
            ctx.verbosity(),
        );
    }
    Ok(())
}
