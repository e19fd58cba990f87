//! logging
//!
//! Installs the global `tracing` subscriber.
//!
//! # Level resolution
//!
//! Highest precedence first:
//! 1. `STRATA_LOG` (any `EnvFilter` directive, e.g. `strata::engine=debug`)
//! 2. `--debug` selects `debug`, `--quiet` selects `warn`
//! 3. `log.level` from the global config
//! 4. `warn`
//!
//! Events go to stderr so that command output on stdout stays parseable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable holding a filter directive.
pub const ENV_VAR: &str = "STRATA_LOG";

/// Pick the base level from CLI flags and the configured default.
pub fn resolve_level<'a>(debug: bool, quiet: bool, configured: &'a str) -> &'a str {
    if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        configured
    }
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(ENV_VAR)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the subscriber.
///
/// A second call is a no-op; the first subscriber stays in place.
pub fn init(level: &str, json: bool) {
    let base = Registry::default().with(build_filter(level));

    let result = if json {
        base.with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .try_init()
    } else {
        base.with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
    };

    if result.is_ok() {
        tracing::debug!(level, json, "logging initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_wins() {
        assert_eq!(resolve_level(true, true, "error"), "debug");
    }

    #[test]
    fn quiet_flag_selects_warn() {
        assert_eq!(resolve_level(false, true, "trace"), "warn");
    }

    #[test]
    fn configured_level_is_default() {
        assert_eq!(resolve_level(false, false, "info"), "info");
    }

    #[test]
    fn init_twice_is_harmless() {
        init("warn", false);
        init("debug", true);
    }
}
