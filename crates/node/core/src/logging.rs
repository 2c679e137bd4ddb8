//! Logging configuration for the Boson node.

use eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

use crate::args::LogArgs;

/// Build the log filter from command line arguments.
///
/// The filter is built with the following precedence:
/// 1. If `--quiet` is set, only errors are shown
/// 2. Otherwise, start with `RUST_LOG` if set, or the level implied by `-v`
/// 3. Apply any custom directives from `--log.filter`
pub fn env_filter(args: &LogArgs) -> EnvFilter {
    if args.quiet {
        return EnvFilter::new("error");
    }

    let level = match args.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let Some(custom) = &args.filter {
        for directive in custom.split(',').filter(|d| !d.trim().is_empty()) {
            if let Ok(directive) = directive.trim().parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    filter
}

/// Install the global tracing subscriber.
pub fn init_logging(args: &LogArgs) -> Result<()> {
    let filter = env_filter(args);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = if args.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| eyre!("failed to install tracing subscriber: {err}"))
}
