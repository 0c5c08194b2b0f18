//! Diagnostic logging via `tracing`, written to stderr.
//!
//! `DEVX_LOG` takes any `EnvFilter` directive (e.g. `devx=debug`) and wins
//! over the `-v` count given on the command line.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "DEVX_LOG";

/// Level used when `DEVX_LOG` is unset.
pub fn default_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

fn build_env_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level(verbosity)))
}

/// Install the global subscriber. Calling it twice is a no-op.
pub fn init(verbosity: u8) {
    let _ = tracing_subscriber::registry()
        .with(build_env_filter(verbosity))
        .with(
            fmt::layer()
                .with_target(verbosity > 1)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
