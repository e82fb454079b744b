//! Log output for the `dsbond-intake` binary.
//!
//! Library code only emits `tracing` events; this installs the subscriber
//! that prints them. Logs go to stderr so stdout stays reserved for
//! responses. The filter comes from `DSBOND_LOG` (e.g. `DSBOND_LOG=debug`)
//! and defaults to `info`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::defaults::LOG_ENV;

/// Install the global subscriber.
///
/// `verbose` raises the default level to `debug` when `DSBOND_LOG` is unset.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| default_level.into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
