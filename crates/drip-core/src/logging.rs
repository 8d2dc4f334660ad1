//! Tracing subscriber initialization.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG` when set, otherwise `info` for drip crates
/// and `warn` for everything else. Safe to call once at process startup;
/// subsequent calls are ignored (useful when tests race to initialize).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,drip=info,drip_session=info,drip_dispatch=info,drip_server=info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();
}
