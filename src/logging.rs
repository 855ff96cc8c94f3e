//=============================================
// joss/logging.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Tracing setup for hosts and the CLI
// Objective: Install one stderr subscriber so script output on stdout stays
//            clean, with RUST_LOG taking precedence over the default level
//=============================================

use std::io;
use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static INIT: OnceLock<()> = OnceLock::new();

/// Install the global subscriber. Later calls are no-ops; a subscriber set
/// by the host beforehand is left in place.
pub fn init_tracing(verbose: bool) {
    INIT.get_or_init(|| {
        let default_level = if verbose { "debug" } else { "warn" };
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        if verbose {
            if let Ok(directive) = "joss=debug".parse() {
                filter = filter.add_directive(directive);
            }
        }
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(io::stderr)
            .compact()
            .try_init();
    });
}
