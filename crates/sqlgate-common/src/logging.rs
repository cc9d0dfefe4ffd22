//! Logging bootstrap.
//!
//! All workspace crates log through the `log` facade with the named targets
//! from [crate::constants]. This module routes those records into a
//! `tracing-subscriber` registry so deployments configure verbosity with a
//! single env var.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Env var controlling the log filter, e.g. `SQLGATE_LOG=sampling=debug,info`.
pub const LOG_ENV_VAR: &str = "SQLGATE_LOG";

static INIT: Once = Once::new();

/// Initialize the global subscriber. Safe to call more than once; only the
/// first call has any effect.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = tracing_log::LogTracer::init();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
