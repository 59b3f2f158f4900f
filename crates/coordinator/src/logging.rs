use tracing_subscriber::EnvFilter;

use crate::{Error, Result};

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` (e.g. `"info"` or
/// `"replication_outgoing=debug,info"`) is used.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| Error::Tracing(e.to_string()))
}
