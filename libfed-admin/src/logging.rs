//! `tracing-subscriber` setup, replacing the reference design's colored
//! terminal logging (`spec.md` §1 lists this as out of scope for the core
//! protocol, but still carried here as ambient plumbing).
use tracing_subscriber::EnvFilter;

use libfed_base::{err, Result};

/// Installs a global `fmt` subscriber filtered by `directive` (an
/// `EnvFilter` spec, e.g. `"info"` or `"libfed=debug,libfed_election=trace"`).
pub fn init_logging(directive: &str) -> Result<()> {
    let filter = EnvFilter::try_new(directive)
        .map_err(|e| err(format!("invalid log-level directive {directive:?}: {e}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| err(format!("failed to install tracing subscriber: {e}")))
}
