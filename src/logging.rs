// src/logging.rs
// =============================================================================
// Sets up `tracing` for the CLI.
//
// Logs go to stderr so that stdout stays clean for the table or the JSON
// report (`link-health scan ... --json | jq` must keep working).
//
// RUST_LOG controls the level, e.g.
//   RUST_LOG=debug                       everything
//   RUST_LOG=link_health=debug,reqwest=warn
// =============================================================================

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "info,link_health=info";

pub fn init_logging() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .try_init()
        .map_err(|e| anyhow!("logging already initialized: {}", e))
}
