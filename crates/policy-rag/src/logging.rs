//! Tracing subscriber setup shared by the binaries
//!
//! Logs go to stderr so the ingest binary can print its report on stdout.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Error, Result};

/// Filter used when neither `RUST_LOG` nor an override is set
pub const DEFAULT_FILTER: &str = "policy_rag=info,tower_http=info";

/// Initialize the global tracing subscriber
///
/// `level` overrides `RUST_LOG`; both accept full `EnvFilter` directives.
pub fn init_tracing(level: Option<&str>) -> Result<()> {
    let env_filter = match level {
        Some(directives) => EnvFilter::try_new(directives),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER)),
    }
    .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to init logging: {}", e)))
}
