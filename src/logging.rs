use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialize console logging for binaries and tests embedding the engine.
///
/// `RUST_LOG` takes precedence over the passed default filter.
pub fn init_logging(default_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("logging init failed: {e}"))?;

    Ok(())
}
