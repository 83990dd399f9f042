use tracing_subscriber::EnvFilter;

/// Install a compact `fmt` subscriber filtered by `RUST_LOG`, `info` by default.
pub fn init() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;

    Ok(())
}
