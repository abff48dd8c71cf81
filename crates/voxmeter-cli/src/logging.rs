//! Tracing subscriber setup from the `logging` config section.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use voxmeter_core::config::LoggingConfig;

/// Base filter directive: `--verbose` wins over the configured level.
pub fn base_level(config: &LoggingConfig, verbose: bool) -> &str {
    if verbose {
        "debug"
    } else {
        config.level.as_deref().unwrap_or("info")
    }
}

/// Build the env filter. `RUST_LOG` replaces the base level; per-target
/// filters from config are always layered on top.
pub fn build_filter(config: &LoggingConfig, verbose: bool) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(base_level(config, verbose)));
    for directive in &config.filters {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}

/// Install the global subscriber.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = build_filter(config, verbose)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match (config.format.as_str(), config.output.as_str()) {
        ("json", "stdout") => builder.json().with_writer(std::io::stdout).try_init(),
        ("json", _) => builder.json().with_writer(std::io::stderr).try_init(),
        (_, "stdout") => builder.with_writer(std::io::stdout).try_init(),
        _ => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}
