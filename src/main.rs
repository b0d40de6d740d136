//! Registry GC - mark and sweep garbage collection for registry storage
//!
//! The main entry point for the `registry-gc` binary.

use anyhow::{Context, Result};
use registry_gc::cli::{Args, Runner};
use registry_gc::logging::Logger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse_args();
    let config = match args.into_config() {
        Ok(config) => config,
        Err(err) => {
            Logger::new(false).error(&err.to_string());
            std::process::exit(2);
        }
    };

    Runner::new(config)
        .run()
        .await
        .context("garbage collection failed")?;
    Ok(())
}
