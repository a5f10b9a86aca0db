//! Serve a mock spec over HTTP

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use neonmock_harness::{HarnessConfig, MockServer, MockSpec};

#[derive(Args)]
pub struct ServeArgs {
    /// Mock spec (YAML)
    #[arg(short, long)]
    pub spec: PathBuf,

    /// Harness configuration file (TOML)
    #[arg(short, long, env = "NEONMOCK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address, overrides the configuration
    #[arg(short, long)]
    pub listen: Option<String>,
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    config.apply_env()?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    let spec = MockSpec::from_file(&args.spec)
        .with_context(|| format!("loading spec {}", args.spec.display()))?;
    info!(
        "Loaded spec '{}' ({} statement(s), {} seed row(s))",
        spec.name,
        spec.queries.len(),
        spec.seed.len()
    );
    let scenario = spec.into_scenario(config.clock.build())?;

    let server = MockServer::bind(&config, Arc::new(scenario)).await?;
    server
        .serve_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl-C, shutting down");
        })
        .await?;
    Ok(())
}
