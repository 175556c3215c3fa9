//! KSail command-line entry point.
//!
//! Thin wiring only: parse a `ksail.yaml` into a [`ksail_spec::ClusterSpec`],
//! construct the injected clients `ksail_engine` needs, and hand off to
//! [`ksail_engine::up`]/[`ksail_engine::down`]. Grounded on
//! `examples/5dlabs-cto/crates/installer/src/main.rs`'s `clap::Parser` +
//! `tracing_subscriber::EnvFilter` shape.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ksail_engine::{down, up, EngineContext, NoopNodeProvisioner};
use ksail_installer::ShellHelmClient;
use ksail_spec::ClusterSpec;

#[derive(Parser)]
#[command(name = "ksail", version, about = "KSail cluster lifecycle engine")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the cluster spec (`ksail.yaml`).
    #[arg(short, long, global = true, default_value = "ksail.yaml")]
    config: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the cluster up: provision nodes, install components, sync GitOps.
    Up,
    /// Tear the cluster down: uninstall components, delete nodes.
    Down,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info,ksail=debug")
    } else {
        EnvFilter::new("warn,ksail=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let spec = load_spec(&cli.config)?;
    let kube_client = kube::Client::try_default()
        .await
        .context("connect to kubernetes")?;

    let ctx = EngineContext {
        kube_client,
        helm: Arc::new(ShellHelmClient),
        provisioner: Arc::new(NoopNodeProvisioner),
        registry_flag_or_env: std::env::var("KSAIL_REGISTRY").ok(),
        readiness_timeout: Duration::from_secs(300),
        reconcile_timeout: Duration::from_secs(300),
    };

    match cli.command {
        Commands::Up => up(&ctx, &spec).await.context("ksail up")?,
        Commands::Down => down(&ctx, &spec).await.context("ksail down")?,
    }

    Ok(())
}

fn load_spec(path: &PathBuf) -> Result<ClusterSpec> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read cluster spec {}", path.display()))?;
    let spec: ClusterSpec =
        serde_yaml::from_str(&raw).with_context(|| format!("parse cluster spec {}", path.display()))?;
    spec.validate().context("invalid cluster spec")?;
    Ok(spec)
}
