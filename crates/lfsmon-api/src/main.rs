use anyhow::Result;
use clap::Parser;
use lfsmon_api::cli::{Cli, Command};
use lfsmon_api::{MonitorApi, MonitorConfig};
use lfsmon_core::plugin::PluginQueues;
use lfsmon_core::{Inventory, MemoryStore, MonitorService};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Serve { config } => serve(config).await,
        _ => cli.run().await,
    }
}

async fn serve(config_path: &Path) -> Result<()> {
    let config = MonitorConfig::load_or_default(config_path)?;

    let inventory = match &config.inventory_path {
        Some(path) => {
            let inventory = Inventory::from_file(path)?;
            tracing::info!(
                "Loaded inventory from {}: {} hosts, {} targets",
                path.display(),
                inventory.graph.hosts().count(),
                inventory.graph.targets().count()
            );
            inventory
        }
        None => {
            tracing::warn!("No inventory_path configured, starting with an empty cluster");
            Inventory::default()
        }
    };

    let store = Arc::new(MemoryStore::new(inventory));
    let transport = Arc::new(PluginQueues::new());
    let service = Arc::new(MonitorService::new(
        store,
        transport,
        config.service_settings()?,
    ));

    tracing::info!("Lustre monitor starting");
    MonitorApi::new(service, Arc::new(config)).serve().await
}
