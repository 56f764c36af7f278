//! GPU Operator Controller
//!
//! Installs the NVIDIA GPU stack described by a cluster-scoped ClusterPolicy:
//! driver, container toolkit, device plugin, device plugin validation,
//! monitoring and GPU feature discovery, in that order. Also keeps the
//! `nvidia.com/gpu.present` node label in line with Node Feature Discovery.

mod backoff;
mod config;
mod controller;
mod error;
mod installer;
mod manifests;
mod node_labels;
mod reconciler;
mod state;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting GPU Operator Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Assets: {}", config.assets_dir.display());
    info!("  Operand namespace: {}", config.operand_namespace);
    info!("  Field manager: {}", config.field_manager);
    info!("  Retry delay: {:?}", config.retry_delay);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
