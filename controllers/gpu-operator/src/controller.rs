//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the cluster
//! client, the reconciler and the ClusterPolicy watcher together.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use cluster_client::KubeClusterClient;
use kube::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for ClusterPolicy management.
#[derive(Debug)]
pub struct Controller {
    reconciler: Arc<Reconciler>,
    cluster_policy_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts watching.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing GPU Operator Controller");

        let kube_client = Client::try_default()
            .await
            .map_err(|e| ControllerError::Client(e.into()))?;
        let cluster_client = KubeClusterClient::new(kube_client.clone(), config.field_manager.clone());

        let reconciler = Arc::new(Reconciler::new(cluster_client, config));
        let watcher = Watcher::new(Arc::clone(&reconciler), kube_client);

        let cluster_policy_watcher = tokio::spawn(async move { watcher.watch_cluster_policies().await });

        Ok(Self {
            reconciler,
            cluster_policy_watcher,
        })
    }

    /// Runs the controller until shutdown.
    ///
    /// Returns an error when the watcher died or a fatal reconcile error
    /// stopped it.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("GPU Operator Controller running");

        self.cluster_policy_watcher
            .await
            .map_err(|e| ControllerError::Watch(format!("ClusterPolicy watcher panicked: {e}")))?
            .map_err(|e| ControllerError::Watch(format!("ClusterPolicy watcher error: {e}")))?;

        if let Some(reason) = self.reconciler.fatal_error() {
            return Err(ControllerError::Manifest(reason));
        }
        Ok(())
    }
}
