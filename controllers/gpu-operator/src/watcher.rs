//! Kubernetes resource watchers.
//!
//! Runs a `kube_runtime::Controller` over ClusterPolicy. Besides the policy
//! itself, a pass is triggered by changes to the operand workloads the
//! policy owns and by Node events whose GPU label is missing or outdated.

use crate::error::ControllerError;
use crate::node_labels::node_event_is_relevant;
use crate::reconciler::Reconciler;
use crds::ClusterPolicy;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::{Api, Client};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{Controller, watcher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

async fn reconcile(policy: Arc<ClusterPolicy>, reconciler: Arc<Reconciler>) -> Result<Action, ControllerError> {
    reconciler.reconcile(&policy).await
}

fn error_policy(policy: Arc<ClusterPolicy>, error: &ControllerError, reconciler: Arc<Reconciler>) -> Action {
    reconciler.error_action(&policy, error)
}

/// Watches ClusterPolicies and everything that can change their outcome.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    client: Client,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(reconciler: Arc<Reconciler>, client: Client) -> Self {
        Self { reconciler, client }
    }

    /// Runs until SIGTERM/SIGINT or a fatal reconcile error.
    pub async fn watch_cluster_policies(&self) -> Result<(), ControllerError> {
        info!("Starting ClusterPolicy watcher");

        let policies: Api<ClusterPolicy> = Api::all(self.client.clone());
        let daemon_sets: Api<DaemonSet> = Api::all(self.client.clone());
        let deployments: Api<Deployment> = Api::all(self.client.clone());
        let pods: Api<Pod> = Api::all(self.client.clone());
        let nodes: Api<Node> = Api::all(self.client.clone());

        let controller = Controller::new(policies, watcher::Config::default());
        let store = controller.store();

        // Passes share one state machine, so one at a time
        let controller_config = ControllerConfig::default()
            .debounce(Duration::from_secs(1))
            .concurrency(1);

        controller
            .owns(daemon_sets, watcher::Config::default())
            .owns(deployments, watcher::Config::default())
            .owns(pods, watcher::Config::default())
            .watches(nodes, watcher::Config::default(), move |node| {
                if !node_event_is_relevant(&node) {
                    return Vec::new();
                }
                store
                    .state()
                    .iter()
                    .map(|policy| ObjectRef::from_obj(policy.as_ref()))
                    .collect()
            })
            .with_config(controller_config)
            .graceful_shutdown_on(self.reconciler.shutdown_signal())
            .shutdown_on_signal()
            .run(reconcile, error_policy, Arc::clone(&self.reconciler))
            .for_each(|res| async move {
                match res {
                    Ok((obj, action)) => debug!("Reconciled ClusterPolicy {}: {:?}", obj.name, action),
                    Err(e) => error!("ClusterPolicy controller error: {}", e),
                }
            })
            .await;

        info!("ClusterPolicy watcher stopped");
        Ok(())
    }
}
