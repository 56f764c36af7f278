//! Kubernetes-backed cluster client
//!
//! Implements `ClusterClientTrait` on top of a `kube::Client`.

use crate::error::ClusterClientError;
use crate::models::{cluster_version_resource, ClusterVersionStatus, ManagedObject, CLUSTER_VERSION_NAME};
use crate::cluster_trait::ClusterClientTrait;
use crds::{ClusterPolicy, State};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::core::DynamicObject;
use kube::{Api, Client};
use tracing::debug;

/// Cluster client backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
    field_manager: String,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    /// Create a new cluster client
    ///
    /// # Arguments
    /// * `client` - Kubernetes client
    /// * `field_manager` - Field manager name used for server-side apply
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for KubeClusterClient {
    async fn get_cluster_policy(&self, name: &str) -> Result<Option<ClusterPolicy>, ClusterClientError> {
        let api: Api<ClusterPolicy> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn update_cluster_policy_state(&self, policy: &ClusterPolicy, state: State) -> Result<(), ClusterClientError> {
        let name = policy.metadata.name.as_deref()
            .ok_or_else(|| ClusterClientError::InvalidObject("ClusterPolicy missing name".to_string()))?;

        // resourceVersion in a merge patch acts as a precondition, so a
        // status computed from a stale read is rejected by the API server
        let mut patch = serde_json::json!({
            "status": { "state": state }
        });
        if let Some(rv) = policy.metadata.resource_version.as_deref() {
            patch["metadata"] = serde_json::json!({ "resourceVersion": rv });
        }

        debug!("Patching ClusterPolicy {} status to {}", name, state);
        let api: Api<ClusterPolicy> = Api::all(self.client.clone());
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
        Ok(())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterClientError> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn update_node(&self, node: &Node) -> Result<(), ClusterClientError> {
        let name = node.metadata.name.as_deref()
            .ok_or_else(|| ClusterClientError::InvalidObject("Node missing name".to_string()))?;
        let api: Api<Node> = Api::all(self.client.clone());
        api.replace(name, &PostParams::default(), node).await?;
        Ok(())
    }

    async fn openshift_version(&self) -> Result<Option<String>, ClusterClientError> {
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &cluster_version_resource());

        // Vanilla Kubernetes has no config.openshift.io API at all, which
        // also surfaces as not found
        let Some(version) = api.get_opt(CLUSTER_VERSION_NAME).await? else {
            debug!("No ClusterVersion found, not running on OpenShift");
            return Ok(None);
        };

        let status: ClusterVersionStatus = match version.data.get("status") {
            Some(status) => serde_json::from_value(status.clone())?,
            None => ClusterVersionStatus::default(),
        };

        status.completed_version()
            .map(Some)
            .ok_or_else(|| ClusterClientError::Platform("Failed to find Completed Cluster Version".to_string()))
    }

    async fn apply_object(&self, object: &ManagedObject) -> Result<(), ClusterClientError> {
        let name = object.name()
            .ok_or_else(|| ClusterClientError::InvalidObject(format!("{} missing name", object.kind())))?;

        let api: Api<DynamicObject> = if object.namespaced {
            let namespace = object.namespace()
                .ok_or_else(|| ClusterClientError::InvalidObject(format!("{} {} missing namespace", object.kind(), name)))?;
            Api::namespaced_with(self.client.clone(), namespace, &object.resource)
        } else {
            Api::all_with(self.client.clone(), &object.resource)
        };

        debug!("Applying {} {}", object.kind(), name);
        let params = PatchParams::apply(&self.field_manager).force();
        api.patch(name, &params, &Patch::Apply(&object.object)).await?;
        Ok(())
    }

    async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<Option<DaemonSet>, ClusterClientError> {
        let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, ClusterClientError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ClusterClientError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }
}
