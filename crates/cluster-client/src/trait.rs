//! ClusterClient trait for mocking
//!
//! This trait abstracts the cluster object store so the reconciler can be
//! unit tested. `KubeClusterClient` implements it against a live API server
//! and `MockClusterClient` (feature `test-util`) keeps everything in memory.

use crate::error::ClusterClientError;
use crate::models::ManagedObject;
use crds::{ClusterPolicy, State};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{Node, Pod};

/// Trait for cluster object store operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterClientTrait: Send + Sync {
    // ClusterPolicy
    /// Fetch a ClusterPolicy by name, `None` if it does not exist
    async fn get_cluster_policy(&self, name: &str) -> Result<Option<ClusterPolicy>, ClusterClientError>;
    /// Persist `status.state`, guarded by the policy's resource version
    async fn update_cluster_policy_state(&self, policy: &ClusterPolicy, state: State) -> Result<(), ClusterClientError>;

    // Nodes
    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterClientError>;
    /// Replace a node object, guarded by its resource version
    async fn update_node(&self, node: &Node) -> Result<(), ClusterClientError>;

    // Platform
    /// OpenShift `major.minor` version, `None` when the cluster is not OpenShift
    async fn openshift_version(&self) -> Result<Option<String>, ClusterClientError>;

    // Operands
    /// Server-side apply of an operand object
    async fn apply_object(&self, object: &ManagedObject) -> Result<(), ClusterClientError>;
    async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<Option<DaemonSet>, ClusterClientError>;
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, ClusterClientError>;
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ClusterClientError>;
}
