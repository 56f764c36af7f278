//! Cluster client models
//!
//! Types exchanged with the cluster object store that are not plain
//! Kubernetes objects.

use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use serde::Deserialize;

/// Operand object ready to be applied
///
/// Carries the API resource description alongside the untyped object so one
/// apply path serves every kind, including ones without a Rust type in
/// `k8s-openapi`.
#[derive(Debug, Clone)]
pub struct ManagedObject {
    pub resource: ApiResource,
    pub namespaced: bool,
    pub object: DynamicObject,
}

impl ManagedObject {
    #[must_use]
    pub fn new(resource: ApiResource, namespaced: bool, object: DynamicObject) -> Self {
        Self {
            resource,
            namespaced,
            object,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.resource.kind
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.object.metadata.name.as_deref()
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.object.metadata.namespace.as_deref()
    }
}

/// `config.openshift.io/v1` ClusterVersion, name of the singleton instance
pub const CLUSTER_VERSION_NAME: &str = "version";

/// API resource of the OpenShift ClusterVersion object
#[must_use]
pub fn cluster_version_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk("config.openshift.io", "v1", "ClusterVersion");
    ApiResource::from_gvk_with_plural(&gvk, "clusterversions")
}

/// Status of an OpenShift ClusterVersion, reduced to the update history
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterVersionStatus {
    #[serde(default)]
    pub history: Vec<UpdateHistory>,
}

/// One entry of the ClusterVersion update history
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHistory {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub version: String,
}

impl ClusterVersionStatus {
    /// `major.minor` of the first completed update, or just `major` when the
    /// version has a single component
    #[must_use]
    pub fn completed_version(&self) -> Option<String> {
        let entry = self.history.iter().find(|h| h.state == "Completed")?;
        let mut parts = entry.version.split('.');
        let major = parts.next().unwrap_or_default();
        Some(match parts.next() {
            Some(minor) => format!("{major}.{minor}"),
            None => major.to_string(),
        })
    }
}
