//! Per-object installers.
//!
//! An installer applies one decoded operand object with server-side apply
//! and reports whether it is ready. Workloads (DaemonSet, Deployment, Pod)
//! are read back for readiness; every other kind is ready once applied.

use crate::error::ControllerError;
use crate::manifests::Resource;
use cluster_client::{ClusterClientError, ClusterClientTrait, ManagedObject};
use crds::{ClusterPolicy, State};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::Pod;
use kube::Resource as _;
use std::path::PathBuf;
use tracing::{debug, info};

/// What every installer sees while applying its object
#[derive(Clone, Copy)]
pub struct InstallContext<'a> {
    pub client: &'a dyn ClusterClientTrait,
    /// Owner of every applied object
    pub policy: &'a ClusterPolicy,
    /// Fallback namespace when neither the manifest nor the policy sets one
    pub default_namespace: &'a str,
}

impl std::fmt::Debug for InstallContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallContext")
            .field("policy", &self.policy.metadata.name)
            .field("default_namespace", &self.default_namespace)
            .finish_non_exhaustive()
    }
}

impl InstallContext<'_> {
    /// Namespace for namespaced operands whose manifest omits one
    #[must_use]
    pub fn operand_namespace(&self) -> &str {
        self.policy
            .spec
            .operand_namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(self.default_namespace)
    }
}

/// One installer invocation: a manifest file and the object decoded from it
#[derive(Debug, Clone)]
pub struct Installer {
    pub source: PathBuf,
    pub resource: Resource,
}

impl Installer {
    #[must_use]
    pub fn new(source: PathBuf, resource: Resource) -> Self {
        Self { source, resource }
    }

    /// Build the object actually sent to the API server: namespace
    /// defaulted and the policy set as controlling owner
    pub fn to_managed(&self, ctx: &InstallContext<'_>) -> Result<ManagedObject, ClusterClientError> {
        let mut object = self.resource.to_dynamic()?;
        let namespaced = self.resource.is_namespaced();

        object.metadata.namespace = if namespaced {
            Some(
                self.resource
                    .namespace()
                    .unwrap_or_else(|| ctx.operand_namespace())
                    .to_string(),
            )
        } else {
            None
        };

        if let Some(owner) = ctx.policy.controller_owner_ref(&()) {
            object.metadata.owner_references = Some(vec![owner]);
        }

        Ok(ManagedObject::new(self.resource.api_resource(), namespaced, object))
    }

    /// Apply the object and report its readiness
    pub async fn apply(&self, ctx: &InstallContext<'_>) -> Result<State, ControllerError> {
        let kind = self.resource.kind();
        let name = self.resource.name();
        let install_error = |source: ClusterClientError| ControllerError::Install {
            kind: kind.to_string(),
            name: name.to_string(),
            source,
        };

        let object = self.to_managed(ctx).map_err(install_error)?;
        ctx.client.apply_object(&object).await.map_err(install_error)?;
        let namespace = object.namespace().unwrap_or_default();

        let state = match &self.resource {
            Resource::DaemonSet(_) => {
                let ds = ctx.client.get_daemon_set(namespace, name).await.map_err(install_error)?;
                daemon_set_state(ds.as_ref())
            }
            Resource::Deployment(_) => {
                let deploy = ctx.client.get_deployment(namespace, name).await.map_err(install_error)?;
                deployment_state(deploy.as_ref())
            }
            Resource::Pod(_) => {
                let pod = ctx.client.get_pod(namespace, name).await.map_err(install_error)?;
                pod_state(pod.as_ref())
            }
            _ => State::Ready,
        };

        if state == State::Ready {
            debug!("{} {} is ready", kind, name);
        } else {
            info!("{} {} is not ready yet (from {})", kind, name, self.source.display());
        }
        Ok(state)
    }
}

/// A DaemonSet is ready once every scheduled pod is available
#[must_use]
pub fn daemon_set_state(ds: Option<&DaemonSet>) -> State {
    let Some(status) = ds.and_then(|ds| ds.status.as_ref()) else {
        return State::NotReady;
    };
    let unavailable = status.number_unavailable.unwrap_or(0);
    let available = status.number_available.unwrap_or(0);
    if unavailable == 0 && available >= status.desired_number_scheduled {
        State::Ready
    } else {
        State::NotReady
    }
}

#[must_use]
pub fn deployment_state(deploy: Option<&Deployment>) -> State {
    let Some(deploy) = deploy else {
        return State::NotReady;
    };
    let wanted = deploy.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let available = deploy
        .status
        .as_ref()
        .and_then(|s| s.available_replicas)
        .unwrap_or(0);
    if available >= wanted { State::Ready } else { State::NotReady }
}

/// Operand pods are one-shot validators; ready means they ran to completion
#[must_use]
pub fn pod_state(pod: Option<&Pod>) -> State {
    let phase = pod
        .and_then(|p| p.status.as_ref())
        .and_then(|s| s.phase.as_deref());
    if phase == Some("Succeeded") { State::Ready } else { State::NotReady }
}
