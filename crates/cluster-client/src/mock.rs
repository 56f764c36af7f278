//! Mock ClusterClient for unit testing
//!
//! This module provides a mock implementation of ClusterClientTrait that can be used
//! in unit tests without requiring a running API server.

use crate::error::ClusterClientError;
use crate::models::ManagedObject;
use crate::cluster_trait::ClusterClientTrait;
use crds::{ClusterPolicy, ClusterPolicyStatus, State};
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetStatus, Deployment, DeploymentStatus};
use k8s_openapi::api::core::v1::{Node, Pod, PodStatus};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

type ObjectKey = (String, String);

/// Mock ClusterClient for testing
///
/// Stores objects in memory. Applied workloads (DaemonSet, Deployment, Pod)
/// become ready immediately unless `set_workloads_ready_on_apply(false)` is
/// used; explicitly stored workloads are never overwritten by an apply.
#[derive(Clone, Default)]
pub struct MockClusterClient {
    policies: Arc<Mutex<HashMap<String, ClusterPolicy>>>,
    nodes: Arc<Mutex<BTreeMap<String, Node>>>,
    applied: Arc<Mutex<Vec<ManagedObject>>>,
    daemon_sets: Arc<Mutex<HashMap<ObjectKey, DaemonSet>>>,
    deployments: Arc<Mutex<HashMap<ObjectKey, Deployment>>>,
    pods: Arc<Mutex<HashMap<ObjectKey, Pod>>>,
    openshift_version: Arc<Mutex<Option<String>>>,
    platform_error: Arc<Mutex<Option<String>>>,
    // Failure injection
    failing_nodes: Arc<Mutex<HashSet<String>>>,
    failing_apply_kinds: Arc<Mutex<HashSet<String>>>,
    policy_gets_left: Arc<Mutex<Option<usize>>>,
    policy_vanishes_after: Arc<Mutex<Option<usize>>>,
    fail_status_update: Arc<Mutex<bool>>,
    workloads_not_ready: Arc<Mutex<bool>>,
    // Call logs
    status_updates: Arc<Mutex<Vec<(String, State)>>>,
    node_updates: Arc<Mutex<Vec<String>>>,
}

impl MockClusterClient {
    /// Create a new, empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a ClusterPolicy to the mock store (for test setup)
    pub fn add_policy(&self, policy: ClusterPolicy) {
        let name = policy.metadata.name.clone().unwrap_or_default();
        self.policies.lock().unwrap().insert(name, policy);
    }

    /// Remove a ClusterPolicy from the mock store
    pub fn remove_policy(&self, name: &str) {
        self.policies.lock().unwrap().remove(name);
    }

    /// Current stored copy of a ClusterPolicy
    pub fn policy(&self, name: &str) -> Option<ClusterPolicy> {
        self.policies.lock().unwrap().get(name).cloned()
    }

    /// Add a node to the mock store (for test setup)
    pub fn add_node(&self, node: Node) {
        let name = node.metadata.name.clone().unwrap_or_default();
        self.nodes.lock().unwrap().insert(name, node);
    }

    /// Current stored copy of a node
    pub fn node(&self, name: &str) -> Option<Node> {
        self.nodes.lock().unwrap().get(name).cloned()
    }

    pub fn set_daemon_set(&self, daemon_set: DaemonSet) {
        let key = key_of(&daemon_set.metadata);
        self.daemon_sets.lock().unwrap().insert(key, daemon_set);
    }

    pub fn set_deployment(&self, deployment: Deployment) {
        let key = key_of(&deployment.metadata);
        self.deployments.lock().unwrap().insert(key, deployment);
    }

    pub fn set_pod(&self, pod: Pod) {
        let key = key_of(&pod.metadata);
        self.pods.lock().unwrap().insert(key, pod);
    }

    /// Pretend the cluster is OpenShift with the given `major.minor` version
    pub fn set_openshift_version(&self, version: impl Into<String>) {
        *self.openshift_version.lock().unwrap() = Some(version.into());
    }

    /// Make the platform lookup fail with the given message
    pub fn set_platform_error(&self, message: impl Into<String>) {
        *self.platform_error.lock().unwrap() = Some(message.into());
    }

    /// Make every update of the named node fail
    pub fn fail_node_update(&self, name: impl Into<String>) {
        self.failing_nodes.lock().unwrap().insert(name.into());
    }

    /// Make every apply of the given kind fail
    pub fn fail_apply_kind(&self, kind: impl Into<String>) {
        self.failing_apply_kinds.lock().unwrap().insert(kind.into());
    }

    /// Allow `count` successful policy fetches, fail every one after that
    pub fn fail_policy_get_after(&self, count: usize) {
        *self.policy_gets_left.lock().unwrap() = Some(count);
    }

    /// Delete the fetched ClusterPolicy once `count` fetches have seen it
    pub fn remove_policy_after(&self, count: usize) {
        *self.policy_vanishes_after.lock().unwrap() = Some(count);
    }

    pub fn fail_status_updates(&self, fail: bool) {
        *self.fail_status_update.lock().unwrap() = fail;
    }

    /// Controls whether applied workloads are stored as ready
    pub fn set_workloads_ready_on_apply(&self, ready: bool) {
        *self.workloads_not_ready.lock().unwrap() = !ready;
    }

    /// Every object applied so far, in order
    pub fn applied_objects(&self) -> Vec<ManagedObject> {
        self.applied.lock().unwrap().clone()
    }

    /// Every persisted status transition as `(policy name, state)`
    pub fn status_updates(&self) -> Vec<(String, State)> {
        self.status_updates.lock().unwrap().clone()
    }

    /// Names of nodes written so far, in order
    pub fn node_updates(&self) -> Vec<String> {
        self.node_updates.lock().unwrap().clone()
    }

    fn record_workload(&self, object: &ManagedObject) -> Result<(), ClusterClientError> {
        let ready = !*self.workloads_not_ready.lock().unwrap();
        let data = serde_json::to_value(&object.object)?;
        match object.kind() {
            "DaemonSet" => {
                let mut ds: DaemonSet = serde_json::from_value(data)?;
                if ready {
                    ds.status = Some(DaemonSetStatus {
                        desired_number_scheduled: 1,
                        number_available: Some(1),
                        number_unavailable: None,
                        ..Default::default()
                    });
                }
                let key = key_of(&ds.metadata);
                self.daemon_sets.lock().unwrap().entry(key).or_insert(ds);
            }
            "Deployment" => {
                let mut deploy: Deployment = serde_json::from_value(data)?;
                if ready {
                    let replicas = deploy.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
                    deploy.status = Some(DeploymentStatus {
                        available_replicas: Some(replicas),
                        ..Default::default()
                    });
                }
                let key = key_of(&deploy.metadata);
                self.deployments.lock().unwrap().entry(key).or_insert(deploy);
            }
            "Pod" => {
                let mut pod: Pod = serde_json::from_value(data)?;
                if ready {
                    pod.status = Some(PodStatus {
                        phase: Some("Succeeded".to_string()),
                        ..Default::default()
                    });
                }
                let key = key_of(&pod.metadata);
                self.pods.lock().unwrap().entry(key).or_insert(pod);
            }
            _ => {}
        }
        Ok(())
    }
}

fn key_of(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> ObjectKey {
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

fn object_key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_string(), name.to_string())
}

#[async_trait::async_trait]
impl ClusterClientTrait for MockClusterClient {
    async fn get_cluster_policy(&self, name: &str) -> Result<Option<ClusterPolicy>, ClusterClientError> {
        {
            let mut left = self.policy_gets_left.lock().unwrap();
            if let Some(n) = left.as_mut() {
                if *n == 0 {
                    return Err(ClusterClientError::Api("injected ClusterPolicy fetch failure".to_string()));
                }
                *n -= 1;
            }
        }
        {
            let mut vanish = self.policy_vanishes_after.lock().unwrap();
            if let Some(n) = vanish.as_mut() {
                if *n == 0 {
                    self.policies.lock().unwrap().remove(name);
                } else {
                    *n -= 1;
                }
            }
        }
        Ok(self.policies.lock().unwrap().get(name).cloned())
    }

    async fn update_cluster_policy_state(&self, policy: &ClusterPolicy, state: State) -> Result<(), ClusterClientError> {
        if *self.fail_status_update.lock().unwrap() {
            return Err(ClusterClientError::Api("injected status update failure".to_string()));
        }
        let name = policy.metadata.name.clone()
            .ok_or_else(|| ClusterClientError::InvalidObject("ClusterPolicy missing name".to_string()))?;

        let mut policies = self.policies.lock().unwrap();
        let stored = policies.get_mut(&name)
            .ok_or_else(|| ClusterClientError::NotFound(format!("ClusterPolicy {name}")))?;
        stored.status = Some(ClusterPolicyStatus { state });
        self.status_updates.lock().unwrap().push((name, state));
        Ok(())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterClientError> {
        Ok(self.nodes.lock().unwrap().values().cloned().collect())
    }

    async fn update_node(&self, node: &Node) -> Result<(), ClusterClientError> {
        let name = node.metadata.name.clone()
            .ok_or_else(|| ClusterClientError::InvalidObject("Node missing name".to_string()))?;
        if self.failing_nodes.lock().unwrap().contains(&name) {
            return Err(ClusterClientError::Api(format!("injected update failure for node {name}")));
        }
        let mut nodes = self.nodes.lock().unwrap();
        if !nodes.contains_key(&name) {
            return Err(ClusterClientError::NotFound(format!("Node {name}")));
        }
        nodes.insert(name.clone(), node.clone());
        self.node_updates.lock().unwrap().push(name);
        Ok(())
    }

    async fn openshift_version(&self) -> Result<Option<String>, ClusterClientError> {
        if let Some(message) = self.platform_error.lock().unwrap().clone() {
            return Err(ClusterClientError::Platform(message));
        }
        Ok(self.openshift_version.lock().unwrap().clone())
    }

    async fn apply_object(&self, object: &ManagedObject) -> Result<(), ClusterClientError> {
        if self.failing_apply_kinds.lock().unwrap().contains(object.kind()) {
            return Err(ClusterClientError::Api(format!(
                "injected apply failure for {} {}",
                object.kind(),
                object.name().unwrap_or_default()
            )));
        }
        self.record_workload(object)?;
        self.applied.lock().unwrap().push(object.clone());
        Ok(())
    }

    async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<Option<DaemonSet>, ClusterClientError> {
        Ok(self.daemon_sets.lock().unwrap().get(&object_key(namespace, name)).cloned())
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, ClusterClientError> {
        Ok(self.deployments.lock().unwrap().get(&object_key(namespace, name)).cloned())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ClusterClientError> {
        Ok(self.pods.lock().unwrap().get(&object_key(namespace, name)).cloned())
    }
}
