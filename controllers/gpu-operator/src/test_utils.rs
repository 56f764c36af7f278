//! Test utilities for unit testing the state machine and reconciler
//!
//! This module provides helpers for creating test data and laying out
//! manifest trees on disk.

use crate::installer::Installer;
use crate::manifests::{COMPONENTS, load_component};
use crds::{ClusterPolicy, ClusterPolicySpec};
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetStatus, Deployment, DeploymentStatus};
use k8s_openapi::api::core::v1::{Node, Pod, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::fs;
use std::path::Path;

/// Helper to create a test ClusterPolicy
pub fn create_test_policy(name: &str, uid: &str) -> ClusterPolicy {
    let mut policy = ClusterPolicy::new(name, ClusterPolicySpec::default());
    policy.metadata.uid = Some(uid.to_string());
    policy.metadata.resource_version = Some("1".to_string());
    policy
}

/// Helper to create a test Node with the given labels
pub fn create_test_node(name: &str, labels: &[(&str, &str)]) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: (!labels.is_empty()).then(|| {
                labels
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect()
            }),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A DaemonSet whose every scheduled pod is available
pub fn ready_daemon_set(namespace: &str, name: &str) -> DaemonSet {
    DaemonSet {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        status: Some(DaemonSetStatus {
            desired_number_scheduled: 2,
            number_available: Some(2),
            number_unavailable: Some(0),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Deployment with one available replica
pub fn ready_deployment(namespace: &str, name: &str) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        status: Some(DeploymentStatus {
            available_replicas: Some(1),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Pod that ran to completion
pub fn succeeded_pod(namespace: &str, name: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        status: Some(PodStatus {
            phase: Some("Succeeded".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn write_manifest(dir: &Path, file: &str, content: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(file), content).unwrap();
}

/// Decode a single manifest into an installer
pub fn installer_from_yaml(content: &str) -> Installer {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "manifest.yaml", content);
    load_component(dir.path(), None).unwrap().remove(0)
}

/// Lay out every component directory under `root`, each with a
/// ServiceAccount and a DaemonSet, plus an OpenShift-only SCC for the driver
pub fn write_assets(root: &Path) {
    for (name, dir) in COMPONENTS {
        let dir = root.join(dir);
        write_manifest(&dir, "0100_service_account.yaml", &service_account_yaml(&format!("nvidia-{name}")));
        write_manifest(&dir, "0500_daemonset.yaml", &daemon_set_yaml(&format!("nvidia-{name}-daemonset")));
    }
    write_manifest(
        &root.join("state-driver"),
        "0110_openshift_scc.yaml",
        &scc_yaml("nvidia-driver"),
    );
}

pub fn service_account_yaml(name: &str) -> String {
    format!("apiVersion: v1\nkind: ServiceAccount\nmetadata:\n  name: {name}\n")
}

pub fn config_map_yaml(name: &str) -> String {
    format!("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {name}\ndata:\n  key: value\n")
}

pub fn service_yaml(name: &str) -> String {
    format!(
        "apiVersion: v1\nkind: Service\nmetadata:\n  name: {name}\nspec:\n  ports:\n    - name: metrics\n      port: 9400\n"
    )
}

pub fn role_yaml(name: &str) -> String {
    format!(
        "apiVersion: rbac.authorization.k8s.io/v1\nkind: Role\nmetadata:\n  name: {name}\nrules:\n  - apiGroups: [\"\"]\n    resources: [\"pods\"]\n    verbs: [\"get\", \"list\"]\n"
    )
}

pub fn cluster_role_yaml(name: &str) -> String {
    format!(
        "apiVersion: rbac.authorization.k8s.io/v1\nkind: ClusterRole\nmetadata:\n  name: {name}\nrules:\n  - apiGroups: [\"\"]\n    resources: [\"nodes\"]\n    verbs: [\"get\", \"list\", \"watch\"]\n"
    )
}

pub fn daemon_set_yaml(name: &str) -> String {
    format!(
        r"apiVersion: apps/v1
kind: DaemonSet
metadata:
  name: {name}
spec:
  selector:
    matchLabels:
      app: {name}
  template:
    metadata:
      labels:
        app: {name}
    spec:
      nodeSelector:
        nvidia.com/gpu.present: 'true'
      containers:
        - name: main
          image: nvidia/{name}:latest
"
    )
}

pub fn deployment_yaml(name: &str) -> String {
    format!(
        r"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {name}
spec:
  selector:
    matchLabels:
      app: {name}
  template:
    metadata:
      labels:
        app: {name}
    spec:
      containers:
        - name: main
          image: nvidia/{name}:latest
"
    )
}

pub fn pod_yaml(name: &str) -> String {
    format!(
        r"apiVersion: v1
kind: Pod
metadata:
  name: {name}
spec:
  restartPolicy: OnFailure
  containers:
    - name: validator
      image: nvidia/{name}:latest
"
    )
}

pub fn scc_yaml(name: &str) -> String {
    format!(
        "apiVersion: security.openshift.io/v1\nkind: SecurityContextConstraints\nmetadata:\n  name: {name}\nallowPrivilegedContainer: true\n"
    )
}
