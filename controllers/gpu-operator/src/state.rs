//! Component registry and installation state machine.
//!
//! Components are installed strictly in order. The cursor only moves past a
//! component once every one of its installers reports `Ready`; on the next
//! reconcile pass the cursor is rewound and everything is verified again,
//! since operands can drift after they were first seen ready.

use crate::error::ControllerError;
use crate::installer::InstallContext;
use crate::manifests::{COMPONENTS, Component};
use crate::node_labels::reconcile_node_labels;
use cluster_client::ClusterClientTrait;
use crds::{ClusterPolicy, State};
use kube_runtime::reflector::ObjectRef;
use std::path::PathBuf;
use tracing::{debug, info};

/// Where the state machine stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// `init` has never succeeded
    Uninitialized,
    /// Next `step` runs the component at this index
    Stepping(usize),
    /// Every component has been verified ready in this pass
    Complete,
}

/// Ordered component list plus the cursor walking it.
#[derive(Debug)]
pub struct StateMachine {
    assets_dir: PathBuf,
    components: Vec<Component>,
    idx: usize,
    active: Option<ObjectRef<ClusterPolicy>>,
    openshift: Option<String>,
    initialized: bool,
}

impl StateMachine {
    #[must_use]
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            components: Vec::new(),
            idx: 0,
            active: None,
            openshift: None,
            initialized: false,
        }
    }

    /// Start a new pass for `policy`.
    ///
    /// Detects the platform, records the active policy, rewinds the cursor,
    /// loads the component manifests the first time around and brings the
    /// GPU node labels up to date.
    pub async fn init(&mut self, client: &dyn ClusterClientTrait, policy: &ClusterPolicy) -> Result<(), ControllerError> {
        self.openshift = client
            .openshift_version()
            .await
            .map_err(|e| ControllerError::Platform(e.to_string()))?
            .filter(|v| !v.is_empty());

        self.active = Some(ObjectRef::from_obj(policy));
        self.idx = 0;

        if self.components.is_empty() {
            let mut components = Vec::with_capacity(COMPONENTS.len());
            for (name, dir) in COMPONENTS {
                components.push(Component::load(name, &self.assets_dir.join(dir), self.openshift.as_deref())?);
            }
            info!(
                "Loaded {} components with {} objects (platform: {})",
                components.len(),
                components.iter().map(|c| c.resources().count()).sum::<usize>(),
                self.openshift.as_deref().map_or_else(|| "kubernetes".to_string(), |v| format!("openshift {v}"))
            );
            self.components = components;
        }

        let summary = reconcile_node_labels(client).await?;
        info!(
            "GPU node labels: {} labeled, {} cleared, {} unchanged",
            summary.labeled, summary.cleared, summary.unchanged
        );

        self.initialized = true;
        Ok(())
    }

    /// Run every installer of the component at the cursor.
    ///
    /// Stops at the first error or not-ready installer. The cursor advances
    /// only when all of them are ready. Past the last component nothing runs
    /// and the result is `Ready`.
    pub async fn step(&mut self, ctx: &InstallContext<'_>) -> Result<State, ControllerError> {
        let Some(component) = self.components.get(self.idx) else {
            return Ok(State::Ready);
        };

        debug!("Installing component {} ({}/{})", component.name, self.idx + 1, self.components.len());
        for installer in component.installers() {
            let state = installer.apply(ctx).await?;
            if state != State::Ready {
                info!("Component {} is not ready", component.name);
                return Ok(state);
            }
        }

        info!("Component {} is ready", component.name);
        self.idx += 1;
        Ok(State::Ready)
    }

    /// True once the cursor has moved past the last component
    #[must_use]
    pub fn last(&self) -> bool {
        self.idx == self.components.len()
    }

    /// Semantic checks on the policy before installing anything
    pub fn validate(&self, _policy: &ClusterPolicy) -> Result<(), ControllerError> {
        Ok(())
    }

    /// True when another policy is already the active one
    #[must_use]
    pub fn conflicts_with(&self, policy: &ClusterPolicy) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| *active != ObjectRef::from_obj(policy))
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        if !self.initialized {
            Phase::Uninitialized
        } else if self.last() {
            Phase::Complete
        } else {
            Phase::Stepping(self.idx)
        }
    }

    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Detected OpenShift version, `None` on plain Kubernetes
    #[must_use]
    pub fn openshift_version(&self) -> Option<&str> {
        self.openshift.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::Installer;
    use crate::test_utils::*;
    use cluster_client::MockClusterClient;
    use crate::node_labels::GPU_PRESENT_LABEL;

    const NAMESPACE: &str = "gpu-operator-resources";

    fn installers(manifests: &[String]) -> Vec<Installer> {
        manifests.iter().map(|m| installer_from_yaml(m)).collect()
    }

    fn machine_with(components: Vec<Component>) -> StateMachine {
        let mut sm = StateMachine::new("/nonexistent");
        sm.components = components;
        sm.initialized = true;
        sm
    }

    #[tokio::test]
    async fn test_step_stops_at_not_ready_installer() {
        let client = MockClusterClient::new();
        client.set_workloads_ready_on_apply(false);
        let policy = create_test_policy("cluster-policy", "uid-1");
        let ctx = InstallContext {
            client: &client,
            policy: &policy,
            default_namespace: NAMESPACE,
        };

        let mut sm = machine_with(vec![Component::new(
            "driver",
            installers(&[
                service_account_yaml("nvidia-driver"),
                config_map_yaml("nvidia-driver-config"),
                daemon_set_yaml("nvidia-driver-daemonset"),
            ]),
        )]);

        assert_eq!(sm.step(&ctx).await.unwrap(), State::NotReady);
        assert_eq!(sm.phase(), Phase::Stepping(0));
        assert!(!sm.last());
        assert_eq!(client.applied_objects().len(), 3);

        // Rollout finishes, the same component is retried and passes
        client.set_daemon_set(ready_daemon_set(NAMESPACE, "nvidia-driver-daemonset"));
        assert_eq!(sm.step(&ctx).await.unwrap(), State::Ready);
        assert_eq!(sm.phase(), Phase::Complete);
        assert!(sm.last());
    }

    #[tokio::test]
    async fn test_step_error_stops_component() {
        let client = MockClusterClient::new();
        client.fail_apply_kind("ConfigMap");
        let policy = create_test_policy("cluster-policy", "uid-1");
        let ctx = InstallContext {
            client: &client,
            policy: &policy,
            default_namespace: NAMESPACE,
        };

        let mut sm = machine_with(vec![Component::new(
            "driver",
            installers(&[
                service_account_yaml("nvidia-driver"),
                config_map_yaml("nvidia-driver-config"),
                daemon_set_yaml("nvidia-driver-daemonset"),
            ]),
        )]);

        let err = sm.step(&ctx).await.unwrap_err();
        assert!(matches!(err, ControllerError::Install { .. }));
        assert_eq!(sm.phase(), Phase::Stepping(0));
        // The DaemonSet after the failing ConfigMap is never attempted
        assert_eq!(client.applied_objects().len(), 1);
    }

    #[tokio::test]
    async fn test_step_past_end_invokes_nothing() {
        let client = MockClusterClient::new();
        let policy = create_test_policy("cluster-policy", "uid-1");
        let ctx = InstallContext {
            client: &client,
            policy: &policy,
            default_namespace: NAMESPACE,
        };

        let mut sm = machine_with(vec![Component::new(
            "driver",
            installers(&[service_account_yaml("nvidia-driver")]),
        )]);
        assert_eq!(sm.step(&ctx).await.unwrap(), State::Ready);
        assert!(sm.last());

        assert_eq!(sm.step(&ctx).await.unwrap(), State::Ready);
        assert_eq!(client.applied_objects().len(), 1);
        assert_eq!(sm.phase(), Phase::Complete);
    }

    #[tokio::test]
    async fn test_init_loads_components_once_and_labels_nodes() {
        let assets = tempfile::tempdir().unwrap();
        write_assets(assets.path());
        let client = MockClusterClient::new();
        client.add_node(create_test_node(
            "gpu-0",
            &[("feature.node.kubernetes.io/pci-10de.present", "true")],
        ));
        let policy = create_test_policy("cluster-policy", "uid-1");

        let mut sm = StateMachine::new(assets.path());
        assert_eq!(sm.phase(), Phase::Uninitialized);

        sm.init(&client, &policy).await.unwrap();
        assert_eq!(sm.phase(), Phase::Stepping(0));
        assert_eq!(sm.components().len(), 6);
        assert_eq!(sm.components()[0].name, "driver");
        assert_eq!(sm.components()[5].name, "feature-discovery");
        // No OpenShift: the driver SCC is filtered out
        assert_eq!(sm.components()[0].installers().len(), 2);
        assert_eq!(sm.openshift_version(), None);

        let node = client.node("gpu-0").unwrap();
        assert_eq!(
            node.metadata.labels.unwrap().get(GPU_PRESENT_LABEL).map(String::as_str),
            Some("true")
        );

        // Manifests changed on disk are not picked up again
        std::fs::remove_dir_all(assets.path().join("state-driver")).unwrap();
        sm.init(&client, &policy).await.unwrap();
        assert_eq!(sm.components().len(), 6);
    }

    #[tokio::test]
    async fn test_init_on_openshift_keeps_openshift_manifests() {
        let assets = tempfile::tempdir().unwrap();
        write_assets(assets.path());
        let client = MockClusterClient::new();
        client.set_openshift_version("4.6");
        let policy = create_test_policy("cluster-policy", "uid-1");

        let mut sm = StateMachine::new(assets.path());
        sm.init(&client, &policy).await.unwrap();
        assert_eq!(sm.openshift_version(), Some("4.6"));
        assert_eq!(sm.components()[0].installers().len(), 3);
    }

    #[tokio::test]
    async fn test_init_rewinds_cursor() {
        let assets = tempfile::tempdir().unwrap();
        write_assets(assets.path());
        let client = MockClusterClient::new();
        let policy = create_test_policy("cluster-policy", "uid-1");
        let ctx = InstallContext {
            client: &client,
            policy: &policy,
            default_namespace: NAMESPACE,
        };

        let mut sm = StateMachine::new(assets.path());
        sm.init(&client, &policy).await.unwrap();
        sm.step(&ctx).await.unwrap();
        sm.step(&ctx).await.unwrap();
        assert_eq!(sm.phase(), Phase::Stepping(2));

        sm.init(&client, &policy).await.unwrap();
        assert_eq!(sm.phase(), Phase::Stepping(0));
    }

    #[tokio::test]
    async fn test_init_errors() {
        let assets = tempfile::tempdir().unwrap();
        write_assets(assets.path());
        let policy = create_test_policy("cluster-policy", "uid-1");

        let client = MockClusterClient::new();
        client.set_platform_error("no completed version");
        let mut sm = StateMachine::new(assets.path());
        let err = sm.init(&client, &policy).await.unwrap_err();
        assert!(matches!(err, ControllerError::Platform(_)));
        assert_eq!(sm.phase(), Phase::Uninitialized);

        let client = MockClusterClient::new();
        client.add_node(create_test_node(
            "gpu-0",
            &[("feature.node.kubernetes.io/pci-10de.present", "true")],
        ));
        client.fail_node_update("gpu-0");
        let err = sm.init(&client, &policy).await.unwrap_err();
        assert!(matches!(err, ControllerError::NodeLabel(_)));

        let empty = tempfile::tempdir().unwrap();
        let mut sm = StateMachine::new(empty.path());
        let err = sm.init(&MockClusterClient::new(), &policy).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(sm.components().is_empty());
    }

    #[tokio::test]
    async fn test_conflicts_with() {
        let assets = tempfile::tempdir().unwrap();
        write_assets(assets.path());
        let client = MockClusterClient::new();
        let first = create_test_policy("cluster-policy", "uid-1");
        let second = create_test_policy("other-policy", "uid-2");

        let mut sm = StateMachine::new(assets.path());
        assert!(!sm.conflicts_with(&second));

        sm.init(&client, &first).await.unwrap();
        assert!(!sm.conflicts_with(&first));
        assert!(sm.conflicts_with(&second));
        assert!(sm.validate(&first).is_ok());
    }

    #[test]
    fn test_last_with_no_components() {
        let sm = StateMachine::new("/nonexistent");
        assert!(sm.last());
        assert_eq!(sm.phase(), Phase::Uninitialized);
    }
}
