//! SecurityContextConstraints
//!
//! OpenShift admission policy object (`security.openshift.io/v1`). It is not
//! a CRD with a spec, the policy fields sit at the top level, so it is
//! modelled as a plain serde type with its own API resource description.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::{ApiResource, GroupVersionKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Typed snapshot of an OpenShift SecurityContextConstraints object
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContextConstraints {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_privileged_container: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_host_dir_volume_plugin: Option<bool>,
    #[serde(rename = "allowHostIPC", default, skip_serializing_if = "Option::is_none")]
    pub allow_host_ipc: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_host_network: Option<bool>,
    #[serde(rename = "allowHostPID", default, skip_serializing_if = "Option::is_none")]
    pub allow_host_pid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_host_ports: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only_root_filesystem: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_capabilities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_add_capabilities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_drop_capabilities: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<StrategyOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub se_linux_context: Option<StrategyOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs_group: Option<StrategyOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplemental_groups: Option<StrategyOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<String>>,

    /// Fields not modelled above (seccompProfiles, allowedUnsafeSysctls,
    /// ...), carried through to the applied object unchanged
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Strategy block shared by `runAsUser`, `seLinuxContext`, `fsGroup` and
/// `supplementalGroups`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StrategyOptions {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SecurityContextConstraints {
    pub const GROUP: &'static str = "security.openshift.io";
    pub const VERSION: &'static str = "v1";
    pub const KIND: &'static str = "SecurityContextConstraints";
    pub const PLURAL: &'static str = "securitycontextconstraints";

    /// Cluster-scoped API resource used to apply the object dynamically
    #[must_use]
    pub fn api_resource() -> ApiResource {
        let gvk = GroupVersionKind::gvk(Self::GROUP, Self::VERSION, Self::KIND);
        ApiResource::from_gvk_with_plural(&gvk, Self::PLURAL)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }
}
