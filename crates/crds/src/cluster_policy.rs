//! ClusterPolicy CRD
//!
//! Declares the intent to have the GPU stack installed on the cluster.
//! Only one ClusterPolicy is acted upon at a time; any other instance is
//! marked `Ignored`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "nvidia.com",
    version = "v1",
    kind = "ClusterPolicy",
    plural = "clusterpolicies",
    shortname = "cp",
    status = "ClusterPolicyStatus",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPolicySpec {
    /// Namespace for namespaced operand objects whose manifest omits one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operand_namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPolicyStatus {
    /// Aggregated installation state
    pub state: State,
}

/// Installation state reported on a ClusterPolicy.
///
/// Errors are never persisted as a state; a failing install is reported as
/// `NotReady` and retried.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum State {
    /// Another ClusterPolicy is already active
    Ignored,

    /// At least one component is still converging
    NotReady,

    /// Every component has been verified ready
    Ready,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Ignored => "ignored",
            State::NotReady => "notReady",
            State::Ready => "ready",
        };
        f.write_str(s)
    }
}

impl ClusterPolicy {
    /// Last recorded state, if any status has been written yet
    #[must_use]
    pub fn state(&self) -> Option<State> {
        self.status.as_ref().map(|status| status.state)
    }
}
