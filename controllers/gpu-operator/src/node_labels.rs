//! GPU node classification and labeling.
//!
//! Node Feature Discovery publishes PCI vendor labels for every device it
//! finds. Nodes with an NVIDIA device get `nvidia.com/gpu.present=true`, so
//! the operand DaemonSets can select them; nodes that lost their GPU get
//! the label flipped to `false`. The key itself is never removed.

use crate::error::ControllerError;
use cluster_client::ClusterClientTrait;
use k8s_openapi::api::core::v1::Node;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Label written by this controller
pub const GPU_PRESENT_LABEL: &str = "nvidia.com/gpu.present";

/// NFD labels that indicate an NVIDIA PCI device (vendor 10de), any class,
/// 3D controller or VGA controller
pub const GPU_DISCOVERY_LABELS: &[&str] = &[
    "feature.node.kubernetes.io/pci-10de.present",
    "feature.node.kubernetes.io/pci-0302_10de.present",
    "feature.node.kubernetes.io/pci-0300_10de.present",
];

const TRUE: &str = "true";
const FALSE: &str = "false";

type Labels = BTreeMap<String, String>;

/// True iff the node is already marked as carrying a GPU
#[must_use]
pub fn has_gpu_present_label(labels: Option<&Labels>) -> bool {
    labels
        .and_then(|l| l.get(GPU_PRESENT_LABEL))
        .is_some_and(|v| v == TRUE)
}

/// True iff any discovery label reports an NVIDIA device
#[must_use]
pub fn has_discovery_evidence(labels: Option<&Labels>) -> bool {
    labels.is_some_and(|l| {
        GPU_DISCOVERY_LABELS
            .iter()
            .any(|key| l.get(*key).is_some_and(|v| v == TRUE))
    })
}

/// Value `nvidia.com/gpu.present` must be set to, `None` when no write is needed
#[must_use]
pub fn desired_gpu_present(labels: Option<&Labels>) -> Option<&'static str> {
    match (has_discovery_evidence(labels), has_gpu_present_label(labels)) {
        (true, false) => Some(TRUE),
        (false, true) => Some(FALSE),
        _ => None,
    }
}

/// True iff the labeling pass would write to this node
#[must_use]
pub fn node_needs_update(labels: Option<&Labels>) -> bool {
    desired_gpu_present(labels).is_some()
}

/// Watch filter for Node events: only nodes whose GPU label is missing or
/// outdated are worth a reconcile
#[must_use]
pub fn node_event_is_relevant(node: &Node) -> bool {
    let labels = node.metadata.labels.as_ref();
    if !node_needs_update(labels) {
        return false;
    }

    let name = node.metadata.name.as_deref().unwrap_or_default();
    if has_discovery_evidence(labels) {
        info!("Node {} needs an update, GPU present label missing", name);
    } else {
        info!("Node {} needs an update, GPU present label outdated", name);
    }
    true
}

/// Outcome of one labeling pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelSummary {
    /// Nodes newly marked `true`
    pub labeled: usize,
    /// Nodes flipped to `false`
    pub cleared: usize,
    pub unchanged: usize,
}

/// Bring `nvidia.com/gpu.present` in line with discovery evidence on every node.
///
/// Each node is handled independently; a failed write does not stop the
/// pass. All failures are reported together afterwards.
pub async fn reconcile_node_labels(client: &dyn ClusterClientTrait) -> Result<LabelSummary, ControllerError> {
    let nodes = client
        .list_nodes()
        .await
        .map_err(|e| ControllerError::NodeLabel(format!("unable to list nodes to check labels: {e}")))?;

    let mut summary = LabelSummary::default();
    let mut failed = Vec::new();

    for mut node in nodes {
        let name = node.metadata.name.clone().unwrap_or_default();
        let Some(value) = desired_gpu_present(node.metadata.labels.as_ref()) else {
            summary.unchanged += 1;
            continue;
        };

        node.metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(GPU_PRESENT_LABEL.to_string(), value.to_string());

        match client.update_node(&node).await {
            Ok(()) => {
                info!("Labeled node {} with {}={}", name, GPU_PRESENT_LABEL, value);
                if value == TRUE {
                    summary.labeled += 1;
                } else {
                    summary.cleared += 1;
                }
            }
            Err(e) => {
                warn!("Unable to label node {} with {}={}: {}", name, GPU_PRESENT_LABEL, value, e);
                failed.push(name);
            }
        }
    }

    if !failed.is_empty() {
        return Err(ControllerError::NodeLabel(format!(
            "unable to update {} on nodes: {}",
            GPU_PRESENT_LABEL,
            failed.join(", ")
        )));
    }

    debug!(
        "Node labels reconciled: {} labeled, {} cleared, {} unchanged",
        summary.labeled, summary.cleared, summary.unchanged
    );
    Ok(summary)
}
