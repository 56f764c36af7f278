//! ServiceMonitor CRD
//!
//! Prometheus Operator scrape configuration, used by the monitoring
//! component to expose DCGM exporter metrics. The fields the controller
//! reads are typed; everything else in the manifest (relabelings, TLS
//! settings, `matchExpressions`, ...) is kept as raw JSON so it reaches the
//! cluster unchanged.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unmodelled fields of a ServiceMonitor object
pub type ExtraFields = BTreeMap<String, serde_json::Value>;

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "monitoring.coreos.com",
    version = "v1",
    kind = "ServiceMonitor",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMonitorSpec {
    /// Label used as the Prometheus job name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_label: Option<String>,

    /// Endpoints to scrape on the selected services
    #[serde(default)]
    pub endpoints: Vec<ServiceMonitorEndpoint>,

    /// Services to scrape
    #[serde(default)]
    pub selector: ServiceMonitorSelector,

    /// Namespaces in which to look for selected services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<NamespaceSelector>,

    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMonitorEndpoint {
    /// Named service port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    /// HTTP path to scrape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Scrape interval (e.g. "15s")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Whether scraped labels win over target labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub honor_labels: Option<bool>,

    /// relabelings, metricRelabelings, scheme, tlsConfig, ...
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMonitorSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,

    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmodelled_fields_survive_round_trip() {
        let manifest = r"
apiVersion: monitoring.coreos.com/v1
kind: ServiceMonitor
metadata:
  name: nvidia-dcgm-exporter
spec:
  jobLabel: app
  targetLabels: [node]
  endpoints:
    - port: gpu-metrics
      scheme: https
      relabelings:
        - sourceLabels: [__meta_kubernetes_pod_node_name]
          targetLabel: instance
  selector:
    matchLabels:
      app: nvidia-dcgm-exporter
    matchExpressions:
      - key: tier
        operator: Exists
";
        let sm: ServiceMonitor = serde_yaml::from_str(manifest).unwrap();
        assert_eq!(sm.spec.endpoints[0].port.as_deref(), Some("gpu-metrics"));

        let value = serde_json::to_value(&sm).unwrap();
        assert_eq!(value["spec"]["targetLabels"], serde_json::json!(["node"]));
        assert_eq!(value["spec"]["endpoints"][0]["scheme"], "https");
        assert_eq!(
            value["spec"]["endpoints"][0]["relabelings"][0]["targetLabel"],
            "instance"
        );
        assert_eq!(value["spec"]["selector"]["matchExpressions"][0]["key"], "tier");
    }
}
