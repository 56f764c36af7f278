//! GPU Operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions owned by the GPU operator, plus the
//! typed snapshots for operand kinds that `k8s-openapi` does not ship.

pub mod cluster_policy;
pub mod security_context_constraints;
pub mod service_monitor;

pub use cluster_policy::*;
pub use security_context_constraints::*;
pub use service_monitor::*;
