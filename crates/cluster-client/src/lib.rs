//! Cluster Object Store Client
//!
//! The narrow capability the GPU operator needs from the Kubernetes API:
//! reading and updating ClusterPolicies and Nodes, discovering the OpenShift
//! version, and applying operand objects and reading back workload status.
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{ClusterClientTrait, KubeClusterClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeClusterClient::new(kube::Client::try_default().await?, "gpu-operator");
//!
//! // Nodes carrying NVIDIA discovery labels
//! for node in client.list_nodes().await? {
//!     println!("{:?}", node.metadata.labels);
//! }
//!
//! // Empty on vanilla Kubernetes
//! let platform = client.openshift_version().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `test-util`: exposes [`MockClusterClient`], an in-memory store with
//!   failure injection for unit tests

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::KubeClusterClient;
pub use cluster_trait::ClusterClientTrait;
pub use error::ClusterClientError;
pub use models::*;
#[cfg(feature = "test-util")]
pub use mock::MockClusterClient;
