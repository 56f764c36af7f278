//! Controller-specific error types.
//!
//! Every failure the reconciler can hit is classified here, so the error
//! policy can pick between a bounded retry, a Fibonacci backoff and a
//! controller shutdown.

use cluster_client::ClusterClientError;
use thiserror::Error;

/// Errors that can occur in the GPU Operator Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Cluster API error outside of an install or status write
    #[error("Cluster error: {0}")]
    Client(#[from] ClusterClientError),

    /// A manifest directory could not be loaded
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// The platform (OpenShift version) lookup failed
    #[error("Platform lookup failed: {0}")]
    Platform(String),

    /// One or more nodes could not be relabeled
    #[error("Node labeling failed: {0}")]
    NodeLabel(String),

    /// Applying an operand object or reading its readiness failed
    #[error("Failed to install {kind} {name}: {source}")]
    Install {
        kind: String,
        name: String,
        #[source]
        source: ClusterClientError,
    },

    /// Reading back or persisting the ClusterPolicy status failed
    #[error("Status update failed: {0}")]
    StatusUpdate(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Errors retried after the fixed reconcile retry delay
    #[must_use]
    pub fn is_bounded_retry(&self) -> bool {
        matches!(self, Self::Install { .. } | Self::StatusUpdate(_))
    }

    /// Errors that no amount of retrying fixes; the controller stops
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Manifest(_))
    }
}
