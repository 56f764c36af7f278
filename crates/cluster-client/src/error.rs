//! Cluster client errors

use thiserror::Error;

/// Errors that can occur when talking to the cluster object store
#[derive(Debug, Error)]
pub enum ClusterClientError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The API rejected the request
    #[error("API error: {0}")]
    Api(String),

    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object is missing a field the request needs (name, namespace)
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// Platform information exists but could not be interpreted
    #[error("Platform lookup failed: {0}")]
    Platform(String),
}
