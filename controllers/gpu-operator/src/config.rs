//! Controller configuration.
//!
//! Read once at startup from environment variables.

use crate::error::ControllerError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const ASSETS_DIR_VAR: &str = "GPU_OPERATOR_ASSETS_DIR";
pub const OPERAND_NAMESPACE_VAR: &str = "OPERAND_NAMESPACE";
pub const FIELD_MANAGER_VAR: &str = "FIELD_MANAGER";
pub const RETRY_SECONDS_VAR: &str = "RECONCILE_RETRY_SECONDS";

const DEFAULT_ASSETS_DIR: &str = "/opt/gpu-operator";
const DEFAULT_OPERAND_NAMESPACE: &str = "gpu-operator-resources";
const DEFAULT_FIELD_MANAGER: &str = "gpu-operator";
const DEFAULT_RETRY_SECONDS: u64 = 5;

/// Runtime settings of the GPU operator controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Root holding one manifest directory per component
    pub assets_dir: PathBuf,
    /// Namespace for namespaced operands when neither the manifest nor the
    /// ClusterPolicy names one
    pub operand_namespace: String,
    /// Field manager used for server-side apply
    pub field_manager: String,
    /// Delay before retrying a not-ready component or a failed write
    pub retry_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from(DEFAULT_ASSETS_DIR),
            operand_namespace: DEFAULT_OPERAND_NAMESPACE.to_string(),
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            retry_delay: Duration::from_secs(DEFAULT_RETRY_SECONDS),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let retry_delay = match non_empty(RETRY_SECONDS_VAR) {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e| {
                    ControllerError::InvalidConfig(format!("{RETRY_SECONDS_VAR}={raw}: {e}"))
                })?;
                if secs == 0 {
                    return Err(ControllerError::InvalidConfig(format!(
                        "{RETRY_SECONDS_VAR} must be greater than zero"
                    )));
                }
                Duration::from_secs(secs)
            }
            None => defaults.retry_delay,
        };

        Ok(Self {
            assets_dir: non_empty(ASSETS_DIR_VAR).map_or(defaults.assets_dir, PathBuf::from),
            operand_namespace: non_empty(OPERAND_NAMESPACE_VAR).unwrap_or(defaults.operand_namespace),
            field_manager: non_empty(FIELD_MANAGER_VAR).unwrap_or(defaults.field_manager),
            retry_delay,
        })
    }
}
