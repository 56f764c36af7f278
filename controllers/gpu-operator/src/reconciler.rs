//! ClusterPolicy reconciliation.
//!
//! One pass fetches the policy, initializes the state machine and steps it
//! component by component, persisting the state after every step, until a
//! component is not ready, something fails, or every component is ready.

use crate::backoff::FibonacciBackoff;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::installer::InstallContext;
use crate::state::StateMachine;
use cluster_client::ClusterClientTrait;
use crds::{ClusterPolicy, State};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// Backoff state for a policy
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::new(1, 300), // 1 second min, 5 minutes max
            error_count: 0,
        }
    }
}

/// Reconciles ClusterPolicy resources.
pub struct Reconciler {
    pub(crate) client: Box<dyn ClusterClientTrait + Send + Sync>,
    pub(crate) config: ControllerConfig,
    /// Held for a whole pass, so passes never interleave
    state: tokio::sync::Mutex<StateMachine>,
    /// Error count tracking per policy name, only for policies currently failing
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
    shutdown: Arc<Notify>,
    fatal_error: Mutex<Option<String>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(client: impl ClusterClientTrait + Send + Sync + 'static, config: ControllerConfig) -> Self {
        let state = StateMachine::new(config.assets_dir.clone());
        Self {
            client: Box::new(client),
            config,
            state: tokio::sync::Mutex::new(state),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown: Arc::new(Notify::new()),
            fatal_error: Mutex::new(None),
        }
    }

    /// Run one reconcile pass for the policy that triggered it
    pub async fn reconcile(&self, policy: &ClusterPolicy) -> Result<Action, ControllerError> {
        let name = policy.name_any();
        info!("Reconciling ClusterPolicy {}", name);

        let Some(instance) = self.client.get_cluster_policy(&name).await? else {
            info!("ClusterPolicy {} not found, it may have been deleted", name);
            self.reset_error(&name);
            return Ok(Action::await_change());
        };

        let mut state = self.state.lock().await;

        if state.conflicts_with(&instance) {
            warn!("Different ClusterPolicy {} found, only one is allowed at a time; ignoring it", name);
            if instance.state() != Some(State::Ignored) {
                self.client
                    .update_cluster_policy_state(&instance, State::Ignored)
                    .await
                    .map_err(|e| ControllerError::StatusUpdate(format!("failed to mark {name} ignored: {e}")))?;
            }
            return Ok(Action::await_change());
        }

        state.init(self.client.as_ref(), &instance).await?;
        state.validate(&instance)?;
        self.reset_error(&name);
        debug!(
            "ClusterPolicy {} initialized: {:?} of {} components, OpenShift {:?}",
            name,
            state.phase(),
            state.components().len(),
            state.openshift_version()
        );

        let ctx = InstallContext {
            client: self.client.as_ref(),
            policy: &instance,
            default_namespace: &self.config.operand_namespace,
        };

        loop {
            let result = state.step(&ctx).await;

            // Always compare against a fresh copy; if it cannot be read the
            // step result is dropped and the whole pass retried
            let current = match self.client.get_cluster_policy(&name).await {
                Ok(Some(current)) => current,
                Ok(None) => {
                    return Err(ControllerError::StatusUpdate(format!("ClusterPolicy {name} disappeared during reconcile")));
                }
                Err(e) => {
                    return Err(ControllerError::StatusUpdate(format!("failed to re-fetch ClusterPolicy {name}: {e}")));
                }
            };

            let next = result.as_ref().map_or(State::NotReady, |s| *s);
            if current.state() != Some(next) {
                self.client
                    .update_cluster_policy_state(&current, next)
                    .await
                    .map_err(|e| ControllerError::StatusUpdate(format!("failed to set {name} to {next}: {e}")))?;
                info!("ClusterPolicy {} state changed to {}", name, next);
            }

            if result? == State::NotReady {
                debug!("ClusterPolicy {} not ready, requeueing in {:?}", name, self.config.retry_delay);
                return Ok(Action::requeue(self.config.retry_delay));
            }

            if state.last() {
                break;
            }
        }

        info!("ClusterPolicy {} is ready", name);
        Ok(Action::await_change())
    }

    /// Requeue decision for a failed pass
    pub fn error_action(&self, policy: &ClusterPolicy, error: &ControllerError) -> Action {
        let name = policy.name_any();

        if error.is_fatal() {
            error!("Fatal error reconciling ClusterPolicy {}: {}; shutting down", name, error);
            self.trigger_shutdown(error.to_string());
            return Action::await_change();
        }

        if error.is_bounded_retry() {
            warn!("Reconciliation of ClusterPolicy {} failed: {}; retrying in {:?}", name, error, self.config.retry_delay);
            return Action::requeue(self.config.retry_delay);
        }

        let (backoff_seconds, error_count) = self.get_backoff_for_resource(&name);
        error!(
            "Reconciliation of ClusterPolicy {} failed (attempt {}): {}; retrying in {}s",
            name, error_count, error, backoff_seconds
        );
        Action::requeue(Duration::from_secs(backoff_seconds))
    }

    /// Get the next Fibonacci backoff for a policy and count the error
    ///
    /// Returns (backoff_seconds, error_count)
    pub fn get_backoff_for_resource(&self, resource_key: &str) -> (u64, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(resource_key.to_string())
                    .or_insert_with(BackoffState::new);
                state.error_count += 1;
                (state.backoff.next_backoff_seconds(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                (self.config.retry_delay.as_secs(), 0)
            }
        }
    }

    /// Forget a policy's error history (successful initialization, or the
    /// policy is gone)
    pub fn reset_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }

    /// Record a fatal error and stop the controller
    pub fn trigger_shutdown(&self, reason: String) {
        if let Ok(mut fatal) = self.fatal_error.lock() {
            fatal.get_or_insert(reason);
        }
        self.shutdown.notify_one();
    }

    /// Completes once `trigger_shutdown` has been called
    pub fn shutdown_signal(&self) -> Pin<Box<dyn Future<Output = ()> + Send + Sync>> {
        let shutdown = Arc::clone(&self.shutdown);
        Box::pin(async move { shutdown.notified().await })
    }

    /// The error that stopped the controller, if any
    pub fn fatal_error(&self) -> Option<String> {
        self.fatal_error.lock().ok().and_then(|fatal| fatal.clone())
    }
}

#[cfg(test)]
#[path = "reconciler_test.rs"]
mod reconciler_test;
