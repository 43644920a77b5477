use crate::core::{ObservedView, Result, SyncError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How strictly a prize-claim wait checks that the claim is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimConfirmation {
    /// Resolve as soon as the wait is registered, without looking at the claim
    #[default]
    Unconditional,
    /// Resolve once the tournament's `PrizeClaim` model reports `claimed`
    Observed,
}

/// Optimistic update configuration
///
/// One per session; the namespace never changes while the session lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimisticConfig {
    /// Namespace the tournament models are registered under
    pub namespace: String,

    /// State the builders' waiters observe
    pub observed_view: ObservedView,

    /// Strictness of the prize-claim waiter
    pub claim_confirmation: ClaimConfirmation,

    /// Deadline applied to `TransactionHandle::wait` (none by default)
    pub wait_timeout: Option<Duration>,
}

impl Default for OptimisticConfig {
    fn default() -> Self {
        Self {
            namespace: "tournaments".to_string(),
            observed_view: ObservedView::Projected,
            claim_confirmation: ClaimConfirmation::Unconditional,
            wait_timeout: None,
        }
    }
}

impl OptimisticConfig {
    /// Create a configuration for the given namespace
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            ..Self::default()
        }
    }

    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the observed view
    pub fn observed_view(mut self, view: ObservedView) -> Self {
        self.observed_view = view;
        self
    }

    /// Set claim wait strictness
    pub fn claim_confirmation(mut self, confirmation: ClaimConfirmation) -> Self {
        self.claim_confirmation = confirmation;
        self
    }

    /// Set a deadline for transaction waits
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(SyncError::InvalidInput("namespace must not be empty".into()));
        }
        if self.wait_timeout == Some(Duration::ZERO) {
            return Err(SyncError::InvalidInput("wait timeout must be positive".into()));
        }
        Ok(())
    }
}
