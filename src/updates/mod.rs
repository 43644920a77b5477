// ============================================================================
// Domain Update Builders
// ============================================================================
//
// Each builder turns one on-chain action into an optimistic transaction:
//
//   1. Validate the business input (nothing is applied when it is malformed)
//   2. Derive entity ids from business keys
//   3. Apply one patch of model deltas as a single layer
//   4. Return a TransactionHandle carrying the wait targets
//
// ============================================================================

mod claims;
mod entry;
mod handle;
mod prizes;
mod tournament;

pub use handle::{TransactionHandle, WaitTarget, json_integer};

use crate::config::OptimisticConfig;
use crate::core::Result;
use crate::storage::EntityStore;
use crate::transaction::{Patch, TransactionId};
use tracing::{Level, event};

/// Entry point for the tournament update builders.
///
/// Owns a handle to the shared store; every handle it returns clones it.
#[derive(Debug, Clone)]
pub struct OptimisticUpdates<S> {
    store: S,
    config: OptimisticConfig,
}

impl<S> OptimisticUpdates<S>
where
    S: EntityStore + Clone + 'static,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: OptimisticConfig::default(),
        }
    }

    pub fn with_config(store: S, config: OptimisticConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &OptimisticConfig {
        &self.config
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    fn commit(
        &self,
        transaction_id: TransactionId,
        patch: Patch,
        targets: Vec<WaitTarget>,
    ) -> Result<TransactionHandle<S>> {
        let deltas = patch.len();
        self.store.apply_optimistic_patch(transaction_id, patch)?;

        event!(
            Level::DEBUG,
            transaction = %transaction_id,
            deltas,
            waiters = targets.len(),
            "transaction handle issued"
        );

        Ok(TransactionHandle::new(
            transaction_id,
            self.store.clone(),
            targets,
            self.config.observed_view,
            self.config.wait_timeout,
        ))
    }
}
