// ============================================================================
// Tourney Optimistic Library
// ============================================================================

pub mod config;
pub mod core;
pub mod domain;
pub mod storage;
pub mod transaction;
pub mod updates;
pub mod waiter;

// Re-export main types for convenience
pub use config::{ClaimConfirmation, OptimisticConfig};
pub use core::{
    EntityId, EntityRecord, ModelData, ObservedView, Result, SyncError, derive_entity_id,
};
pub use storage::{EntityEvent, EntityStore, InMemoryEntityStore, Subscription};
pub use transaction::{Draft, ModelDelta, Patch, TransactionId, TransactionState};
pub use updates::{OptimisticUpdates, TransactionHandle, WaitTarget};
pub use waiter::{EntityWait, wait_all, with_deadline};

// ============================================================================
// High-level Session API
// ============================================================================

/// A client session over one shared entity store.
///
/// Cloning is cheap; clones share the same store.
///
/// # Examples
///
/// ```
/// use tourney_optimistic::Session;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::new();
///
/// // Register entry #1 of tournament 7 with game token count 1
/// let handle = session.updates().apply_tournament_entry_update(7, 1, 1)?;
///
/// // The optimistic state is visible straight away
/// handle.wait().await?;
/// handle.confirm()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Session {
    updates: OptimisticUpdates<InMemoryEntityStore>,
}

impl Session {
    /// Session over an empty in-memory store with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Session with a custom configuration
    pub fn with_config(config: OptimisticConfig) -> Result<Self> {
        Ok(Self {
            updates: OptimisticUpdates::with_config(InMemoryEntityStore::new(), config)?,
        })
    }

    /// Session over an existing store
    pub fn with_store(store: InMemoryEntityStore, config: OptimisticConfig) -> Result<Self> {
        Ok(Self {
            updates: OptimisticUpdates::with_config(store, config)?,
        })
    }

    pub fn store(&self) -> &InMemoryEntityStore {
        self.updates.store()
    }

    pub fn updates(&self) -> &OptimisticUpdates<InMemoryEntityStore> {
        &self.updates
    }

    /// Feed indexer rows into the authoritative state
    pub fn ingest(&self, records: impl IntoIterator<Item = EntityRecord>) -> Result<()> {
        self.store().merge_entities(records)
    }
}

impl Default for OptimisticUpdates<InMemoryEntityStore> {
    fn default() -> Self {
        Self::new(InMemoryEntityStore::default())
    }
}
