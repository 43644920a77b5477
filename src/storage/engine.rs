use super::{Listener, Subscription};
use crate::core::{Entities, EntityId, EntityRecord, ObservedView, Result};
use crate::transaction::{Draft, Patch, TransactionId};
use crate::waiter::EntityWait;
use std::sync::Arc;

/// Entity store trait - the contract the optimistic engine and waiters consume
pub trait EntityStore: Send + Sync {
    /// Read one entity in the given view
    fn read(&self, entity_id: &EntityId, view: ObservedView) -> Result<Option<EntityRecord>>;

    /// Snapshot of every entity in the given view
    fn snapshot(&self, view: ObservedView) -> Result<Entities>;

    /// Apply a patch as one revertible layer attributed to `transaction_id`
    fn apply_optimistic_patch(&self, transaction_id: TransactionId, patch: Patch) -> Result<()>;

    /// Discard a layer. `Ok(false)` if the id is unknown or already resolved.
    fn revert_optimistic_update(&self, transaction_id: &TransactionId) -> Result<bool>;

    /// Make a layer permanent. `Ok(false)` if the id is unknown or already resolved.
    fn confirm_transaction(&self, transaction_id: &TransactionId) -> Result<bool>;

    /// Register a listener for every update touching `entity_id`
    fn subscribe(
        &self,
        entity_id: &EntityId,
        view: ObservedView,
        listener: Listener,
    ) -> Result<Subscription>;

    /// Read one entity as readers currently see it
    fn entity(&self, entity_id: &EntityId) -> Result<Option<EntityRecord>> {
        self.read(entity_id, ObservedView::Projected)
    }

    /// Compose a patch through a draft and apply it atomically.
    ///
    /// If the mutator fails nothing is applied.
    fn apply_optimistic_update<F>(&self, transaction_id: TransactionId, mutator: F) -> Result<()>
    where
        F: FnOnce(&mut Draft) -> Result<()>,
        Self: Sized,
    {
        let mut draft = Draft::new(self.snapshot(ObservedView::Projected)?);
        mutator(&mut draft)?;
        self.apply_optimistic_patch(transaction_id, draft.into_patch())
    }

    /// Wait until `predicate` holds for the projected state of `entity_id`
    fn wait_for_entity_change<P>(&self, entity_id: EntityId, predicate: P) -> EntityWait
    where
        P: Fn(&EntityRecord) -> bool + Send + Sync + 'static,
        Self: Sized,
    {
        EntityWait::register(self, entity_id, ObservedView::Projected, Arc::new(predicate))
    }

    /// Wait until `predicate` holds for the authoritative state of `entity_id`
    fn wait_for_authoritative_change<P>(&self, entity_id: EntityId, predicate: P) -> EntityWait
    where
        P: Fn(&EntityRecord) -> bool + Send + Sync + 'static,
        Self: Sized,
    {
        EntityWait::register(self, entity_id, ObservedView::Authoritative, Arc::new(predicate))
    }
}
