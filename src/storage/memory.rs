use super::{EntityEvent, EntityStore, Listener, SubscriberRegistry, Subscription};
use crate::core::{Entities, EntityId, EntityRecord, ObservedView, Result, SyncError};
use crate::transaction::{
    FieldClock, ModelDelta, OptimisticLayers, Patch, SequencedDelta, TransactionId, TransactionState,
};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tracing::{Level, event};

/// In-memory entity store holding the indexer's authoritative state plus the
/// optimistic layers of in-flight transactions.
///
/// Clone-friendly via Arc; all clones share one store.
#[derive(Clone, Default)]
pub struct InMemoryEntityStore {
    state: Arc<RwLock<StoreState>>,
    subscribers: Arc<Mutex<SubscriberRegistry>>,
}

#[derive(Default)]
struct StoreState {
    authoritative: Entities,
    /// Cache of authoritative + layers, kept current for every touched entity
    projected: Entities,
    layers: OptimisticLayers,
    /// Orders layers against authoritative field writes
    clock: FieldClock,
    closed: bool,
}

/// Both views of one entity right after an update
struct EntityChange {
    entity_id: EntityId,
    projected: EntityRecord,
    authoritative: EntityRecord,
}

impl StoreState {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(SyncError::StoreUnavailable("entity store is closed".into()));
        }
        Ok(())
    }

    fn view(&self, view: ObservedView) -> &Entities {
        match view {
            ObservedView::Projected => &self.projected,
            ObservedView::Authoritative => &self.authoritative,
        }
    }

    fn reproject(&mut self, entity_ids: &[EntityId]) {
        for entity_id in entity_ids {
            match self
                .layers
                .project(entity_id, self.authoritative.get(entity_id), &self.clock)
            {
                Some(record) => {
                    self.projected.insert(entity_id.clone(), record);
                }
                None => {
                    self.projected.remove(entity_id);
                }
            }
        }
    }

    // Fields the indexer rewrote after the layer keep the indexer's value.
    fn fold(&mut self, folded: &[SequencedDelta]) {
        for SequencedDelta { sequence, delta } in folded {
            if let Some(visible) = self.clock.visible(delta, *sequence) {
                visible.apply_to(&mut self.authoritative);
                self.clock.stamp_delta(&visible, *sequence);
            }
        }
    }

    fn merge_authoritative(&mut self, record: EntityRecord) {
        let sequence = self.clock.tick();
        self.clock.stamp_record(&record, sequence);
        merge_authoritative(&mut self.authoritative, record);
    }

    fn changes(&self, entity_ids: &[EntityId]) -> Vec<EntityChange> {
        entity_ids
            .iter()
            .map(|entity_id| EntityChange {
                entity_id: entity_id.clone(),
                projected: record_or_empty(&self.projected, entity_id),
                authoritative: record_or_empty(&self.authoritative, entity_id),
            })
            .collect()
    }
}

fn record_or_empty(entities: &Entities, entity_id: &EntityId) -> EntityRecord {
    entities
        .get(entity_id)
        .cloned()
        .unwrap_or_else(|| EntityRecord::new(entity_id.clone()))
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with authoritative records
    pub fn with_entities(records: impl IntoIterator<Item = EntityRecord>) -> Self {
        let mut state = StoreState::default();
        for record in records {
            state.merge_authoritative(record);
        }
        state.projected = state.authoritative.clone();
        Self {
            state: Arc::new(RwLock::new(state)),
            subscribers: Arc::new(Mutex::new(SubscriberRegistry::new())),
        }
    }

    /// Merge records observed from the indexer into authoritative state.
    ///
    /// Same rules as optimistic deltas: create, insert model, or shallow merge.
    /// Fields written here take precedence over layers applied before the merge,
    /// both in the projection and when those layers are later confirmed.
    pub fn merge_entities(&self, records: impl IntoIterator<Item = EntityRecord>) -> Result<()> {
        let changes = {
            let mut state = self.state.write()?;
            state.ensure_open()?;

            let mut touched = Vec::new();
            for record in records {
                if !touched.contains(&record.entity_id) {
                    touched.push(record.entity_id.clone());
                }
                state.merge_authoritative(record);
            }
            state.reproject(&touched);
            state.changes(&touched)
        };

        event!(Level::DEBUG, entities = changes.len(), "authoritative entities merged");
        self.notify(changes)
    }

    /// Drop entities from authoritative state. Optimistic layers over them stay.
    pub fn remove_entities(&self, entity_ids: &[EntityId]) -> Result<()> {
        let changes = {
            let mut state = self.state.write()?;
            state.ensure_open()?;
            for entity_id in entity_ids {
                state.authoritative.remove(entity_id);
                state.clock.forget(entity_id);
            }
            state.reproject(entity_ids);
            state.changes(entity_ids)
        };

        event!(Level::DEBUG, entities = changes.len(), "authoritative entities removed");
        self.notify(changes)
    }

    /// Shut the store down. Pending subscribers receive [`EntityEvent::Closed`].
    pub fn close(&self) -> Result<()> {
        {
            let mut state = self.state.write()?;
            if state.closed {
                return Ok(());
            }
            state.closed = true;
        }

        let drained = self.subscribers.lock()?.drain();
        event!(Level::DEBUG, subscribers = drained.len(), "entity store closed");
        for (entity_id, listener) in drained {
            listener(&EntityEvent::Closed(entity_id));
        }
        Ok(())
    }

    pub fn is_closed(&self) -> Result<bool> {
        Ok(self.state.read()?.closed)
    }

    pub fn subscriber_count(&self, entity_id: &EntityId) -> Result<usize> {
        Ok(self.subscribers.lock()?.count(entity_id))
    }

    pub fn total_subscribers(&self) -> Result<usize> {
        Ok(self.subscribers.lock()?.total())
    }

    pub fn pending_transactions(&self) -> Result<Vec<TransactionId>> {
        Ok(self.state.read()?.layers.pending_ids())
    }

    pub fn transaction_state(&self, transaction_id: &TransactionId) -> Result<Option<TransactionState>> {
        Ok(self.state.read()?.layers.state(transaction_id))
    }

    /// Deltas of a live (pending or not yet folded) transaction
    pub fn transaction_deltas(&self, transaction_id: &TransactionId) -> Result<Option<Vec<ModelDelta>>> {
        Ok(self
            .state
            .read()?
            .layers
            .get(transaction_id)
            .map(|layer| layer.patch().deltas().to_vec()))
    }

    // Listeners run after every lock is released, so they may read the store.
    fn notify(&self, changes: Vec<EntityChange>) -> Result<()> {
        for change in changes {
            let listeners = self.subscribers.lock()?.listeners_for(&change.entity_id);
            if listeners.is_empty() {
                continue;
            }
            let projected = EntityEvent::Changed(change.projected);
            let authoritative = EntityEvent::Changed(change.authoritative);
            for (view, listener) in listeners {
                match view {
                    ObservedView::Projected => listener(&projected),
                    ObservedView::Authoritative => listener(&authoritative),
                }
            }
        }
        Ok(())
    }
}

fn merge_authoritative(entities: &mut Entities, record: EntityRecord) {
    match entities.get_mut(&record.entity_id) {
        Some(existing) => existing.merge_record(&record),
        None => {
            entities.insert(record.entity_id.clone(), record);
        }
    }
}

fn unsubscriber(
    registry: Weak<Mutex<SubscriberRegistry>>,
    entity_id: EntityId,
    id: u64,
) -> impl FnOnce() + Send + 'static {
    move || {
        let Some(registry) = registry.upgrade() else {
            return;
        };
        if let Ok(mut registry) = registry.lock() {
            registry.remove(&entity_id, id);
        }
    }
}

impl EntityStore for InMemoryEntityStore {
    fn read(&self, entity_id: &EntityId, view: ObservedView) -> Result<Option<EntityRecord>> {
        let state = self.state.read()?;
        state.ensure_open()?;
        Ok(state.view(view).get(entity_id).cloned())
    }

    fn snapshot(&self, view: ObservedView) -> Result<Entities> {
        let state = self.state.read()?;
        state.ensure_open()?;
        Ok(state.view(view).clone())
    }

    fn apply_optimistic_patch(&self, transaction_id: TransactionId, patch: Patch) -> Result<()> {
        let changes = {
            let mut state = self.state.write()?;
            state.ensure_open()?;

            let touched = patch.entity_ids();
            let deltas = patch.len();
            let sequence = state.clock.tick();
            state.layers.push(transaction_id, sequence, patch)?;
            state.reproject(&touched);

            event!(
                Level::DEBUG,
                transaction = %transaction_id,
                deltas,
                entities = touched.len(),
                "optimistic update applied"
            );
            state.changes(&touched)
        };
        self.notify(changes)
    }

    fn revert_optimistic_update(&self, transaction_id: &TransactionId) -> Result<bool> {
        let changes = {
            let mut state = self.state.write()?;
            state.ensure_open()?;

            let Some(resolution) = state.layers.revert(transaction_id) else {
                event!(
                    Level::DEBUG,
                    transaction = %transaction_id,
                    "revert ignored: transaction unknown or already resolved"
                );
                return Ok(false);
            };
            state.fold(&resolution.folded);
            state.reproject(&resolution.touched);

            event!(
                Level::DEBUG,
                transaction = %transaction_id,
                entities = resolution.touched.len(),
                "optimistic update reverted"
            );
            state.changes(&resolution.touched)
        };
        self.notify(changes)?;
        Ok(true)
    }

    fn confirm_transaction(&self, transaction_id: &TransactionId) -> Result<bool> {
        let changes = {
            let mut state = self.state.write()?;
            state.ensure_open()?;

            let Some(resolution) = state.layers.confirm(transaction_id) else {
                event!(
                    Level::DEBUG,
                    transaction = %transaction_id,
                    "confirm ignored: transaction unknown or already resolved"
                );
                return Ok(false);
            };
            state.fold(&resolution.folded);
            state.reproject(&resolution.touched);

            event!(
                Level::DEBUG,
                transaction = %transaction_id,
                folded = resolution.folded.len(),
                "optimistic transaction confirmed"
            );
            state.changes(&resolution.touched)
        };
        self.notify(changes)?;
        Ok(true)
    }

    fn subscribe(
        &self,
        entity_id: &EntityId,
        view: ObservedView,
        listener: Listener,
    ) -> Result<Subscription> {
        // Held across the insert so a concurrent close() drains this listener.
        let state = self.state.read()?;
        state.ensure_open()?;
        let id = self.subscribers.lock()?.insert(entity_id, view, listener);
        drop(state);
        Ok(Subscription::new(
            id,
            entity_id.clone(),
            unsubscriber(Arc::downgrade(&self.subscribers), entity_id.clone(), id),
        ))
    }
}
