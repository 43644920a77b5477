use crate::core::{EntityId, EntityRecord, ObservedView};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What a subscriber is told about its entity
#[derive(Debug, Clone, PartialEq)]
pub enum EntityEvent {
    /// The entity received an update; carries the record in the subscribed
    /// view (empty when the entity is absent)
    Changed(EntityRecord),
    /// The store shut down; no further events will arrive
    Closed(EntityId),
}

pub type Listener = Arc<dyn Fn(&EntityEvent) + Send + Sync>;

/// Live registration of a listener.
///
/// Dropping the handle unsubscribes; [`Subscription::unsubscribe`] does it
/// explicitly.
pub struct Subscription {
    id: u64,
    entity_id: EntityId,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(id: u64, entity_id: EntityId, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            entity_id,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("entity_id", &self.entity_id)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

struct Subscriber {
    id: u64,
    view: ObservedView,
    listener: Listener,
}

/// Per-entity listener table shared by store implementations
#[derive(Default)]
pub struct SubscriberRegistry {
    next_id: u64,
    by_entity: HashMap<EntityId, Vec<Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity_id: &EntityId, view: ObservedView, listener: Listener) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.by_entity
            .entry(entity_id.clone())
            .or_default()
            .push(Subscriber { id, view, listener });
        id
    }

    pub fn remove(&mut self, entity_id: &EntityId, id: u64) -> bool {
        let Some(subscribers) = self.by_entity.get_mut(entity_id) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != id);
        let removed = subscribers.len() != before;
        if subscribers.is_empty() {
            self.by_entity.remove(entity_id);
        }
        removed
    }

    /// Listeners for one entity, paired with the view each one observes
    pub fn listeners_for(&self, entity_id: &EntityId) -> Vec<(ObservedView, Listener)> {
        self.by_entity
            .get(entity_id)
            .map(|subscribers| {
                subscribers
                    .iter()
                    .map(|subscriber| (subscriber.view, Arc::clone(&subscriber.listener)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn count(&self, entity_id: &EntityId) -> usize {
        self.by_entity.get(entity_id).map_or(0, Vec::len)
    }

    pub fn total(&self) -> usize {
        self.by_entity.values().map(Vec::len).sum()
    }

    /// Remove every subscriber, returning their listeners
    pub fn drain(&mut self) -> Vec<(EntityId, Listener)> {
        self.by_entity
            .drain()
            .flat_map(|(entity_id, subscribers)| {
                subscribers
                    .into_iter()
                    .map(move |subscriber| (entity_id.clone(), subscriber.listener))
            })
            .collect()
    }
}
