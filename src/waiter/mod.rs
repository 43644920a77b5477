//! Entity-change waiters
//!
//! An [`EntityWait`] is a future that resolves with an entity's record the
//! first time a predicate over it holds. The predicate is checked once at
//! registration and again on every store update for that entity. Dropping the
//! future unsubscribes it.

use crate::core::{EntityId, EntityRecord, ObservedView, Result, SyncError};
use crate::storage::{EntityEvent, EntityStore, Listener, Subscription};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{Level, event};

pub type Predicate = Arc<dyn Fn(&EntityRecord) -> bool + Send + Sync>;

type Slot = Arc<Mutex<Option<oneshot::Sender<Result<EntityRecord>>>>>;

/// Deferred result of waiting on one entity
#[must_use = "an EntityWait does nothing unless awaited, and unsubscribes when dropped"]
pub struct EntityWait {
    entity_id: EntityId,
    view: ObservedView,
    receiver: oneshot::Receiver<Result<EntityRecord>>,
    subscription: Option<Subscription>,
}

impl EntityWait {
    /// Subscribe `predicate` to `entity_id` and check it against the current state.
    pub fn register<S>(store: &S, entity_id: EntityId, view: ObservedView, predicate: Predicate) -> Self
    where
        S: EntityStore + ?Sized,
    {
        let (sender, receiver) = oneshot::channel();
        let slot: Slot = Arc::new(Mutex::new(Some(sender)));

        let listener: Listener = {
            let slot = Arc::clone(&slot);
            let predicate = Arc::clone(&predicate);
            Arc::new(move |change: &EntityEvent| match change {
                EntityEvent::Changed(record) => {
                    if !is_resolved(&slot) && predicate(record) {
                        resolve(&slot, Ok(record.clone()));
                    }
                }
                EntityEvent::Closed(entity_id) => {
                    resolve(&slot, Err(SyncError::SubscriptionClosed(entity_id.clone())));
                }
            })
        };

        let subscription = match store.subscribe(&entity_id, view, listener) {
            Ok(subscription) => Some(subscription),
            Err(err) => {
                event!(Level::WARN, entity = %entity_id, error = %err, "entity wait could not subscribe");
                resolve(&slot, Err(err));
                None
            }
        };

        // The condition may already hold, e.g. through the optimistic layer itself.
        if subscription.is_some() && !is_resolved(&slot) {
            match store.read(&entity_id, view) {
                Ok(record) => {
                    let record = record.unwrap_or_else(|| EntityRecord::new(entity_id.clone()));
                    if predicate(&record) {
                        resolve(&slot, Ok(record));
                    }
                }
                Err(err) => resolve(&slot, Err(err)),
            }
        }

        Self {
            entity_id,
            view,
            receiver,
            subscription,
        }
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn view(&self) -> ObservedView {
        self.view
    }

    /// Whether the wait still holds a store subscription
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Abandon the wait and release its subscription
    pub fn cancel(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

impl Future for EntityWait {
    type Output = Result<EntityRecord>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(outcome)) => outcome,
            // Listener dropped without a verdict: the store went away.
            Poll::Ready(Err(_)) => Err(SyncError::SubscriptionClosed(self.entity_id.clone())),
        };
        self.subscription.take();
        event!(
            Level::DEBUG,
            entity = %self.entity_id,
            satisfied = outcome.is_ok(),
            "entity wait finished"
        );
        Poll::Ready(outcome)
    }
}

impl std::fmt::Debug for EntityWait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityWait")
            .field("entity_id", &self.entity_id)
            .field("view", &self.view)
            .field("subscribed", &self.subscription.is_some())
            .finish()
    }
}

fn is_resolved(slot: &Slot) -> bool {
    match slot.lock() {
        Ok(guard) => guard.is_none(),
        Err(poisoned) => poisoned.into_inner().is_none(),
    }
}

fn resolve(slot: &Slot, outcome: Result<EntityRecord>) {
    let sender = match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    if let Some(sender) = sender {
        // The receiver may already be gone if the wait was dropped.
        let _ = sender.send(outcome);
    }
}

/// Resolve once every wait resolves, in input order.
///
/// The first failure wins; the remaining waits are dropped and unsubscribe.
pub async fn wait_all(waits: Vec<EntityWait>) -> Result<Vec<EntityRecord>> {
    futures::future::try_join_all(waits).await
}

/// Apply an optional deadline to a wait
pub async fn with_deadline<F, T>(future: F, deadline: Option<Duration>) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        None => future.await,
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| SyncError::WaitTimeout(limit))?,
    }
}
