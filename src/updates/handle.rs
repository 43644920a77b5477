use crate::core::{EntityId, EntityRecord, ObservedView, Result};
use crate::storage::EntityStore;
use crate::transaction::TransactionId;
use crate::waiter::{EntityWait, Predicate, wait_all, with_deadline};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, event};

/// One entity a transaction waits on, and the condition it waits for
#[derive(Clone)]
pub struct WaitTarget {
    entity_id: EntityId,
    predicate: Predicate,
}

impl WaitTarget {
    pub fn new<P>(entity_id: EntityId, predicate: P) -> Self
    where
        P: Fn(&EntityRecord) -> bool + Send + Sync + 'static,
    {
        Self {
            entity_id,
            predicate: Arc::new(predicate),
        }
    }

    /// Satisfied by any state of the entity
    pub fn always(entity_id: EntityId) -> Self {
        Self::new(entity_id, |_| true)
    }

    /// Satisfied when `namespace.model.field` holds the integer `expected`
    pub fn field_equals(
        entity_id: EntityId,
        namespace: &str,
        model: &'static str,
        field: &'static str,
        expected: u128,
    ) -> Self {
        let namespace = namespace.to_string();
        Self::new(entity_id, move |record| {
            record
                .field(&namespace, model, field)
                .and_then(json_integer)
                == Some(expected)
        })
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn is_satisfied_by(&self, record: &EntityRecord) -> bool {
        (self.predicate)(record)
    }
}

impl std::fmt::Debug for WaitTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitTarget")
            .field("entity_id", &self.entity_id)
            .finish_non_exhaustive()
    }
}

/// Read a JSON value as an integer the way the indexer may encode it:
/// a number, a decimal string, or a `0x` hex string.
pub fn json_integer(value: &JsonValue) -> Option<u128> {
    match value {
        JsonValue::Number(number) => number.as_u64().map(u128::from),
        JsonValue::String(raw) => {
            let raw = raw.trim();
            match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
                Some(hex) => u128::from_str_radix(hex, 16).ok(),
                None => raw.parse().ok(),
            }
        }
        _ => None,
    }
}

/// The caller's unit of work for one optimistic transaction.
///
/// Submit the real transaction out of band, then `wait()` and `confirm()` on
/// success or `revert()` on failure.
pub struct TransactionHandle<S> {
    transaction_id: TransactionId,
    store: S,
    targets: Vec<WaitTarget>,
    view: ObservedView,
    deadline: Option<Duration>,
}

impl<S> TransactionHandle<S>
where
    S: EntityStore + 'static,
{
    pub(crate) fn new(
        transaction_id: TransactionId,
        store: S,
        targets: Vec<WaitTarget>,
        view: ObservedView,
        deadline: Option<Duration>,
    ) -> Self {
        Self {
            transaction_id,
            store,
            targets,
            view,
            deadline,
        }
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// Entities this transaction waits on, without duplicates
    pub fn tracked_entities(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = Vec::new();
        for target in &self.targets {
            if !ids.contains(&target.entity_id) {
                ids.push(target.entity_id.clone());
            }
        }
        ids
    }

    pub fn targets(&self) -> &[WaitTarget] {
        &self.targets
    }

    pub fn waiter_count(&self) -> usize {
        self.targets.len()
    }

    /// Resolve once every target's condition holds, records in target order.
    ///
    /// Waiters are registered when this is called; each call is independent
    /// and none of them mutates the store.
    pub fn wait(&self) -> BoxFuture<'static, Result<Vec<EntityRecord>>> {
        let waits: Vec<EntityWait> = self
            .targets
            .iter()
            .map(|target| {
                EntityWait::register(
                    &self.store,
                    target.entity_id.clone(),
                    self.view,
                    Arc::clone(&target.predicate),
                )
            })
            .collect();
        let deadline = self.deadline;
        let transaction_id = self.transaction_id;

        async move {
            let outcome = with_deadline(wait_all(waits), deadline).await;
            match &outcome {
                Ok(records) => event!(
                    Level::DEBUG,
                    transaction = %transaction_id,
                    entities = records.len(),
                    "transaction observed"
                ),
                Err(err) => event!(
                    Level::WARN,
                    transaction = %transaction_id,
                    error = %err,
                    "transaction wait failed"
                ),
            }
            outcome
        }
        .boxed()
    }

    /// Discard the optimistic effect. Already resolved transactions are left alone.
    pub fn revert(&self) -> Result<()> {
        self.store.revert_optimistic_update(&self.transaction_id)?;
        Ok(())
    }

    /// Make the optimistic effect permanent. Already resolved transactions are left alone.
    pub fn confirm(&self) -> Result<()> {
        self.store.confirm_transaction(&self.transaction_id)?;
        Ok(())
    }
}

impl<S> std::fmt::Debug for TransactionHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("transaction_id", &self.transaction_id)
            .field("targets", &self.targets)
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}
