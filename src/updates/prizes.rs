use super::{OptimisticUpdates, TransactionHandle, WaitTarget};
use crate::core::{Result, SyncError, derive_entity_id};
use crate::domain::{Model, Prize};
use crate::storage::EntityStore;
use crate::transaction::{ModelDelta, Patch, TransactionId};
use std::collections::HashSet;
use tracing::info_span;

/// Reject prize lists that name the same prize twice
pub(super) fn ensure_unique_prizes(prizes: &[Prize]) -> Result<()> {
    let mut seen = HashSet::with_capacity(prizes.len());
    for prize in prizes {
        if !seen.insert(prize.id) {
            return Err(SyncError::InvalidInput(format!(
                "prize {} appears more than once",
                prize.id
            )));
        }
    }
    Ok(())
}

impl<S> OptimisticUpdates<S>
where
    S: EntityStore + Clone + 'static,
{
    /// Add sponsored prizes to an existing tournament, one entity per prize.
    pub fn apply_tournament_prizes_update(&self, prizes: &[Prize]) -> Result<TransactionHandle<S>> {
        ensure_unique_prizes(prizes)?;

        let transaction_id = TransactionId::new();
        let span = info_span!(
            "optimistic.prizes",
            transaction = %transaction_id,
            prizes = prizes.len()
        );
        let _enter = span.enter();

        let namespace = self.namespace();
        let mut patch = Patch::new();
        let mut targets = Vec::with_capacity(prizes.len());

        for prize in prizes {
            let entity_id = derive_entity_id(&[u128::from(prize.id)]);
            patch.push(ModelDelta::from_model(entity_id.clone(), namespace, prize)?);
            targets.push(WaitTarget::field_equals(
                entity_id,
                namespace,
                Prize::NAME,
                "id",
                u128::from(prize.id),
            ));
        }

        self.commit(transaction_id, patch, targets)
    }
}
