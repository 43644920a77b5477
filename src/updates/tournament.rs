use super::prizes::ensure_unique_prizes;
use super::{OptimisticUpdates, TransactionHandle, WaitTarget};
use crate::core::{Result, SyncError, derive_entity_id};
use crate::domain::{Model, Prize, Tournament};
use crate::storage::EntityStore;
use crate::transaction::{ModelDelta, Patch, TransactionId};
use tracing::info_span;

impl<S> OptimisticUpdates<S>
where
    S: EntityStore + Clone + 'static,
{
    /// Create a tournament together with its initial prizes.
    ///
    /// Prizes live under the compound key `[tournament id, prize id]`.
    pub fn apply_tournament_create_and_add_prizes_update(
        &self,
        tournament: &Tournament,
        prizes: &[Prize],
    ) -> Result<TransactionHandle<S>> {
        if let Some(stray) = prizes.iter().find(|p| p.tournament_id != tournament.id) {
            return Err(SyncError::InvalidInput(format!(
                "prize {} belongs to tournament {}, not {}",
                stray.id, stray.tournament_id, tournament.id
            )));
        }
        ensure_unique_prizes(prizes)?;

        let transaction_id = TransactionId::new();
        let span = info_span!(
            "optimistic.create_tournament",
            transaction = %transaction_id,
            tournament_id = tournament.id,
            prizes = prizes.len()
        );
        let _enter = span.enter();

        let namespace = self.namespace();
        let tournament_key = u128::from(tournament.id);
        let tournament_entity = derive_entity_id(&[tournament_key]);

        let mut patch = Patch::new();
        let mut targets = Vec::with_capacity(prizes.len() + 1);

        patch.push(ModelDelta::from_model(
            tournament_entity.clone(),
            namespace,
            tournament,
        )?);
        targets.push(WaitTarget::field_equals(
            tournament_entity,
            namespace,
            Tournament::NAME,
            "id",
            tournament_key,
        ));

        for prize in prizes {
            let entity_id = derive_entity_id(&[tournament_key, u128::from(prize.id)]);
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
