use super::{OptimisticUpdates, TransactionHandle, WaitTarget};
use crate::core::{Result, SyncError, derive_entity_id};
use crate::domain::{EntryCount, Model, Registration};
use crate::storage::EntityStore;
use crate::transaction::{ModelDelta, Patch, TransactionId};
use tracing::info_span;

impl<S> OptimisticUpdates<S>
where
    S: EntityStore + Clone + 'static,
{
    /// Register one entry: bump the tournament's entry count and add the
    /// registration record for the new game token.
    pub fn apply_tournament_entry_update(
        &self,
        tournament_id: u64,
        new_entry_count: u32,
        game_count: u64,
    ) -> Result<TransactionHandle<S>> {
        if new_entry_count == 0 {
            return Err(SyncError::InvalidInput(
                "entry count after registering must be at least 1".into(),
            ));
        }

        let transaction_id = TransactionId::new();
        let span = info_span!(
            "optimistic.entry",
            transaction = %transaction_id,
            tournament_id,
            new_entry_count,
            game_count
        );
        let _enter = span.enter();

        let namespace = self.namespace();
        let count_id = derive_entity_id(&[u128::from(tournament_id)]);
        let registration_id =
            derive_entity_id(&[u128::from(tournament_id), u128::from(game_count)]);

        let entry_count = EntryCount {
            tournament_id,
            count: new_entry_count,
        };
        let registration = Registration {
            tournament_id,
            game_token_id: 0,
            entry_number: new_entry_count,
            has_submitted: false,
        };

        let patch: Patch = [
            ModelDelta::from_model(count_id.clone(), namespace, &entry_count)?,
            ModelDelta::from_model(registration_id.clone(), namespace, &registration)?,
        ]
        .into_iter()
        .collect();

        let targets = vec![
            WaitTarget::field_equals(
                count_id,
                namespace,
                EntryCount::NAME,
                "count",
                u128::from(new_entry_count),
            ),
            WaitTarget::field_equals(
                registration_id,
                namespace,
                Registration::NAME,
                "entry_number",
                u128::from(new_entry_count),
            ),
        ];

        self.commit(transaction_id, patch, targets)
    }
}
