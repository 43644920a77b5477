use super::{OptimisticUpdates, TransactionHandle, WaitTarget};
use crate::config::ClaimConfirmation;
use crate::core::{Result, derive_entity_id};
use crate::domain::{Model, PrizeClaim, PrizeType};
use crate::storage::EntityStore;
use crate::transaction::{ModelDelta, Patch, TransactionId};
use serde_json::Value as JsonValue;
use tracing::info_span;

impl<S> OptimisticUpdates<S>
where
    S: EntityStore + Clone + 'static,
{
    /// Mark prizes of a tournament as claimed.
    ///
    /// All claims share the tournament's entity, so the store keeps the
    /// fields of the last tag while the transaction keeps one delta per tag.
    /// An empty tag list applies an empty transaction whose wait resolves at once.
    pub fn apply_tournament_claim_prizes_update(
        &self,
        tournament_id: u64,
        prize_types: &[PrizeType],
    ) -> Result<TransactionHandle<S>> {
        let transaction_id = TransactionId::new();
        let span = info_span!(
            "optimistic.claim",
            transaction = %transaction_id,
            tournament_id,
            claims = prize_types.len()
        );
        let _enter = span.enter();

        let namespace = self.namespace();
        let entity_id = derive_entity_id(&[u128::from(tournament_id)]);

        let patch = prize_types
            .iter()
            .map(|prize_type| {
                let claim = PrizeClaim {
                    tournament_id,
                    prize_type: *prize_type,
                    claimed: true,
                };
                ModelDelta::from_model(entity_id.clone(), namespace, &claim)
            })
            .collect::<Result<Patch>>()?;

        let target = match self.config().claim_confirmation {
            // Nothing was claimed, so there is nothing to observe.
            ClaimConfirmation::Observed if !prize_types.is_empty() => {
                let namespace = namespace.to_string();
                WaitTarget::new(entity_id, move |record| {
                    record.field(&namespace, PrizeClaim::NAME, "claimed")
                        == Some(&JsonValue::Bool(true))
                })
            }
            _ => WaitTarget::always(entity_id),
        };

        self.commit(transaction_id, patch, vec![target])
    }
}
