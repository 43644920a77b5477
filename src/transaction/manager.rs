// ============================================================================
// Optimistic Layer Stack
// ============================================================================
//
// In-flight transactions are kept as an ordered stack of layers over the
// authoritative state. The projected value of an entity is the authoritative
// record with every live layer's deltas replayed in call order.
//
// Confirmed layers are folded into authoritative state only once every layer
// below them has been resolved, so folding never reorders writes.
//
// Each layer carries the clock tick it was applied at. A field the indexer
// wrote after that tick is neither projected nor folded from the layer.
//
// ============================================================================

use super::{
    FieldClock, ModelDelta, OptimisticTransaction, Patch, Sequence, TransactionId, TransactionState,
};
use crate::core::{EntityId, EntityRecord, Result, SyncError};
use std::collections::HashMap;

/// What a confirm or revert changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Entities whose projection must be recomputed
    pub touched: Vec<EntityId>,
    /// Deltas of confirmed layers that are now permanent, in call order
    pub folded: Vec<SequencedDelta>,
}

/// A delta tagged with the tick of the layer that wrote it
#[derive(Debug, Clone, PartialEq)]
pub struct SequencedDelta {
    pub sequence: Sequence,
    pub delta: ModelDelta,
}

#[derive(Debug, Default)]
pub struct OptimisticLayers {
    layers: Vec<OptimisticTransaction>,
    // Ids are never reused, so resolved ones are remembered.
    resolved: HashMap<TransactionId, TransactionState>,
}

impl OptimisticLayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new pending layer on top of the stack
    ///
    /// # Errors
    /// Returns `InvalidInput` if the id is in flight or was already resolved
    pub fn push(&mut self, id: TransactionId, sequence: Sequence, patch: Patch) -> Result<()> {
        if self.get(&id).is_some() || self.resolved.contains_key(&id) {
            return Err(SyncError::InvalidInput(format!(
                "transaction id {} has already been used",
                id
            )));
        }
        self.layers.push(OptimisticTransaction::new(id, sequence, patch));
        Ok(())
    }

    /// Discard a pending layer. `None` if unknown or already resolved.
    pub fn revert(&mut self, id: &TransactionId) -> Option<Resolution> {
        let index = self.pending_index(id)?;
        let mut layer = self.layers.remove(index);
        layer.revert().ok()?;
        self.resolved.insert(layer.id(), layer.state());

        let mut touched = layer.patch().entity_ids();
        let folded = self.drain_confirmed_prefix();
        extend_unique(&mut touched, &folded);
        Some(Resolution { touched, folded })
    }

    /// Make a pending layer permanent. `None` if unknown or already resolved.
    pub fn confirm(&mut self, id: &TransactionId) -> Option<Resolution> {
        let index = self.pending_index(id)?;
        self.layers[index].confirm().ok()?;

        let mut touched = self.layers[index].patch().entity_ids();
        let folded = self.drain_confirmed_prefix();
        extend_unique(&mut touched, &folded);
        Some(Resolution { touched, folded })
    }

    /// Replay every live layer's deltas for one entity over its base record,
    /// skipping fields `clock` shows were written after the layer.
    pub fn project(
        &self,
        entity_id: &EntityId,
        base: Option<&EntityRecord>,
        clock: &FieldClock,
    ) -> Option<EntityRecord> {
        let mut record = base.cloned();
        for layer in &self.layers {
            for delta in layer.patch().deltas_for(entity_id) {
                if let Some(visible) = clock.visible(delta, layer.sequence()) {
                    visible.apply_to_record(&mut record);
                }
            }
        }
        record
    }

    pub fn get(&self, id: &TransactionId) -> Option<&OptimisticTransaction> {
        self.layers.iter().find(|layer| &layer.id() == id)
    }

    pub fn state(&self, id: &TransactionId) -> Option<TransactionState> {
        self.get(id)
            .map(|layer| layer.state())
            .or_else(|| self.resolved.get(id).copied())
    }

    pub fn pending_ids(&self) -> Vec<TransactionId> {
        self.layers
            .iter()
            .filter(|layer| layer.state().is_pending())
            .map(|layer| layer.id())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn pending_index(&self, id: &TransactionId) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| &layer.id() == id && layer.state().is_pending())
    }

    fn drain_confirmed_prefix(&mut self) -> Vec<SequencedDelta> {
        let split = self
            .layers
            .iter()
            .position(|layer| layer.state().is_pending())
            .unwrap_or(self.layers.len());

        let mut folded = Vec::new();
        for layer in self.layers.drain(..split) {
            self.resolved.insert(layer.id(), layer.state());
            let sequence = layer.sequence();
            folded.extend(
                layer
                    .into_patch()
                    .into_deltas()
                    .into_iter()
                    .map(|delta| SequencedDelta { sequence, delta }),
            );
        }
        folded
    }
}

fn extend_unique(touched: &mut Vec<EntityId>, folded: &[SequencedDelta]) {
    for SequencedDelta { delta, .. } in folded {
        if !touched.contains(&delta.entity_id) {
            touched.push(delta.entity_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(entity: &str, value: serde_json::Value) -> Patch {
        std::iter::once(ModelDelta::new(
            EntityId::from(entity),
            "ns",
            "M",
            value.as_object().cloned().unwrap(),
        ))
        .collect()
    }

    #[test]
    fn test_project_replays_layers_in_order() {
        let mut layers = OptimisticLayers::new();
        layers.push(TransactionId::new(), 1, patch("0x1", json!({"a": 1, "b": 1}))).unwrap();
        layers.push(TransactionId::new(), 2, patch("0x1", json!({"b": 2}))).unwrap();

        let record = layers.project(&EntityId::from("0x1"), None, &FieldClock::new()).unwrap();
        assert_eq!(record.field("ns", "M", "a"), Some(&json!(1)));
        assert_eq!(record.field("ns", "M", "b"), Some(&json!(2)));
    }

    #[test]
    fn test_project_skips_fields_written_after_the_layer() {
        let mut clock = FieldClock::new();
        let mut layers = OptimisticLayers::new();
        let id = TransactionId::new();
        layers
            .push(id, clock.tick(), patch("0x1", json!({"count": 5, "tag": "a"})))
            .unwrap();
        let indexed = patch("0x1", json!({"count": 6}));
        let merged_at = clock.tick();
        clock.stamp_delta(&indexed.deltas()[0], merged_at);

        let base = EntityRecord::with_model(
            EntityId::from("0x1"),
            "ns",
            "M",
            json!({"count": 6}).as_object().cloned().unwrap(),
        );
        let record = layers.project(&EntityId::from("0x1"), Some(&base), &clock).unwrap();
        assert_eq!(record.field("ns", "M", "count"), Some(&json!(6)));
        assert_eq!(record.field("ns", "M", "tag"), Some(&json!("a")));

        let resolution = layers.confirm(&id).unwrap();
        assert_eq!(resolution.folded[0].sequence, 1);
    }

    #[test]
    fn test_revert_removes_only_that_layer() {
        let mut layers = OptimisticLayers::new();
        let first = TransactionId::new();
        let second = TransactionId::new();
        layers.push(first, 1, patch("0x1", json!({"a": 1}))).unwrap();
        layers.push(second, 2, patch("0x1", json!({"b": 2}))).unwrap();

        let resolution = layers.revert(&first).unwrap();
        assert_eq!(resolution.touched, vec![EntityId::from("0x1")]);
        assert!(resolution.folded.is_empty());

        let record = layers.project(&EntityId::from("0x1"), None, &FieldClock::new()).unwrap();
        assert_eq!(record.field("ns", "M", "a"), None);
        assert_eq!(record.field("ns", "M", "b"), Some(&json!(2)));
        assert_eq!(layers.state(&first), Some(TransactionState::Reverted));
    }

    #[test]
    fn test_confirm_waits_for_earlier_layers_before_folding() {
        let mut layers = OptimisticLayers::new();
        let first = TransactionId::new();
        let second = TransactionId::new();
        layers.push(first, 1, patch("0x1", json!({"a": 1}))).unwrap();
        layers.push(second, 2, patch("0x2", json!({"b": 2}))).unwrap();

        let resolution = layers.confirm(&second).unwrap();
        assert!(resolution.folded.is_empty());
        assert_eq!(layers.len(), 2);
        assert_eq!(layers.state(&second), Some(TransactionState::Confirmed));

        let resolution = layers.confirm(&first).unwrap();
        assert_eq!(resolution.folded.len(), 2);
        assert!(layers.is_empty());
        assert_eq!(
            resolution.touched,
            vec![EntityId::from("0x1"), EntityId::from("0x2")]
        );
    }

    #[test]
    fn test_revert_below_confirmed_layer_folds_it() {
        let mut layers = OptimisticLayers::new();
        let first = TransactionId::new();
        let second = TransactionId::new();
        layers.push(first, 1, patch("0x1", json!({"a": 1}))).unwrap();
        layers.push(second, 2, patch("0x2", json!({"b": 2}))).unwrap();

        layers.confirm(&second).unwrap();
        let resolution = layers.revert(&first).unwrap();

        assert_eq!(resolution.folded.len(), 1);
        assert_eq!(resolution.folded[0].delta.entity_id, EntityId::from("0x2"));
        assert!(layers.is_empty());
    }

    #[test]
    fn test_unknown_and_resolved_ids_are_noops() {
        let mut layers = OptimisticLayers::new();
        let id = TransactionId::new();
        assert!(layers.revert(&id).is_none());
        assert!(layers.confirm(&id).is_none());

        layers.push(id, 1, patch("0x1", json!({"a": 1}))).unwrap();
        assert!(layers.confirm(&id).is_some());
        assert!(layers.confirm(&id).is_none());
        assert!(layers.revert(&id).is_none());
    }

    #[test]
    fn test_transaction_ids_are_never_reused() {
        let mut layers = OptimisticLayers::new();
        let id = TransactionId::new();
        layers.push(id, 1, Patch::new()).unwrap();
        assert!(layers.push(id, 2, Patch::new()).is_err());

        layers.revert(&id).unwrap();
        assert!(layers.push(id, 3, Patch::new()).is_err());
    }
}
