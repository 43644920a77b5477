use super::ModelDelta;
use crate::core::{EntityId, EntityRecord, ModelData};
use std::collections::HashMap;

/// Position of a write in the store's history
pub type Sequence = u64;

type FieldStamps = HashMap<(String, String), HashMap<String, Sequence>>;

/// Logical clock shared by optimistic layers and authoritative writes.
///
/// Every layer and every indexer merge takes a tick; each authoritative field
/// remembers the tick that last wrote it. A layer only shows a field the
/// indexer has not written since the layer was applied.
#[derive(Debug, Default, Clone)]
pub struct FieldClock {
    now: Sequence,
    written: HashMap<EntityId, FieldStamps>,
}

impl FieldClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) -> Sequence {
        self.now += 1;
        self.now
    }

    pub fn now(&self) -> Sequence {
        self.now
    }

    /// Record that `sequence` wrote every field of `record`
    pub fn stamp_record(&mut self, record: &EntityRecord, sequence: Sequence) {
        for (namespace, models) in &record.models {
            for (model, data) in models {
                self.stamp(&record.entity_id, namespace, model, data, sequence);
            }
        }
    }

    /// Record that `sequence` wrote every field of `delta`
    pub fn stamp_delta(&mut self, delta: &ModelDelta, sequence: Sequence) {
        self.stamp(&delta.entity_id, &delta.namespace, &delta.model, &delta.data, sequence);
    }

    /// Drop the history of an entity removed from authoritative state
    pub fn forget(&mut self, entity_id: &EntityId) {
        self.written.remove(entity_id);
    }

    /// Sequence of the last authoritative write to one field
    pub fn written_at(
        &self,
        entity_id: &EntityId,
        namespace: &str,
        model: &str,
        field: &str,
    ) -> Option<Sequence> {
        self.written
            .get(entity_id)?
            .get(&(namespace.to_string(), model.to_string()))?
            .get(field)
            .copied()
    }

    /// The part of `delta`, written at `sequence`, that no later
    /// authoritative write has superseded. `None` when nothing is left.
    pub fn visible(&self, delta: &ModelDelta, sequence: Sequence) -> Option<ModelDelta> {
        let Some(fields) = self
            .written
            .get(&delta.entity_id)
            .and_then(|models| models.get(&(delta.namespace.clone(), delta.model.clone())))
        else {
            return Some(delta.clone());
        };

        let data: ModelData = delta
            .data
            .iter()
            .filter(|(field, _)| fields.get(*field).is_none_or(|written| *written < sequence))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();

        if data.is_empty() && !delta.data.is_empty() {
            return None;
        }
        Some(ModelDelta::new(
            delta.entity_id.clone(),
            delta.namespace.clone(),
            delta.model.clone(),
            data,
        ))
    }

    fn stamp(
        &mut self,
        entity_id: &EntityId,
        namespace: &str,
        model: &str,
        data: &ModelData,
        sequence: Sequence,
    ) {
        let fields = self
            .written
            .entry(entity_id.clone())
            .or_default()
            .entry((namespace.to_string(), model.to_string()))
            .or_default();
        for field in data.keys() {
            let stamp = fields.entry(field.clone()).or_insert(sequence);
            *stamp = (*stamp).max(sequence);
        }
    }
}
