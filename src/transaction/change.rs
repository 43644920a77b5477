// ============================================================================
// Model Deltas
// ============================================================================
//
// A ModelDelta is one field-level update to one model of one entity. A Patch
// is the ordered batch of deltas a single transaction applies. Both are plain
// values: a layer can be replayed over any base, which is what makes revert
// exact rather than a best-effort inverse.
//
// ============================================================================

use crate::core::{Entities, EntityId, EntityRecord, MergeCase, ModelData, Result, SyncError};
use crate::domain::Model;

/// One namespaced model update for one entity
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDelta {
    pub entity_id: EntityId,
    pub namespace: String,
    pub model: String,
    pub data: ModelData,
}

impl ModelDelta {
    pub fn new(
        entity_id: EntityId,
        namespace: impl Into<String>,
        model: impl Into<String>,
        data: ModelData,
    ) -> Self {
        Self {
            entity_id,
            namespace: namespace.into(),
            model: model.into(),
            data,
        }
    }

    /// Build a delta from a typed model.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the model does not serialize to a JSON object
    pub fn from_model<M: Model>(
        entity_id: EntityId,
        namespace: impl Into<String>,
        model: &M,
    ) -> Result<Self> {
        match serde_json::to_value(model)? {
            serde_json::Value::Object(data) => Ok(Self::new(entity_id, namespace, M::NAME, data)),
            other => Err(SyncError::InvalidInput(format!(
                "model '{}' must serialize to an object, got {}",
                M::NAME,
                other
            ))),
        }
    }

    /// Apply this delta to an entity map.
    pub fn apply_to(&self, entities: &mut Entities) -> MergeCase {
        match entities.get_mut(&self.entity_id) {
            Some(record) => record.merge_model(&self.namespace, &self.model, &self.data),
            None => {
                entities.insert(
                    self.entity_id.clone(),
                    EntityRecord::with_model(
                        self.entity_id.clone(),
                        self.namespace.clone(),
                        self.model.clone(),
                        self.data.clone(),
                    ),
                );
                MergeCase::Create
            }
        }
    }

    /// Apply this delta to a single (possibly absent) record.
    pub fn apply_to_record(&self, record: &mut Option<EntityRecord>) -> MergeCase {
        match record {
            Some(record) => record.merge_model(&self.namespace, &self.model, &self.data),
            None => {
                *record = Some(EntityRecord::with_model(
                    self.entity_id.clone(),
                    self.namespace.clone(),
                    self.model.clone(),
                    self.data.clone(),
                ));
                MergeCase::Create
            }
        }
    }
}

/// Ordered batch of deltas applied atomically under one transaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    deltas: Vec<ModelDelta>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: ModelDelta) {
        self.deltas.push(delta);
    }

    pub fn deltas(&self) -> &[ModelDelta] {
        &self.deltas
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Entities touched by this patch, first-touch order, no duplicates
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = Vec::new();
        for delta in &self.deltas {
            if !ids.contains(&delta.entity_id) {
                ids.push(delta.entity_id.clone());
            }
        }
        ids
    }

    pub fn touches(&self, entity_id: &EntityId) -> bool {
        self.deltas.iter().any(|delta| &delta.entity_id == entity_id)
    }

    /// Deltas for one entity, in application order
    pub fn deltas_for<'a>(&'a self, entity_id: &'a EntityId) -> impl Iterator<Item = &'a ModelDelta> {
        self.deltas
            .iter()
            .filter(move |delta| &delta.entity_id == entity_id)
    }

    pub fn into_deltas(self) -> Vec<ModelDelta> {
        self.deltas
    }
}

impl FromIterator<ModelDelta> for Patch {
    fn from_iter<I: IntoIterator<Item = ModelDelta>>(iter: I) -> Self {
        Self {
            deltas: iter.into_iter().collect(),
        }
    }
}
