use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Field map of one model instance, as the indexer delivers it.
pub type ModelData = serde_json::Map<String, JsonValue>;

/// Namespace -> model name -> model data.
pub type NamespacedModels = BTreeMap<String, BTreeMap<String, ModelData>>;

/// Entity map shared by snapshots, drafts and the store.
///
/// `im::HashMap` makes cloning a snapshot O(1), which drafts rely on.
pub type Entities = im::HashMap<EntityId, EntityRecord>;

/// Opaque identifier of one entity in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Which state a reader observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservedView {
    /// Authoritative state with every in-flight optimistic layer applied on top
    #[default]
    Projected,
    /// Only what the indexer (or a confirmed transaction) has established
    Authoritative,
}

/// How a model update landed on an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeCase {
    /// The entity did not exist and was created with exactly this model
    Create,
    /// The entity existed but lacked this namespace/model
    InsertModel,
    /// The model existed and was shallow-merged field by field
    Merge,
}

/// One entity and all models tracked for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    #[serde(rename = "entityId")]
    pub entity_id: EntityId,
    pub models: NamespacedModels,
}

impl EntityRecord {
    /// An entity with no models; this is how absent entities are observed.
    pub fn new(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            models: BTreeMap::new(),
        }
    }

    pub fn with_model(
        entity_id: EntityId,
        namespace: impl Into<String>,
        model: impl Into<String>,
        data: ModelData,
    ) -> Self {
        let mut record = Self::new(entity_id);
        record
            .models
            .entry(namespace.into())
            .or_default()
            .insert(model.into(), data);
        record
    }

    pub fn is_empty(&self) -> bool {
        self.models.values().all(|models| models.is_empty())
    }

    pub fn model(&self, namespace: &str, model: &str) -> Option<&ModelData> {
        self.models.get(namespace)?.get(model)
    }

    pub fn has_model(&self, namespace: &str, model: &str) -> bool {
        self.model(namespace, model).is_some()
    }

    pub fn field(&self, namespace: &str, model: &str, field: &str) -> Option<&JsonValue> {
        self.model(namespace, model)?.get(field)
    }

    /// Insert or shallow-merge one model into this entity.
    ///
    /// Never returns [`MergeCase::Create`]; creation is decided by whoever owns
    /// the entity map.
    pub fn merge_model(&mut self, namespace: &str, model: &str, data: &ModelData) -> MergeCase {
        let models = self.models.entry(namespace.to_string()).or_default();
        match models.get_mut(model) {
            Some(existing) => {
                for (field, value) in data {
                    existing.insert(field.clone(), value.clone());
                }
                MergeCase::Merge
            }
            None => {
                models.insert(model.to_string(), data.clone());
                MergeCase::InsertModel
            }
        }
    }

    /// Merge every model of `other` into this record.
    pub fn merge_record(&mut self, other: &EntityRecord) {
        for (namespace, models) in &other.models {
            for (model, data) in models {
                self.merge_model(namespace, model, data);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: JsonValue) -> ModelData {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_merge_model_inserts_sibling() {
        let mut record = EntityRecord::with_model(
            EntityId::from("0x1"),
            "ns",
            "Tournament",
            data(json!({"id": 1})),
        );

        let case = record.merge_model("ns", "Prize", &data(json!({"id": 4})));

        assert_eq!(case, MergeCase::InsertModel);
        assert_eq!(record.field("ns", "Tournament", "id"), Some(&json!(1)));
        assert_eq!(record.field("ns", "Prize", "id"), Some(&json!(4)));
    }

    #[test]
    fn test_merge_model_is_shallow_field_merge() {
        let mut record =
            EntityRecord::with_model(EntityId::from("0x1"), "ns", "M", data(json!({"a": 1, "b": 2})));

        let case = record.merge_model("ns", "M", &data(json!({"b": 3, "c": 4})));

        assert_eq!(case, MergeCase::Merge);
        assert_eq!(
            record.model("ns", "M"),
            Some(&data(json!({"a": 1, "b": 3, "c": 4})))
        );
    }

    #[test]
    fn test_empty_record() {
        let record = EntityRecord::new(EntityId::from("0x2"));
        assert!(record.is_empty());
        assert!(!record.has_model("ns", "M"));
    }

    #[test]
    fn test_record_uses_indexer_json_shape() {
        let record = EntityRecord::with_model(EntityId::from("0x2"), "ns", "M", data(json!({"a": 1})));
        let encoded = serde_json::to_value(&record).unwrap();
        assert_eq!(
            encoded,
            json!({"entityId": "0x2", "models": {"ns": {"M": {"a": 1}}}})
        );

        let decoded: EntityRecord = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_entity_id_serializes_as_plain_string() {
        let id = EntityId::from("0xabc");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("0xabc"));
    }
}
