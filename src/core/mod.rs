pub mod error;
pub mod keys;
pub mod types;

pub use error::{Result, SyncError};
pub use keys::derive_entity_id;
pub use types::{
    Entities, EntityId, EntityRecord, MergeCase, ModelData, NamespacedModels, ObservedView,
};
