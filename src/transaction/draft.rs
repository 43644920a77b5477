use super::{ModelDelta, Patch};
use crate::core::{Entities, EntityId, EntityRecord, MergeCase, Result};
use crate::domain::Model;

/// Transaction-scoped overlay handed to an optimistic mutator.
///
/// Reads see the store's projected snapshot plus whatever this draft already
/// applied. Nothing reaches the store until the mutator returns `Ok`.
pub struct Draft {
    view: Entities,
    patch: Patch,
}

impl Draft {
    pub(crate) fn new(view: Entities) -> Self {
        Self {
            view,
            patch: Patch::new(),
        }
    }

    pub fn entity(&self, entity_id: &EntityId) -> Option<&EntityRecord> {
        self.view.get(entity_id)
    }

    pub fn apply(&mut self, delta: ModelDelta) -> MergeCase {
        let case = delta.apply_to(&mut self.view);
        self.patch.push(delta);
        case
    }

    pub fn apply_model<M: Model>(
        &mut self,
        entity_id: EntityId,
        namespace: &str,
        model: &M,
    ) -> Result<MergeCase> {
        let delta = ModelDelta::from_model(entity_id, namespace, model)?;
        Ok(self.apply(delta))
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn into_patch(self) -> Patch {
        self.patch
    }
}
