//! Entity identifier derivation.
//!
//! Entities are addressed by the Poseidon hash of their key tuple, the same
//! way the on-chain world and its indexer address them, so an id computed
//! here matches the id of the row the indexer later delivers.

use super::EntityId;
use starknet_crypto::{Felt, poseidon_hash_many};

/// Derive the entity id for an ordered tuple of business keys.
///
/// Deterministic; the order of keys matters.
pub fn derive_entity_id(keys: &[u128]) -> EntityId {
    let felts: Vec<Felt> = keys.iter().map(|key| Felt::from(*key)).collect();
    EntityId::new(format!("{:#x}", poseidon_hash_many(&felts)))
}
