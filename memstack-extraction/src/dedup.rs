//! [`HashDeduplicator`] — exact-duplicate detection for extracted
//! entities, grounded 1:1 on
//! `original_source/.../dedup/hash_deduplicator.py`: `SHA256(name + "|" +
//! entity_type + "|" + summary)`, first occurrence wins.

use memstack_core::model::EntityNode;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Computes a stable identity hash for an entity and uses it to find
/// exact duplicates, either within one batch or against an existing set.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashDeduplicator;

impl HashDeduplicator {
    /// Construct a new deduplicator. Stateless — the hash is a pure
    /// function of the entity's identity fields.
    pub fn new() -> Self {
        Self
    }

    /// `SHA256(name + "|" + entity_type + "|" + summary)`, hex-encoded.
    /// An absent summary normalizes to the empty string.
    pub fn compute_hash(&self, name: &str, entity_type: &str, summary: Option<&str>) -> String {
        let summary = summary.unwrap_or("");
        let content = format!("{name}|{entity_type}|{summary}");
        let digest = Sha256::digest(content.as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn hash_of(&self, entity: &EntityNode) -> String {
        self.compute_hash(&entity.name, &entity.entity_type, entity.summary.as_deref())
    }

    /// Remove exact duplicates within one batch, preserving first
    /// occurrences (spec.md §8 "Deduplication determinism":
    /// `dedupe(dedupe(xs)) == dedupe(xs)`).
    pub fn dedupe(&self, entities: Vec<EntityNode>) -> Vec<EntityNode> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut unique = Vec::with_capacity(entities.len());
        for entity in entities {
            let hash = self.hash_of(&entity);
            if seen.insert(hash) {
                unique.push(entity);
            } else {
                tracing::debug!(name = %entity.name, entity_type = %entity.entity_type, "duplicate entity dropped");
            }
        }
        unique
    }

    /// Deduplicate `new_entities` against an already-persisted set,
    /// returning the genuinely new entities plus a `name -> existing uuid`
    /// map for every exact match (spec.md §4.4 step 4).
    pub fn dedupe_against(
        &self,
        new_entities: Vec<EntityNode>,
        existing_entities: &[EntityNode],
    ) -> (Vec<EntityNode>, HashMap<String, Uuid>) {
        if existing_entities.is_empty() {
            return (new_entities, HashMap::new());
        }

        let existing_hashes: HashMap<String, Uuid> = existing_entities
            .iter()
            .map(|e| (self.hash_of(e), e.id))
            .collect();

        let mut unique = Vec::with_capacity(new_entities.len());
        let mut duplicate_map = HashMap::new();

        for entity in new_entities {
            let hash = self.hash_of(&entity);
            if let Some(existing_uuid) = existing_hashes.get(&hash) {
                duplicate_map.insert(entity.name.clone(), *existing_uuid);
            } else {
                unique.push(entity);
            }
        }

        (unique, duplicate_map)
    }
}
