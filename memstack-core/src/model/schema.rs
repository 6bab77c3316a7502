//! [`SchemaContext`] — the per-project catalog of allowed entity/edge types.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// An entity-type descriptor. `id == 0` is always the generic `Entity`
/// type (spec.md §4.3 bootstrap).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityTypeDescriptor {
    /// Numeric id, stable once assigned. Ids 0..=6 are the bootstrap
    /// defaults (`Entity, Person, Organization, Location, Concept, Event,
    /// Artifact`).
    pub id: u32,
    /// Type name.
    pub name: String,
    /// Human-readable description, fed to the extraction prompt.
    pub description: String,
}

/// Key into the edge-type map: an ordered `(source_type, target_type)` pair.
pub type EdgeTypeKey = (String, String);

/// The bootstrap entity types, in the fixed id order spec.md §4.3 and
/// `original_source/.../schema/dynamic_schema.py` require: a single batch,
/// ids 0 through 6, inserted before any discovered type gets an id.
pub const DEFAULT_ENTITY_TYPES: &[(u32, &str, &str)] = &[
    (0, "Entity", "A generic entity of unspecified type."),
    (1, "Person", "A named individual person."),
    (2, "Organization", "A company, institution, or group."),
    (3, "Location", "A physical or geographic place."),
    (4, "Concept", "An abstract idea, topic, or category."),
    (5, "Event", "An occurrence at a point or span of time."),
    (6, "Artifact", "A created object, document, or work."),
];

/// The per-project set of allowed entity types, edge types, and
/// `(source,target)→edge` mappings. Cached in memory with a short TTL by
/// `memstack-graph::schema`; ownership is one-per-project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaContext {
    /// Entity-type descriptors, in discovery order (defaults first).
    pub entity_types: Vec<EntityTypeDescriptor>,
    /// All known edge-type names.
    pub edge_types: HashSet<String>,
    /// `(source_type, target_type) -> allowed edge-type names`.
    pub edge_type_map: HashMap<EdgeTypeKey, HashSet<String>>,
}

impl SchemaContext {
    /// Build a `SchemaContext` containing only the bootstrap defaults and
    /// no edge types yet.
    pub fn with_defaults() -> Self {
        Self {
            entity_types: DEFAULT_ENTITY_TYPES
                .iter()
                .map(|(id, name, description)| EntityTypeDescriptor {
                    id: *id,
                    name: (*name).to_string(),
                    description: (*description).to_string(),
                })
                .collect(),
            edge_types: HashSet::new(),
            edge_type_map: HashMap::new(),
        }
    }

    /// Names of every known entity type, in the order the extraction
    /// prompt should present them.
    pub fn entity_type_names(&self) -> Vec<&str> {
        self.entity_types.iter().map(|t| t.name.as_str()).collect()
    }

    /// Whether `edge_type` is allowed between `source_type` and
    /// `target_type`.
    ///
    /// Per spec.md §9's resolved Open Question: when `edge_type_map` is
    /// empty overall there is NO constraint (anything is allowed); the
    /// map is only consulted — and a missing pair rejected — once it is
    /// non-empty.
    pub fn allows_edge(&self, source_type: &str, target_type: &str, edge_type: &str) -> bool {
        if self.edge_type_map.is_empty() {
            return true;
        }
        let key = (source_type.to_string(), target_type.to_string());
        match self.edge_type_map.get(&key) {
            Some(allowed) => allowed.contains(edge_type),
            None => false,
        }
    }

    /// Merge newly discovered types into this context, returning the
    /// names/pairs that were genuinely new (for `save_discovered_types_batch`
    /// to persist). Pure, does not mutate storage — callers persist and
    /// then invalidate the cached context.
    pub fn merge_discovered(
        &mut self,
        new_entity_types: &[(String, String)],
        new_edge_types: &[String],
        new_edge_type_maps: &[(EdgeTypeKey, String)],
    ) -> DiscoveredDelta {
        let mut delta = DiscoveredDelta::default();

        let mut next_id = self.entity_types.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        for (name, description) in new_entity_types {
            if self.entity_types.iter().any(|t| &t.name == name) {
                continue;
            }
            self.entity_types.push(EntityTypeDescriptor {
                id: next_id,
                name: name.clone(),
                description: description.clone(),
            });
            delta.entity_types.push(name.clone());
            next_id += 1;
        }

        for name in new_edge_types {
            if self.edge_types.insert(name.clone()) {
                delta.edge_types.push(name.clone());
            }
        }

        for (key, edge_name) in new_edge_type_maps {
            let set = self.edge_type_map.entry(key.clone()).or_default();
            if set.insert(edge_name.clone()) {
                delta.edge_type_maps.push((key.clone(), edge_name.clone()));
            }
        }

        delta
    }
}

/// The subset of a `merge_discovered` call that was actually new — what
/// `save_discovered_types_batch` should upsert.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredDelta {
    /// Newly discovered entity-type names.
    pub entity_types: Vec<String>,
    /// Newly discovered edge-type names.
    pub edge_types: Vec<String>,
    /// Newly discovered `(source,target)->edge` mappings.
    pub edge_type_maps: Vec<(EdgeTypeKey, String)>,
}

impl DiscoveredDelta {
    /// Whether anything was actually new.
    pub fn is_empty(&self) -> bool {
        self.entity_types.is_empty() && self.edge_types.is_empty() && self.edge_type_maps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_has_seven_defaults_ids_zero_to_six() {
        let ctx = SchemaContext::with_defaults();
        assert_eq!(ctx.entity_types.len(), 7);
        for (i, t) in ctx.entity_types.iter().enumerate() {
            assert_eq!(t.id, i as u32);
        }
        assert_eq!(ctx.entity_types[0].name, "Entity");
    }

    #[test]
    fn empty_edge_type_map_means_no_constraint() {
        let ctx = SchemaContext::with_defaults();
        assert!(ctx.allows_edge("Person", "Organization", "WORKS_AT"));
    }

    #[test]
    fn non_empty_map_rejects_unlisted_pairs() {
        let mut ctx = SchemaContext::with_defaults();
        ctx.merge_discovered(
            &[],
            &["WORKS_AT".to_string()],
            &[(
                ("Person".to_string(), "Organization".to_string()),
                "WORKS_AT".to_string(),
            )],
        );
        assert!(ctx.allows_edge("Person", "Organization", "WORKS_AT"));
        assert!(!ctx.allows_edge("Person", "Location", "WORKS_AT"));
    }

    #[test]
    fn merge_discovered_is_idempotent_for_duplicates() {
        let mut ctx = SchemaContext::with_defaults();
        let d1 = ctx.merge_discovered(&[("Skill".to_string(), "desc".to_string())], &[], &[]);
        assert_eq!(d1.entity_types, vec!["Skill".to_string()]);
        let d2 = ctx.merge_discovered(&[("Skill".to_string(), "desc".to_string())], &[], &[]);
        assert!(d2.is_empty());
    }
}
