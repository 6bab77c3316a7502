//! Defensive JSON parsing of raw model output into extraction candidates
//! (spec.md §4.4 steps 1, 5: "entities with missing required fields are
//! dropped", "edges whose endpoints are not in the entity set ... are
//! dropped").

use serde::Deserialize;

/// One entity candidate as the model's JSON emits it, before any
/// construction into a real [`memstack_core::model::EntityNode`].
#[derive(Debug, Clone, Deserialize)]
pub struct EntityCandidate {
    /// Extracted name. Required.
    pub name: Option<String>,
    /// Extracted entity-type name. Required.
    pub entity_type: Option<String>,
    /// Optional summary.
    #[serde(default)]
    pub summary: Option<String>,
    /// Optional free-form attributes.
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
}

impl EntityCandidate {
    /// Whether this candidate has every field spec.md §4.4 step 1 treats
    /// as required (`name`, `entity_type`).
    pub fn is_complete(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
            && self
                .entity_type
                .as_deref()
                .is_some_and(|t| !t.trim().is_empty())
    }
}

/// One relationship candidate as the model's JSON emits it.
#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipCandidate {
    /// Source entity name, matched against the unique entity set.
    pub from_entity: Option<String>,
    /// Target entity name, matched against the unique entity set.
    pub to_entity: Option<String>,
    /// Relationship-type identifier.
    pub relationship_type: Option<String>,
    /// Free-text summary.
    #[serde(default)]
    pub summary: Option<String>,
    /// Confidence/strength weight, expected in `[0,1]`.
    #[serde(default)]
    pub weight: Option<f64>,
}

impl RelationshipCandidate {
    /// Whether every required field is present.
    pub fn is_complete(&self) -> bool {
        self.from_entity.is_some() && self.to_entity.is_some() && self.relationship_type.is_some()
    }
}

/// Parse a JSON array of entity candidates from raw model output,
/// tolerating a response that wraps the array in an object under an
/// `entities` key (a common model quirk) in addition to a bare array.
pub fn parse_entity_candidates(raw: &str) -> Vec<EntityCandidate> {
    parse_candidate_array(raw, "entities")
}

/// Parse a JSON array of relationship candidates, tolerating the same
/// bare-array-or-wrapped-object shapes under a `relationships` key.
pub fn parse_relationship_candidates(raw: &str) -> Vec<RelationshipCandidate> {
    parse_candidate_array(raw, "relationships")
}

fn parse_candidate_array<T: serde::de::DeserializeOwned>(raw: &str, wrapper_key: &str) -> Vec<T> {
    let trimmed = extract_json_block(raw);

    if let Ok(list) = serde_json::from_str::<Vec<T>>(trimmed) {
        return list;
    }

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(trimmed)
    {
        if let Some(value) = map.get(wrapper_key) {
            if let Ok(list) = serde_json::from_value::<Vec<T>>(value.clone()) {
                return list;
            }
        }
    }

    tracing::warn!(wrapper_key, "unparseable extraction output, dropping batch");
    Vec::new()
}

/// Models sometimes wrap JSON in markdown code fences. Strip those before
/// parsing; anything that still doesn't parse is handled by the caller.
fn extract_json_block(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        return rest.trim().trim_end_matches("```").trim();
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        return rest.trim().trim_end_matches("```").trim();
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_array() {
        let raw = r#"[{"name": "Ada", "entity_type": "Person"}]"#;
        let candidates = parse_entity_candidates(raw);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].is_complete());
    }

    #[test]
    fn parses_wrapped_object() {
        let raw = r#"{"entities": [{"name": "Ada", "entity_type": "Person"}]}"#;
        let candidates = parse_entity_candidates(raw);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn strips_markdown_fences() {
        let raw = "```json\n[{\"name\": \"Ada\", \"entity_type\": \"Person\"}]\n```";
        let candidates = parse_entity_candidates(raw);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn drops_incomplete_candidates_downstream_not_here() {
        let raw = r#"[{"name": "Ada"}]"#;
        let candidates = parse_entity_candidates(raw);
        assert_eq!(candidates.len(), 1);
        assert!(!candidates[0].is_complete());
    }

    #[test]
    fn unparseable_output_yields_empty_batch() {
        let candidates = parse_entity_candidates("not json at all");
        assert!(candidates.is_empty());
    }
}
