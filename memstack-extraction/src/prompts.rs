//! Prompt construction for entity extraction, reflexion, and relationship
//! extraction. Pure string building — no LLM calls live here.

use memstack_core::model::SchemaContext;

/// Build the system+user prompt pair for an initial entity-extraction pass.
///
/// Lists every entity type currently known to the project's
/// [`SchemaContext`] so the model can both pick an existing type and, if
/// warranted, propose a new one (spec.md §4.4 step 1 "discovered types").
pub fn entity_extraction_prompt(content: &str, schema: &SchemaContext) -> (String, String) {
    let type_lines: Vec<String> = schema
        .entity_types
        .iter()
        .map(|t| format!("- {}: {}", t.name, t.description))
        .collect();

    let system = format!(
        "You extract entities mentioned in a piece of text. Known entity \
         types for this project are:\n{}\n\nIf the text mentions something \
         that doesn't fit an existing type, propose a new entity_type name \
         and a one-sentence description for it. Respond with a JSON array \
         of objects, each with fields: name, entity_type, summary \
         (optional), attributes (optional object). Respond with the JSON \
         array only, no surrounding prose.",
        type_lines.join("\n")
    );

    (system, content.to_string())
}

/// Build the reflexion prompt: given the content and the entities already
/// extracted, ask the model what was missed (spec.md §4.4 step 2).
pub fn reflexion_prompt(content: &str, extracted_names: &[&str]) -> (String, String) {
    let system = "You previously extracted a list of entities from a piece \
        of text. Check whether anything relevant was missed. Respond with \
        a JSON array in the same shape as before, containing ONLY entities \
        not already in the list. If nothing was missed, respond with an \
        empty JSON array."
        .to_string();

    let user = format!(
        "Text:\n{content}\n\nEntities already extracted: {}",
        extracted_names.join(", ")
    );

    (system, user)
}

/// Build the relationship-extraction prompt given the final, deduplicated
/// entity set (spec.md §4.4 step 6).
pub fn relationship_extraction_prompt(content: &str, entity_names: &[&str]) -> (String, String) {
    let system = "You extract relationships between entities mentioned in \
        a piece of text. Only use the entity names provided below as \
        from_entity/to_entity values; do not invent new entities here. \
        Respond with a JSON array of objects, each with fields: \
        from_entity, to_entity, relationship_type, summary (optional), \
        weight (optional, 0.0-1.0 confidence). Respond with the JSON array \
        only, no surrounding prose."
        .to_string();

    let user = format!(
        "Text:\n{content}\n\nKnown entities: {}",
        entity_names.join(", ")
    );

    (system, user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_prompt_lists_known_types() {
        let schema = SchemaContext::with_defaults();
        let (system, _) = entity_extraction_prompt("Ada met Grace.", &schema);
        assert!(system.contains("Person"));
        assert!(system.contains("Organization"));
    }

    #[test]
    fn reflexion_prompt_lists_already_extracted() {
        let (_, user) = reflexion_prompt("text", &["Ada", "Grace"]);
        assert!(user.contains("Ada"));
        assert!(user.contains("Grace"));
    }

    #[test]
    fn relationship_prompt_constrains_to_known_entities() {
        let (system, user) = relationship_extraction_prompt("text", &["Ada", "Grace"]);
        assert!(system.contains("Only use the entity names"));
        assert!(user.contains("Ada"));
    }
}
