//! Index bootstrap (spec.md §4.3 "Indices"): run once per process start,
//! idempotent (`IF NOT EXISTS`) so repeated boots are harmless.

use crate::store::Neo4jGraphStore;
use memstack_core::error::GraphError;
use memstack_core::traits::GraphBackend;
use std::collections::HashMap;
use std::time::Duration;

const UUID_INDEXED_LABELS: &[&str] = &["Episodic", "Entity", "Community"];

/// Create the uuid/secondary/fulltext indices every deployment needs.
/// Vector index creation is left to [`create_vector_index`] since its
/// shape (dimensions, similarity function) is caller-specific.
pub async fn bootstrap_indices(store: &Neo4jGraphStore) -> Result<(), GraphError> {
    for label in UUID_INDEXED_LABELS {
        let cypher = format!(
            "CREATE CONSTRAINT {label}_uuid_unique IF NOT EXISTS \
             FOR (n:{label}) REQUIRE n.uuid IS UNIQUE"
        );
        store
            .execute_query(&cypher, HashMap::new(), Duration::ZERO)
            .await?;

        let project_index = format!(
            "CREATE INDEX {label}_project_idx IF NOT EXISTS FOR (n:{label}) ON (n.project_id)"
        );
        store
            .execute_query(&project_index, HashMap::new(), Duration::ZERO)
            .await?;

        let created_index = format!(
            "CREATE INDEX {label}_created_at_idx IF NOT EXISTS FOR (n:{label}) ON (n.created_at)"
        );
        store
            .execute_query(&created_index, HashMap::new(), Duration::ZERO)
            .await?;
    }

    store
        .execute_query(
            "CREATE FULLTEXT INDEX episode_content_fulltext IF NOT EXISTS \
             FOR (n:Episodic) ON EACH [n.content]",
            HashMap::new(),
            Duration::ZERO,
        )
        .await?;

    store
        .execute_query(
            "CREATE FULLTEXT INDEX entity_name_summary_fulltext IF NOT EXISTS \
             FOR (n:Entity) ON EACH [n.name, n.summary]",
            HashMap::new(),
            Duration::ZERO,
        )
        .await?;

    Ok(())
}

/// Create a vector index, parameterized by `(name, label, property,
/// dimensions, similarity)` (spec.md §4.3).
pub async fn create_vector_index(
    store: &Neo4jGraphStore,
    name: &str,
    label: &str,
    property: &str,
    dimensions: u32,
    similarity: &str,
) -> Result<(), GraphError> {
    crate::identifier::validate_identifiers([name, label, property, similarity])?;
    let cypher = format!(
        "CREATE VECTOR INDEX {name} IF NOT EXISTS FOR (n:{label}) ON (n.{property}) \
         OPTIONS {{indexConfig: {{`vector.dimensions`: {dimensions}, \
         `vector.similarity_function`: '{similarity}'}}}}"
    );
    store
        .execute_query(&cypher, HashMap::new(), Duration::ZERO)
        .await?;
    Ok(())
}
