//! Workspace-level integration test: an episode travels through
//! ingestion, extraction, and the hybrid search index end to end, with
//! every external collaborator swapped for an in-memory fake. Exercises
//! the same "swap the adapter, keep the pipeline" composability the
//! unit tests within each crate can't show on their own.

use memstack_core::model::{EpisodeStatus, SourceType};
use memstack_core::scoping::Scoping;
use memstack_core::test_support::{
    FakeClock, FakeEmbedder, FakeGraphBackend, FakeLlm, FakeRelationalStore, FakeTaskQueue,
};
use memstack_core::traits::RelationalStore;
use memstack_extraction::{ExtractionConfig, ExtractionPipeline};
use memstack_graph::{SchemaStore, SchemaStoreConfig};
use memstack_ingest::{EpisodeIngester, IngestConfig};
use memstack_search::{HybridSearchEngine, SearchConfig};
use std::sync::Arc;

fn build_ingester(
    llm_responses: Vec<String>,
) -> (
    EpisodeIngester,
    Arc<FakeRelationalStore>,
    Arc<FakeTaskQueue>,
) {
    let graph = Arc::new(FakeGraphBackend::new());
    let relational = Arc::new(FakeRelationalStore::new());
    let queue = Arc::new(FakeTaskQueue::new());
    let embedder = Arc::new(FakeEmbedder::new(4));
    let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
    let llm = Arc::new(FakeLlm::new(llm_responses));

    let schema = Arc::new(SchemaStore::new(graph.clone(), SchemaStoreConfig::default()));
    let extraction = Arc::new(ExtractionPipeline::new(llm, ExtractionConfig::default()));
    let search_engine = Arc::new(HybridSearchEngine::new(
        graph.clone(),
        embedder.clone(),
        SearchConfig::default(),
    ));

    let ingester = EpisodeIngester::new(
        graph,
        relational.clone(),
        queue.clone(),
        embedder,
        extraction,
        schema,
        search_engine,
        clock,
        IngestConfig::default(),
    );

    (ingester, relational, queue)
}

#[tokio::test]
async fn add_episode_persists_and_enqueues_before_processing() {
    let (ingester, relational, queue) = build_ingester(vec!["[]".into(), "[]".into()]);
    let scoping = Scoping::new("tenant-a", "project-a");
    let now = chrono::Utc::now();
    let episode = memstack_core::model::Episode::new(
        "a quiet episode with no entities",
        SourceType::Text,
        scoping,
        now,
        now,
    );

    let returned = ingester.add_episode(episode, None).await.unwrap();
    assert_eq!(returned.status, EpisodeStatus::Processing);

    let stored = relational.get_episode(returned.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EpisodeStatus::Processing);
    assert_eq!(queue.tasks().len(), 1);
    assert_eq!(queue.tasks()[0].episode_uuid, returned.id);
}

#[tokio::test]
async fn process_episode_extracts_entities_and_relationships_then_syncs() {
    let entity_json = r#"[
        {"name": "Alice", "entity_type": "Person"},
        {"name": "Acme", "entity_type": "Organization"}
    ]"#;
    let relationship_json = r#"[
        {"from_entity": "Alice", "to_entity": "Acme",
         "relationship_type": "WORKS_AT", "weight": 0.8}
    ]"#;
    let (ingester, relational, queue) = build_ingester(vec![
        entity_json.into(),
        "[]".into(),
        relationship_json.into(),
    ]);

    let scoping = Scoping::new("tenant-a", "project-a");
    let now = chrono::Utc::now();
    let episode = memstack_core::model::Episode::new(
        "Alice works at Acme.",
        SourceType::Text,
        scoping,
        now,
        now,
    );
    let episode = ingester.add_episode(episode, None).await.unwrap();

    let task = queue.tasks().into_iter().next().expect("one task queued");
    ingester.process_episode(task).await.unwrap();

    let synced = relational.get_episode(episode.id).await.unwrap().unwrap();
    assert_eq!(synced.status, EpisodeStatus::Synced);
    assert_eq!(
        synced.derived_edge_ids.len(),
        1,
        "expected exactly the WORKS_AT edge derived from the episode"
    );
}

#[tokio::test]
async fn process_episode_tolerates_unparseable_model_output() {
    let (ingester, relational, queue) = build_ingester(vec![]);

    let scoping = Scoping::new("tenant-a", "project-a");
    let now = chrono::Utc::now();
    let episode = memstack_core::model::Episode::new(
        "content needing extraction",
        SourceType::Text,
        scoping,
        now,
        now,
    );
    let episode = ingester.add_episode(episode, None).await.unwrap();
    let task = queue.tasks().into_iter().next().unwrap();

    // FakeLlm with no seeded responses echoes the prompt, which is not
    // valid JSON; parse_entity_candidates treats that as zero entities.
    ingester.process_episode(task).await.unwrap();
    let synced = relational.get_episode(episode.id).await.unwrap().unwrap();
    assert_eq!(synced.status, EpisodeStatus::Synced);
    assert!(synced.derived_edge_ids.is_empty());
}
