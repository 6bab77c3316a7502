//! Example binary: wires the in-memory MemStack adapters together and
//! drives one episode through ingestion, then one agent turn through a
//! HITL clarification suspend/resume (DESIGN.md "memstack-cli").
//!
//! Every collaborator here is a `memstack_core::test_support` fake —
//! there is no live Neo4j/Postgres/Redis/LLM behind this binary. It
//! exists to prove the crates compose, not to run a deployment; a real
//! deployment supplies `memstack-graph::Neo4jGraphStore` and a
//! concrete `Llm`/`Embedder`/`RelationalStore` in its place.

use async_trait::async_trait;
use memstack_core::model::{ChatMessage, Episode, SourceType};
use memstack_core::scoping::Scoping;
use memstack_core::test_support::{
    FakeClock, FakeEmbedder, FakeEventBus, FakeGraphBackend, FakeLlm, FakeRelationalStore,
    FakeTaskQueue,
};
use memstack_core::traits::RelationalStore;
use memstack_extraction::{ExtractionConfig, ExtractionPipeline};
use memstack_graph::{SchemaStore, SchemaStoreConfig};
use memstack_hitl::{HitlHandler, PreinjectedAnswer};
use memstack_ingest::{EpisodeIngester, IngestConfig};
use memstack_search::{HybridSearchEngine, SearchConfig};
use memstack_session::{
    ModelError, ModelRequest, ModelResponse, ResponsePart, SessionModel, SessionProcessor,
    StepOutcome, StopReason, ToolDefinition, ToolUseRequest,
};
use std::sync::Arc;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        eprintln!("memstack-cli error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let scoping = Scoping::new("tenant-demo", "project-demo");
    let now = chrono::Utc::now();

    let graph = Arc::new(FakeGraphBackend::new());
    let relational = Arc::new(FakeRelationalStore::new());
    let events = Arc::new(FakeEventBus::new());
    let queue = Arc::new(FakeTaskQueue::new());
    let embedder = Arc::new(FakeEmbedder::new(8));
    let clock = Arc::new(FakeClock::new(now));

    // Scripted so extraction sees one entity pass, one reflexion pass
    // that finds nothing new (breaking the loop immediately), and one
    // relationship pass (spec.md §4.4).
    let llm = Arc::new(FakeLlm::new(vec![
        r#"[{"name": "Alice", "entity_type": "Person", "summary": "engineer"},
            {"name": "Acme Corp", "entity_type": "Organization"}]"#
            .to_string(),
        "[]".to_string(),
        r#"[{"from_entity": "Alice", "to_entity": "Acme Corp",
             "relationship_type": "WORKS_AT", "weight": 0.9}]"#
            .to_string(),
    ]));

    let schema = Arc::new(SchemaStore::new(graph.clone(), SchemaStoreConfig::default()));
    let extraction = Arc::new(ExtractionPipeline::new(
        llm.clone(),
        ExtractionConfig::default(),
    ));
    let search_engine = Arc::new(HybridSearchEngine::new(
        graph.clone(),
        embedder.clone(),
        SearchConfig::default(),
    ));

    let ingester = EpisodeIngester::new(
        graph.clone(),
        relational.clone(),
        queue.clone(),
        embedder.clone(),
        extraction,
        schema,
        search_engine,
        clock.clone(),
        IngestConfig::default(),
    );

    println!("--- episode ingest ---");
    let episode = Episode::new(
        "Alice works at Acme Corp.",
        SourceType::Text,
        scoping.clone(),
        now,
        now,
    );
    let episode = ingester.add_episode(episode, None).await?;
    println!("queued episode {} ({:?})", episode.id, episode.status);

    for task in queue.tasks() {
        ingester.process_episode(task).await?;
    }
    let synced = relational
        .get_episode(episode.id)
        .await?
        .expect("episode persisted in add_episode");
    println!(
        "episode {} now {:?}, {} derived edge(s)",
        synced.id,
        synced.status,
        synced.derived_edge_ids.len()
    );

    println!("\n--- session turn (suspends on clarification) ---");
    let clarifying_tool = ToolDefinition::hitl(
        "ask_user",
        "ask the user a clarifying question",
        serde_json::json!({}),
        memstack_core::model::HitlType::Clarification,
    );

    let model = Arc::new(ScriptedModel::new(vec![
        ModelResponse {
            parts: vec![ResponsePart::ToolUse(ToolUseRequest {
                id: "call-1".into(),
                name: "ask_user".into(),
                input: serde_json::json!({"question": "Which Acme entity did you mean?"}),
            })],
            stop_reason: StopReason::ToolUse,
        },
        ModelResponse {
            parts: vec![ResponsePart::Text {
                text: "Got it, thanks!".into(),
            }],
            stop_reason: StopReason::EndTurn,
        },
    ]));

    let first_handler = HitlHandler::new(
        "conv-demo",
        scoping.clone(),
        None,
        300,
        relational.clone(),
        events.clone(),
        clock.clone(),
        None,
    );

    let processor = SessionProcessor::new(
        model.clone(),
        "demo-model",
        vec![clarifying_tool.clone()],
        None,
        None,
        relational.clone(),
        events.clone(),
        first_handler,
        "conv-demo",
        scoping.clone(),
        None,
        None,
        20,
        3,
    );

    let outcome = processor
        .run(vec![ChatMessage::user("help me enrich Acme Corp")], 0, 0)
        .await?;

    let pending = match outcome {
        StepOutcome::Suspended(pending) => pending,
        StepOutcome::Finished { reason, .. } => {
            panic!("expected the turn to suspend on a HITL request, finished instead: {reason}")
        }
    };
    println!(
        "suspended: request {} ({:?}), waiting on tool_call {}",
        pending.info.request_id, pending.info.hitl_type, pending.pending_tool_call_id
    );

    println!("\n--- resume with the user's answer ---");
    let response = memstack_core::model::HitlResponse {
        request_id: pending.info.request_id.clone(),
        payload: memstack_core::model::HitlResponsePayload::Clarification {
            answer: "The public corp, not the subsidiary".into(),
        },
        user_id: Some("user-1".into()),
        timestamp: chrono::Utc::now(),
    };

    let resumed_handler = HitlHandler::new(
        "conv-demo",
        scoping.clone(),
        None,
        300,
        relational.clone(),
        events.clone(),
        clock.clone(),
        Some(PreinjectedAnswer::Answered(response)),
    );

    let resumed = SessionProcessor::new(
        model,
        "demo-model",
        vec![clarifying_tool],
        None,
        None,
        relational.clone(),
        events.clone(),
        resumed_handler,
        "conv-demo",
        scoping,
        None,
        None,
        20,
        3,
    );

    let outcome = resumed
        .resume(pending.messages, pending.step_count, pending.last_sequence_number)
        .await?;

    match outcome {
        StepOutcome::Finished {
            reason,
            last_sequence_number,
            ..
        } => println!("finished: {reason} (sequence {last_sequence_number})"),
        StepOutcome::Suspended(pending) => {
            println!("suspended again on {}", pending.info.request_id)
        }
    }

    println!(
        "\n{} event(s) emitted on conv-demo",
        events.events().len()
    );

    Ok(())
}

/// A [`SessionModel`] that plays back a fixed script of responses, one
/// per call — enough to demonstrate the suspend/resume boundary without
/// a live provider (mirrors `memstack-session`'s own `ScriptedModel` test
/// double).
struct ScriptedModel {
    responses: Mutex<std::collections::VecDeque<ModelResponse>>,
}

impl ScriptedModel {
    fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }
}

#[async_trait]
impl SessionModel for ScriptedModel {
    async fn complete(&self, _request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.responses
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| ModelError::CallFailed("script exhausted".into()))
    }
}
