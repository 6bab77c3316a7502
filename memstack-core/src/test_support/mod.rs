//! In-memory implementations of every protocol trait, for testing.
//!
//! Available behind the `test-utils` feature flag. Mirrors `layer0`'s
//! `test_utils` module: minimal implementations that prove the trait
//! APIs are usable without a real Neo4j/Postgres/Redis/LLM behind them.

mod fake_cache;
mod fake_clock;
mod fake_embedder;
mod fake_event_bus;
mod fake_graph;
mod fake_llm;
mod fake_queue;
mod fake_relational;

pub use fake_cache::FakeCacheClient;
pub use fake_clock::FakeClock;
pub use fake_embedder::FakeEmbedder;
pub use fake_event_bus::FakeEventBus;
pub use fake_graph::FakeGraphBackend;
pub use fake_llm::FakeLlm;
pub use fake_queue::FakeTaskQueue;
pub use fake_relational::FakeRelationalStore;
