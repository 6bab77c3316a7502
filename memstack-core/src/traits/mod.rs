//! External-collaborator traits. Everything spec.md §1 declares out of
//! scope (transport, LLM wire protocol, sandbox control plane, skill
//! bundles) is represented here only as a narrow trait boundary, exactly
//! as `layer0` represents "the model" as `Provider` and "durable storage"
//! as `StateStore` without knowing what's behind either.

pub mod cache;
pub mod clock;
pub mod embedder;
pub mod event;
pub mod graph;
pub mod llm;
pub mod queue;
pub mod relational;

pub use cache::{CacheClient, CacheError, NullCache};
pub use clock::{Clock, SystemClock};
pub use embedder::{Embedder, EmbedderError};
pub use event::{EventBus, SessionEvent, SessionEventKind};
pub use graph::{GraphBackend, RawNode};
pub use llm::{Llm, LlmError, LlmRequest};
pub use queue::{ProcessEpisodeTask, TaskQueue, TaskQueueError};
pub use relational::{RelationalError, RelationalStore, ToolEnvVarRecord};
