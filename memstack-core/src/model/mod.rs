//! Domain model: the data that survives a process restart.

pub mod community;
pub mod entity;
pub mod episode;
pub mod hitl;
pub mod processor;
pub mod schema;
pub mod txlog;

pub use community::CommunityNode;
pub use entity::{EntityEdge, EntityNode};
pub use episode::{Episode, EpisodeStatus, SourceType};
pub use hitl::{
    HitlRequest, HitlRequestPayload, HitlResponse, HitlResponsePayload, HitlStatus, HitlType,
};
pub use processor::{ChatMessage, MessageRole, ProcessorState, ToolCallDescriptor};
pub use schema::{EdgeTypeKey, EntityTypeDescriptor, SchemaContext};
pub use txlog::{CompensatingTransaction, CompensatingTransactionStatus};
