//! [`RelationalStore`] — the authoritative SQL boundary (spec.md §4.2,
//! §4.3, §6).

use crate::model::{
    CompensatingTransaction, EdgeTypeKey, Episode, EntityTypeDescriptor, HitlRequest, HitlResponse,
};
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

/// Errors from the relational store.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum RelationalError {
    /// The row was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The write failed.
    #[error("write failed: {0}")]
    WriteFailed(String),
    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A stored tool environment-variable record. `encrypted_value` holds the
/// AEAD ciphertext produced by `memstack-crypto` for secret fields
/// (spec.md §6).
#[derive(Debug, Clone)]
pub struct ToolEnvVarRecord {
    /// Owning tool name.
    pub tool_name: String,
    /// Variable name.
    pub name: String,
    /// Ciphertext, present only for secret fields.
    pub encrypted_value: Option<Vec<u8>>,
    /// Plaintext, present only for non-secret fields.
    pub plain_value: Option<String>,
}

/// The authoritative SQL store. Source of truth for episodes, HITL
/// requests/responses, entity/edge-type catalogs, and tool env-var
/// records (spec.md §6 "Persisted state").
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Insert or update an episode row.
    async fn upsert_episode(&self, episode: &Episode) -> Result<(), RelationalError>;

    /// Fetch an episode by id.
    async fn get_episode(&self, id: Uuid) -> Result<Option<Episode>, RelationalError>;

    /// Fetch an episode by its `memory_id` metadata field.
    async fn get_episode_by_memory_id(
        &self,
        memory_id: &str,
    ) -> Result<Option<Episode>, RelationalError>;

    /// Delete an episode row.
    async fn delete_episode(&self, id: Uuid) -> Result<(), RelationalError>;

    /// Persist a new HITL request.
    async fn save_hitl_request(&self, request: &HitlRequest) -> Result<(), RelationalError>;

    /// Fetch a HITL request by id.
    async fn get_hitl_request(
        &self,
        request_id: &str,
    ) -> Result<Option<HitlRequest>, RelationalError>;

    /// Update a HITL request's status.
    async fn update_hitl_status(
        &self,
        request_id: &str,
        status: crate::model::HitlStatus,
    ) -> Result<(), RelationalError>;

    /// Persist a HITL response.
    async fn save_hitl_response(&self, response: &HitlResponse) -> Result<(), RelationalError>;

    /// Persist a new compensating-transaction record.
    async fn save_compensating_transaction(
        &self,
        record: &CompensatingTransaction,
    ) -> Result<(), RelationalError>;

    /// Fetch a compensating-transaction record by id.
    async fn get_compensating_transaction(
        &self,
        id: Uuid,
    ) -> Result<Option<CompensatingTransaction>, RelationalError>;

    /// Update a compensating-transaction record's status.
    async fn update_compensating_transaction_status(
        &self,
        id: Uuid,
        status: crate::model::CompensatingTransactionStatus,
    ) -> Result<(), RelationalError>;

    /// List all pending compensating-transaction records.
    async fn list_pending_compensating_transactions(
        &self,
    ) -> Result<Vec<CompensatingTransaction>, RelationalError>;

    /// Upsert a tool env-var record (secret fields pre-encrypted by the
    /// caller via `memstack-crypto`).
    async fn upsert_tool_env_var(&self, record: &ToolEnvVarRecord) -> Result<(), RelationalError>;

    /// Fetch all env-var records for a tool.
    async fn get_tool_env_vars(
        &self,
        tool_name: &str,
    ) -> Result<Vec<ToolEnvVarRecord>, RelationalError>;

    /// Minimal liveness probe for the health checker (spec.md §4.1).
    async fn ping(&self) -> Result<(), RelationalError>;

    /// Arbitrary metadata bag keyed by a namespace + id, used for things
    /// like cached UI metadata for MCP-UI tools (spec.md §4.10).
    async fn get_metadata(
        &self,
        namespace: &str,
        id: &str,
    ) -> Result<Option<HashMap<String, serde_json::Value>>, RelationalError>;

    /// All entity-type descriptors known for `project`, in insertion
    /// order (bootstrap defaults first, spec.md §4.3 "Schema context").
    async fn list_entity_types(
        &self,
        project: &str,
    ) -> Result<Vec<EntityTypeDescriptor>, RelationalError>;

    /// Insert or update a single entity-type descriptor for `project`.
    async fn upsert_entity_type(
        &self,
        project: &str,
        descriptor: &EntityTypeDescriptor,
    ) -> Result<(), RelationalError>;

    /// All edge-type names known for `project`.
    async fn list_edge_types(&self, project: &str) -> Result<Vec<String>, RelationalError>;

    /// Insert an edge-type name for `project` if not already present.
    async fn upsert_edge_type(&self, project: &str, name: &str) -> Result<(), RelationalError>;

    /// All `(source_type, target_type) -> edge_type` pairs known for
    /// `project`.
    async fn list_edge_type_maps(
        &self,
        project: &str,
    ) -> Result<Vec<(EdgeTypeKey, String)>, RelationalError>;

    /// Insert a `(source_type, target_type) -> edge_type` mapping for
    /// `project` if not already present.
    async fn upsert_edge_type_map(
        &self,
        project: &str,
        key: &EdgeTypeKey,
        edge_type: &str,
    ) -> Result<(), RelationalError>;
}
