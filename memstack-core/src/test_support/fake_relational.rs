//! FakeRelationalStore — HashMap-backed RelationalStore for testing.

use crate::model::{
    CompensatingTransaction, CompensatingTransactionStatus, EdgeTypeKey, Episode,
    EntityTypeDescriptor, HitlRequest, HitlResponse, HitlStatus,
};
use crate::traits::{RelationalError, RelationalStore, ToolEnvVarRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory relational store. Mirrors the shape of the real Postgres
/// store closely enough to drive `memstack-tx`, `memstack-hitl`, and
/// `memstack-ingest` tests without a database.
#[derive(Default)]
pub struct FakeRelationalStore {
    episodes: RwLock<HashMap<Uuid, Episode>>,
    hitl_requests: RwLock<HashMap<String, HitlRequest>>,
    hitl_responses: RwLock<HashMap<String, HitlResponse>>,
    compensating: RwLock<HashMap<Uuid, CompensatingTransaction>>,
    tool_env_vars: RwLock<HashMap<(String, String), ToolEnvVarRecord>>,
    metadata: RwLock<HashMap<(String, String), HashMap<String, serde_json::Value>>>,
    entity_types: RwLock<HashMap<String, Vec<EntityTypeDescriptor>>>,
    edge_types: RwLock<HashMap<String, Vec<String>>>,
    edge_type_maps: RwLock<HashMap<String, Vec<(EdgeTypeKey, String)>>>,
}

impl FakeRelationalStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationalStore for FakeRelationalStore {
    async fn upsert_episode(&self, episode: &Episode) -> Result<(), RelationalError> {
        let mut episodes = self.episodes.write().expect("lock poisoned");
        episodes.insert(episode.id, episode.clone());
        Ok(())
    }

    async fn get_episode(&self, id: Uuid) -> Result<Option<Episode>, RelationalError> {
        let episodes = self.episodes.read().expect("lock poisoned");
        Ok(episodes.get(&id).cloned())
    }

    async fn get_episode_by_memory_id(
        &self,
        memory_id: &str,
    ) -> Result<Option<Episode>, RelationalError> {
        let episodes = self.episodes.read().expect("lock poisoned");
        Ok(episodes
            .values()
            .find(|e| e.memory_id() == Some(memory_id))
            .cloned())
    }

    async fn delete_episode(&self, id: Uuid) -> Result<(), RelationalError> {
        let mut episodes = self.episodes.write().expect("lock poisoned");
        episodes.remove(&id);
        Ok(())
    }

    async fn save_hitl_request(&self, request: &HitlRequest) -> Result<(), RelationalError> {
        let mut requests = self.hitl_requests.write().expect("lock poisoned");
        requests.insert(request.request_id.clone(), request.clone());
        Ok(())
    }

    async fn get_hitl_request(
        &self,
        request_id: &str,
    ) -> Result<Option<HitlRequest>, RelationalError> {
        let requests = self.hitl_requests.read().expect("lock poisoned");
        Ok(requests.get(request_id).cloned())
    }

    async fn update_hitl_status(
        &self,
        request_id: &str,
        status: HitlStatus,
    ) -> Result<(), RelationalError> {
        let mut requests = self.hitl_requests.write().expect("lock poisoned");
        let request = requests
            .get_mut(request_id)
            .ok_or_else(|| RelationalError::NotFound(request_id.to_owned()))?;
        request.status = status;
        Ok(())
    }

    async fn save_hitl_response(&self, response: &HitlResponse) -> Result<(), RelationalError> {
        let mut responses = self.hitl_responses.write().expect("lock poisoned");
        responses.insert(response.request_id.clone(), response.clone());
        Ok(())
    }

    async fn save_compensating_transaction(
        &self,
        record: &CompensatingTransaction,
    ) -> Result<(), RelationalError> {
        let mut compensating = self.compensating.write().expect("lock poisoned");
        compensating.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_compensating_transaction(
        &self,
        id: Uuid,
    ) -> Result<Option<CompensatingTransaction>, RelationalError> {
        let compensating = self.compensating.read().expect("lock poisoned");
        Ok(compensating.get(&id).cloned())
    }

    async fn update_compensating_transaction_status(
        &self,
        id: Uuid,
        status: CompensatingTransactionStatus,
    ) -> Result<(), RelationalError> {
        let mut compensating = self.compensating.write().expect("lock poisoned");
        let record = compensating
            .get_mut(&id)
            .ok_or_else(|| RelationalError::NotFound(id.to_string()))?;
        record.status = status;
        Ok(())
    }

    async fn list_pending_compensating_transactions(
        &self,
    ) -> Result<Vec<CompensatingTransaction>, RelationalError> {
        let compensating = self.compensating.read().expect("lock poisoned");
        Ok(compensating
            .values()
            .filter(|r| r.status == CompensatingTransactionStatus::Pending)
            .cloned()
            .collect())
    }

    async fn upsert_tool_env_var(&self, record: &ToolEnvVarRecord) -> Result<(), RelationalError> {
        let mut vars = self.tool_env_vars.write().expect("lock poisoned");
        vars.insert(
            (record.tool_name.clone(), record.name.clone()),
            record.clone(),
        );
        Ok(())
    }

    async fn get_tool_env_vars(
        &self,
        tool_name: &str,
    ) -> Result<Vec<ToolEnvVarRecord>, RelationalError> {
        let vars = self.tool_env_vars.read().expect("lock poisoned");
        Ok(vars
            .values()
            .filter(|r| r.tool_name == tool_name)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), RelationalError> {
        Ok(())
    }

    async fn get_metadata(
        &self,
        namespace: &str,
        id: &str,
    ) -> Result<Option<HashMap<String, serde_json::Value>>, RelationalError> {
        let metadata = self.metadata.read().expect("lock poisoned");
        Ok(metadata.get(&(namespace.to_owned(), id.to_owned())).cloned())
    }

    async fn list_entity_types(
        &self,
        project: &str,
    ) -> Result<Vec<EntityTypeDescriptor>, RelationalError> {
        let entity_types = self.entity_types.read().expect("lock poisoned");
        Ok(entity_types.get(project).cloned().unwrap_or_default())
    }

    async fn upsert_entity_type(
        &self,
        project: &str,
        descriptor: &EntityTypeDescriptor,
    ) -> Result<(), RelationalError> {
        let mut entity_types = self.entity_types.write().expect("lock poisoned");
        let types = entity_types.entry(project.to_owned()).or_default();
        if let Some(existing) = types.iter_mut().find(|t| t.name == descriptor.name) {
            *existing = descriptor.clone();
        } else {
            types.push(descriptor.clone());
        }
        Ok(())
    }

    async fn list_edge_types(&self, project: &str) -> Result<Vec<String>, RelationalError> {
        let edge_types = self.edge_types.read().expect("lock poisoned");
        Ok(edge_types.get(project).cloned().unwrap_or_default())
    }

    async fn upsert_edge_type(&self, project: &str, name: &str) -> Result<(), RelationalError> {
        let mut edge_types = self.edge_types.write().expect("lock poisoned");
        let types = edge_types.entry(project.to_owned()).or_default();
        if !types.iter().any(|t| t == name) {
            types.push(name.to_owned());
        }
        Ok(())
    }

    async fn list_edge_type_maps(
        &self,
        project: &str,
    ) -> Result<Vec<(EdgeTypeKey, String)>, RelationalError> {
        let edge_type_maps = self.edge_type_maps.read().expect("lock poisoned");
        Ok(edge_type_maps.get(project).cloned().unwrap_or_default())
    }

    async fn upsert_edge_type_map(
        &self,
        project: &str,
        key: &EdgeTypeKey,
        edge_type: &str,
    ) -> Result<(), RelationalError> {
        let mut edge_type_maps = self.edge_type_maps.write().expect("lock poisoned");
        let maps = edge_type_maps.entry(project.to_owned()).or_default();
        if !maps
            .iter()
            .any(|(k, e)| k == key && e == edge_type)
        {
            maps.push((key.clone(), edge_type.to_owned()));
        }
        Ok(())
    }
}
