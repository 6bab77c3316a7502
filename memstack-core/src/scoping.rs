//! Tenant/project/user scoping shared by nearly every domain type.

use serde::{Deserialize, Serialize};

/// Multi-tenant scoping carried by episodes, entities, edges, communities,
/// schema contexts, and HITL requests.
///
/// `project_id` is the unit `SchemaContext` is cached per (spec.md §4.3);
/// `tenant_id` is the outer isolation boundary; `user_id` is optional
/// because not every ingestion path is attributable to a single user
/// (e.g. scheduled batch imports).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Scoping {
    /// Tenant identifier.
    pub tenant_id: String,
    /// Project identifier. `SchemaContext` is cached one-per-project.
    pub project_id: String,
    /// Optional user identifier.
    pub user_id: Option<String>,
}

impl Scoping {
    /// Build a new scoping triple.
    pub fn new(tenant_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            project_id: project_id.into(),
            user_id: None,
        }
    }

    /// Attach a user id.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Cache-key fragment uniquely identifying the project scope.
    pub fn project_key(&self) -> String {
        format!("{}:{}", self.tenant_id, self.project_id)
    }
}
