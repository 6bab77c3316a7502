//! [`CommunityNode`] — a cluster of entities produced by Louvain detection.

use crate::scoping::Scoping;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cluster of entities. Membership is expressed by `BELONGS_TO` edges
/// entity→community, not stored inline here — `member_count` is a
/// denormalized counter kept in sync by `memstack-community`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityNode {
    /// Unique identifier.
    pub id: Uuid,
    /// Short generated name.
    pub name: String,
    /// Generated summary.
    pub summary: String,
    /// Number of `BELONGS_TO` members. A community with `member_count == 0`
    /// is stale and must be deleted (spec.md §3).
    pub member_count: usize,
    /// Tenant/project scoping (communities have no per-user scope).
    pub scoping: Scoping,
}

impl CommunityNode {
    /// Construct a new community node from its detected membership size.
    pub fn new(name: impl Into<String>, summary: impl Into<String>, member_count: usize, scoping: Scoping) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            summary: summary.into(),
            member_count,
            scoping,
        }
    }

    /// Whether this community has no remaining members and should be
    /// deleted by `delete_stale_communities`.
    pub fn is_stale(&self) -> bool {
        self.member_count == 0
    }
}
