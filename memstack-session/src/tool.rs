//! Tool capability set (spec.md §9 Design Notes "Duck-typed tool
//! instances"): tool variants are a tagged sum type
//! ([`ToolKind`]) dispatched per-variant, instead of probing a concrete
//! instance for `execute`/`ainvoke`/`_arun` attributes the way the
//! original system does.

use async_trait::async_trait;
use memstack_core::model::HitlType;
use std::sync::Arc;

/// An externally-executed tool (spec.md §1: the sandbox-container
/// control plane and the specific tool wire format are out of scope —
/// this is the narrow interface the session processor calls through).
#[async_trait]
pub trait ExternalTool: Send + Sync {
    /// Execute the tool with the model-supplied arguments, returning a
    /// JSON result or a human-readable error message (tool failures are
    /// never exceptions, spec.md §7 — they become `Observe` events).
    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, String>;
}

/// The two memory-tool operations a session can call (spec.md §4.10
/// "Memory tools"), kept as a narrow trait rather than a direct
/// `memstack-ingest`/`memstack-search` dependency so this crate never
/// has to know those crates' concrete types — only that *some*
/// collaborator can run the operation (spec.md §9 "Tool capability set").
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Ingest a new episode (`EpisodeIngester::add_episode`).
    async fn add_episode(&self, args: serde_json::Value) -> Result<serde_json::Value, String>;
    /// Run a hybrid search (`EpisodeIngester::search` /
    /// `SearchEngine::search`).
    async fn search(&self, args: serde_json::Value) -> Result<serde_json::Value, String>;
    /// Remove a previously ingested episode
    /// (`EpisodeIngester::remove_episode`/`remove_episode_by_memory_id`).
    async fn remove_episode(&self, args: serde_json::Value) -> Result<serde_json::Value, String>;
}

/// Which [`MemoryBackend`] operation a memory tool call maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOperation {
    /// Add an episode.
    AddEpisode,
    /// Search episodes/entities.
    Search,
    /// Remove an episode.
    RemoveEpisode,
}

/// One task the goal-completion evaluator inspects (spec.md §4.10
/// "Goal-completion evaluation").
#[derive(Debug, Clone)]
pub struct TaskItem {
    /// Task id.
    pub id: String,
    /// Current status.
    pub status: TaskStatus,
}

/// Lifecycle status of a task on the caller's task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Not started.
    Pending,
    /// Actively being worked.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Abandoned without completing.
    Cancelled,
    /// Finished unsuccessfully.
    Failed,
}

/// Reads the caller's task list, backing the `todoread` tool and the
/// goal-completion evaluator's task-list inspection path (spec.md §4.10).
#[async_trait]
pub trait TaskListSource: Send + Sync {
    /// List every task currently tracked for this session.
    async fn list(&self) -> Result<Vec<TaskItem>, String>;
}

/// Which capability a tool dispatches through.
pub enum ToolKind {
    /// A plain external tool (a sandboxed command, an API call, a
    /// `todowrite`/`abort`-style control tool — anything that doesn't
    /// need special-casing by the processor).
    External(Arc<dyn ExternalTool>),
    /// An MCP-UI-bound tool: executes like [`ToolKind::External`] but
    /// additionally emits an `McpAppResult` event (spec.md §4.10).
    McpUi {
        /// The underlying tool.
        tool: Arc<dyn ExternalTool>,
        /// Snake-case `resource_uri`, when the tool instance carries one
        /// directly (preferred over the `app_id` lookup).
        resource_uri: Option<String>,
        /// Id used to look up UI metadata in the relational store when
        /// `resource_uri` is absent.
        app_id: Option<String>,
    },
    /// A memory tool, dispatched to the session's [`MemoryBackend`].
    Memory(MemoryOperation),
    /// A HITL tool: invokes the matching `HitlHandler` method instead of
    /// an external collaborator (spec.md §4.10 "HITL tool").
    Hitl(HitlType),
}

/// One tool available to the model this step.
pub struct ToolDefinition {
    /// Tool name, as the model sees it.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input.
    pub input_schema: serde_json::Value,
    /// How this tool dispatches.
    pub kind: ToolKind,
}

impl ToolDefinition {
    /// A plain external tool.
    pub fn external(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        tool: Arc<dyn ExternalTool>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            kind: ToolKind::External(tool),
        }
    }

    /// A HITL tool for `hitl_type`.
    pub fn hitl(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        hitl_type: HitlType,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            kind: ToolKind::Hitl(hitl_type),
        }
    }

    /// A memory tool for `operation`.
    pub fn memory(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        operation: MemoryOperation,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            kind: ToolKind::Memory(operation),
        }
    }
}

/// Tool names the processor never restricts away, even under a forced
/// skill whose own tool set doesn't name them (spec.md §4.10
/// "Forced-skill tool filtering").
pub const ESSENTIAL_TOOL_NAMES: &[&str] = &["abort", "todowrite", "todoread"];

/// The tool name that re-enters skill selection; excluded from the
/// fallback set when a forced skill's own tools don't intersect what's
/// available (spec.md §4.10: "preventing re-entry into skill
/// selection").
pub const SKILL_LOADER_TOOL_NAME: &str = "skill_loader";

/// Restrict `available` to the forced-skill tool set, following spec.md
/// §4.10's exact rule: `allowed = forced_tools ∪ ESSENTIAL_TOOL_NAMES`,
/// intersected with what's actually available; if that intersection is
/// empty, fall back to `available` minus `skill_loader` (so the model
/// can't re-select a different skill mid-forced-run).
pub fn restrict_for_forced_skill<'a>(
    available: &'a [ToolDefinition],
    forced_tools: Option<&std::collections::HashSet<String>>,
) -> Vec<&'a ToolDefinition> {
    let Some(forced_tools) = forced_tools else {
        return available.iter().collect();
    };

    let restricted: Vec<&ToolDefinition> = available
        .iter()
        .filter(|t| forced_tools.contains(&t.name) || ESSENTIAL_TOOL_NAMES.contains(&t.name.as_str()))
        .collect();

    if restricted.is_empty() {
        available
            .iter()
            .filter(|t| t.name != SKILL_LOADER_TOOL_NAME)
            .collect()
    } else {
        restricted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_tool(name: &str) -> ToolDefinition {
        ToolDefinition::external(name, "", serde_json::json!({}), Arc::new(Echo))
    }

    struct Echo;
    #[async_trait]
    impl ExternalTool for Echo {
        async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, String> {
            Ok(args)
        }
    }

    #[test]
    fn no_forced_skill_keeps_everything() {
        let tools = vec![dummy_tool("a"), dummy_tool("b")];
        let restricted = restrict_for_forced_skill(&tools, None);
        assert_eq!(restricted.len(), 2);
    }

    #[test]
    fn forced_skill_intersection_plus_essentials() {
        let tools = vec![
            dummy_tool("search"),
            dummy_tool("write_file"),
            dummy_tool("abort"),
            dummy_tool("todowrite"),
            dummy_tool("todoread"),
            dummy_tool("unrelated"),
        ];
        let forced: std::collections::HashSet<String> = ["search".to_string()].into_iter().collect();
        let restricted = restrict_for_forced_skill(&tools, Some(&forced));
        let names: std::collections::HashSet<&str> =
            restricted.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            ["search", "abort", "todowrite", "todoread"]
                .into_iter()
                .collect()
        );
    }

    #[test]
    fn empty_intersection_falls_back_minus_skill_loader() {
        let tools = vec![
            dummy_tool("search"),
            dummy_tool("skill_loader"),
            dummy_tool("write_file"),
        ];
        let forced: std::collections::HashSet<String> = ["nonexistent".to_string()].into_iter().collect();
        let restricted = restrict_for_forced_skill(&tools, Some(&forced));
        let names: std::collections::HashSet<&str> =
            restricted.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["search", "write_file"].into_iter().collect());
    }
}
