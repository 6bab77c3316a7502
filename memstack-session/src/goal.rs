//! Goal-completion evaluation (spec.md §4.10 "Goal-completion
//! evaluation"): prefer inspecting the caller's task list; fall back to
//! an LLM self-check when there's nothing to inspect.

use crate::model::{ModelError, ModelRequest, SessionModel};
use crate::tool::{TaskItem, TaskListSource, TaskStatus};
use memstack_core::model::ChatMessage;
use regex::Regex;
use std::sync::Arc;

/// Where a [`GoalCheckResult`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalCheckSource {
    /// Derived from the task list.
    Tasks,
    /// The model's self-check returned unparseable text.
    AssistantText,
    /// The model's self-check parsed cleanly.
    LlmSelfCheck,
}

/// The outcome of one goal-completion evaluation.
#[derive(Debug, Clone)]
pub struct GoalCheckResult {
    /// Whether the goal is considered achieved.
    pub achieved: bool,
    /// Whether the driver should stop regardless of `achieved` (a task
    /// failed outright).
    pub should_stop: bool,
    /// Where this result came from.
    pub source: GoalCheckSource,
    /// Count of still-pending/in-progress tasks, when `source == Tasks`.
    pub pending: Option<usize>,
    /// Free-text reason, when available (LLM self-check path).
    pub reason: Option<String>,
}

impl GoalCheckResult {
    fn tasks(achieved: bool, should_stop: bool, pending: Option<usize>) -> Self {
        Self {
            achieved,
            should_stop,
            source: GoalCheckSource::Tasks,
            pending,
            reason: None,
        }
    }
}

const SELF_CHECK_PROMPT: &str = "Evaluate whether the user's goal has been fully \
achieved by the conversation so far. Respond with ONLY a JSON object of the \
shape {\"goal_achieved\": bool, \"reason\": string}.";

/// Evaluate goal completion: task-list inspection first, LLM self-check
/// otherwise (spec.md §4.10).
pub async fn evaluate_goal_completion(
    model: &Arc<dyn SessionModel>,
    model_id: &str,
    messages: &[ChatMessage],
    task_list: Option<&Arc<dyn TaskListSource>>,
) -> Result<GoalCheckResult, ModelError> {
    if let Some(source) = task_list {
        if let Ok(tasks) = source.list().await {
            if !tasks.is_empty() {
                return Ok(evaluate_from_tasks(&tasks));
            }
        }
    }

    let mut self_check_messages = messages.to_vec();
    self_check_messages.push(ChatMessage::user(SELF_CHECK_PROMPT));
    let request = ModelRequest {
        model: model_id.to_string(),
        messages: self_check_messages,
        tools: Vec::new(),
    };
    let response = model.complete(request).await?;
    let text = response.text();

    Ok(match parse_self_check(&text) {
        Some((achieved, reason)) => GoalCheckResult {
            achieved,
            should_stop: false,
            source: GoalCheckSource::LlmSelfCheck,
            pending: None,
            reason: Some(reason),
        },
        None => GoalCheckResult {
            achieved: false,
            should_stop: false,
            source: GoalCheckSource::AssistantText,
            pending: None,
            reason: None,
        },
    })
}

fn evaluate_from_tasks(tasks: &[TaskItem]) -> GoalCheckResult {
    if tasks.iter().any(|t| t.status == TaskStatus::Failed) {
        return GoalCheckResult::tasks(false, true, None);
    }
    let pending = tasks
        .iter()
        .filter(|t| matches!(t.status, TaskStatus::InProgress | TaskStatus::Pending))
        .count();
    if pending > 0 {
        return GoalCheckResult::tasks(false, false, Some(pending));
    }
    let all_terminal_success = tasks
        .iter()
        .all(|t| matches!(t.status, TaskStatus::Completed | TaskStatus::Cancelled));
    GoalCheckResult::tasks(all_terminal_success, false, Some(0))
}

/// Parse `{"goal_achieved": bool, "reason": string}` tolerating braces
/// embedded inside string values (spec.md §4.10 "The extractor tolerates
/// braces inside string values").
fn parse_self_check(text: &str) -> Option<(bool, String)> {
    if let Some(parsed) = try_parse_json(text) {
        return Some(parsed);
    }

    // Fall back to a regex extraction that ignores any brace structure
    // entirely, since a string value may itself contain `{`/`}`.
    let achieved_re = Regex::new(r#""goal_achieved"\s*:\s*(true|false)"#).ok()?;
    let reason_re = Regex::new(r#""reason"\s*:\s*"((?:[^"\\]|\\.)*)""#).ok()?;

    let achieved = achieved_re.captures(text)?.get(1)?.as_str() == "true";
    let reason = reason_re
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    Some((achieved, reason))
}

fn try_parse_json(text: &str) -> Option<(bool, String)> {
    let value: serde_json::Value = serde_json::from_str(text.trim()).ok().or_else(|| {
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        if end < start {
            return None;
        }
        serde_json::from_str(&text[start..=end]).ok()
    })?;
    let achieved = value.get("goal_achieved")?.as_bool()?;
    let reason = value
        .get("reason")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    Some((achieved, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json() {
        let (achieved, reason) =
            parse_self_check(r#"{"goal_achieved": true, "reason": "all done"}"#).unwrap();
        assert!(achieved);
        assert_eq!(reason, "all done");
    }

    #[test]
    fn tolerates_braces_inside_string_values() {
        let text = r#"{"goal_achieved": false, "reason": "need to run {step 2} still"}"#;
        let (achieved, reason) = parse_self_check(text).unwrap();
        assert!(!achieved);
        assert_eq!(reason, "need to run {step 2} still");
    }

    #[test]
    fn unparseable_returns_none() {
        assert!(parse_self_check("I think we're done").is_none());
    }

    #[test]
    fn tasks_all_terminal_success_is_achieved() {
        let tasks = vec![
            TaskItem {
                id: "1".into(),
                status: TaskStatus::Completed,
            },
            TaskItem {
                id: "2".into(),
                status: TaskStatus::Cancelled,
            },
        ];
        let result = evaluate_from_tasks(&tasks);
        assert!(result.achieved);
        assert!(!result.should_stop);
    }

    #[test]
    fn tasks_any_pending_is_not_achieved() {
        let tasks = vec![
            TaskItem {
                id: "1".into(),
                status: TaskStatus::Completed,
            },
            TaskItem {
                id: "2".into(),
                status: TaskStatus::InProgress,
            },
        ];
        let result = evaluate_from_tasks(&tasks);
        assert!(!result.achieved);
        assert_eq!(result.pending, Some(1));
    }

    #[test]
    fn tasks_any_failed_should_stop() {
        let tasks = vec![TaskItem {
            id: "1".into(),
            status: TaskStatus::Failed,
        }];
        let result = evaluate_from_tasks(&tasks);
        assert!(!result.achieved);
        assert!(result.should_stop);
    }
}
