//! Task assistant: prompts, JSON extraction and typed proposals.
//!
//! Proposals are suggestions only. Nothing here writes to the store or touches ordering;
//! the caller decides what to persist (for example through `create_subtasks`).

use std::sync::{Arc, OnceLock};

use chrono::NaiveDate;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::TextGenError;
use super::TextGenerator;
use crate::model::{normalize_labels, TaskContext};

/// Colour labels the board renders; suggested tags map urgency onto these.
pub const AVAILABLE_LABELS: &[&str] = &["Green", "Yellow", "Red", "Blue", "Purple"];

const MAX_PROPOSED_LABELS: usize = 5;
const MAX_PROPOSED_SUBTASKS: usize = 6;
const MAX_SUGGESTED_TAGS: usize = 7;

fn think_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("static regex"))
}

fn code_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:json)?\n?").expect("static regex"))
}

/// Pull a JSON object out of model output.
///
/// Reasoning blocks and code fences are stripped first; if the rest still does not parse,
/// the span from the first `{` to the last `}` is tried.
pub fn extract_json<T: DeserializeOwned>(content: &str) -> Result<T, TextGenError> {
    let without_think = think_block().replace_all(content, "");
    let cleaned = code_fence().replace_all(&without_think, "");
    let cleaned = cleaned.trim();

    if let Ok(value) = serde_json::from_str(cleaned) {
        return Ok(value);
    }

    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if end > start => {
            serde_json::from_str(&cleaned[start..=end]).map_err(|e| {
                TextGenError::parse_error(format!("Model returned malformed JSON: {}", e))
            })
        }
        _ => Err(TextGenError::parse_error(
            "Could not find valid JSON in model response".to_string(),
        )),
    }
}

/// Tone for `rewrite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Professional,
    Concise,
    Friendly,
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tone::Professional => write!(f, "professional"),
            Tone::Concise => write!(f, "concise"),
            Tone::Friendly => write!(f, "friendly"),
        }
    }
}

/// A full rework of a task: better title, longer description, labels, sub-tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProposal {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub suggested_due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteProposal {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Markdown text.
    pub update: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSuggestion {
    pub tags: Vec<String>,
}

/// Models sometimes answer "N/A" or a full timestamp; anything that isn't a plain date is dropped.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        let s = s.trim();
        NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d").ok()
    }))
}

fn require_title(title: &str) -> Result<String, TextGenError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(TextGenError::parse_error(
            "Model proposed an empty title".to_string(),
        ));
    }
    Ok(title.to_string())
}

fn clean_list(items: Vec<String>, max: usize) -> Vec<String> {
    normalize_labels(items).into_iter().take(max).collect()
}

fn describe(ctx: &TaskContext) -> String {
    ctx.task.description.clone().unwrap_or_default()
}

/// Prompts the text generator on behalf of a task.
#[derive(Clone)]
pub struct TaskAssistant {
    generator: Arc<dyn TextGenerator>,
}

impl TaskAssistant {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    async fn ask<T: DeserializeOwned>(&self, system: &str, user: &str) -> Result<T, TextGenError> {
        let content = self.generator.complete(system, user).await?;
        extract_json(&content)
    }

    pub async fn make_perfect(&self, ctx: &TaskContext) -> Result<TaskProposal, TextGenError> {
        let system = "You are a project optimization expert. Propose a professional title, \
expanded description, 3-5 labels, and 4-6 sub-tasks.
Respond with NOTHING except a JSON object:
{
  \"title\": \"Optimized Title\",
  \"description\": \"Expanded description...\",
  \"labels\": [\"label1\", \"label2\"],
  \"subtasks\": [\"subtask 1\", \"subtask 2\"],
  \"suggestedDueDate\": \"YYYY-MM-DD\"
}";
        let user = format!(
            "Task: {}\nDescription: {}\nList: {}\nBoard: {}",
            ctx.task.title,
            describe(ctx),
            ctx.list_title,
            ctx.board_name
        );
        let mut proposal: TaskProposal = self.ask(system, &user).await?;
        proposal.title = require_title(&proposal.title)?;
        proposal.description = proposal.description.trim().to_string();
        proposal.labels = clean_list(proposal.labels, MAX_PROPOSED_LABELS);
        proposal.subtasks = clean_list(proposal.subtasks, MAX_PROPOSED_SUBTASKS);
        Ok(proposal)
    }

    pub async fn rewrite(
        &self,
        ctx: &TaskContext,
        tone: Tone,
    ) -> Result<RewriteProposal, TextGenError> {
        let system = format!(
            "Rewrite this task to be {}. Respond with NOTHING except JSON: \
{{ \"title\": \"...\", \"description\": \"...\" }}",
            tone
        );
        let user = format!("Title: {}\nDescription: {}", ctx.task.title, describe(ctx));
        let mut proposal: RewriteProposal = self.ask(&system, &user).await?;
        proposal.title = require_title(&proposal.title)?;
        proposal.description = proposal.description.trim().to_string();
        Ok(proposal)
    }

    pub async fn status_update(&self, ctx: &TaskContext) -> Result<StatusUpdate, TextGenError> {
        let system = "Write a professional status update. Respond with NOTHING except JSON: \
{ \"update\": \"markdown text\" }";
        let user = format!(
            "Task: {}\nDescription: {}\nLabels: {}\nCompleted: {}",
            ctx.task.title,
            describe(ctx),
            ctx.task.labels.join(", "),
            ctx.task.completed
        );
        let update: StatusUpdate = self.ask(system, &user).await?;
        if update.update.trim().is_empty() {
            return Err(TextGenError::parse_error(
                "Model returned an empty status update".to_string(),
            ));
        }
        Ok(update)
    }

    pub async fn suggest_tags(&self, ctx: &TaskContext) -> Result<TagSuggestion, TextGenError> {
        let system = format!(
            "Suggest 4-7 relevant labels. Map urgency to {}. \
Respond with NOTHING except JSON: {{\"tags\": [\"Tag1\"]}}",
            AVAILABLE_LABELS
                .iter()
                .map(|l| format!("\"{}\"", l))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let due = ctx
            .task
            .due_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "none".to_string());
        let user = format!(
            "Title: {}\nDescription: {}\nDue: {}",
            ctx.task.title,
            describe(ctx),
            due
        );
        let suggestion: TagSuggestion = self.ask(&system, &user).await?;
        Ok(TagSuggestion {
            tags: clean_list(suggestion.tags, MAX_SUGGESTED_TAGS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Task;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Replays a canned answer and records the prompts it saw.
    struct CannedGenerator {
        answer: String,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl CannedGenerator {
        fn new(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn complete(&self, system: &str, user: &str) -> Result<String, TextGenError> {
            self.prompts
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            Ok(self.answer.clone())
        }
    }

    fn context() -> TaskContext {
        TaskContext {
            task: Task {
                id: Uuid::new_v4(),
                list_id: Uuid::new_v4(),
                parent_id: None,
                title: "fix login".to_string(),
                order: 0,
                completed: false,
                labels: vec!["Red".to_string()],
                due_date: None,
                description: Some("users get logged out".to_string()),
                created_at: String::new(),
                updated_at: String::new(),
            },
            list_title: "Todo".to_string(),
            board_name: "Web".to_string(),
            workspace_name: "Acme".to_string(),
            workspace_slug: "acme-x1y2z".to_string(),
        }
    }

    #[test]
    fn test_extract_json_strips_think_and_fences() {
        let raw = concat!(
            "<think>\nlet me think {not json}\n</think>\n",
            "```json\n{\"update\": \"done\"}\n```"
        );
        let parsed: StatusUpdate = extract_json(raw).unwrap();
        assert_eq!(parsed.update, "done");
    }

    #[test]
    fn test_extract_json_falls_back_to_braces() {
        let raw = "Sure! Here you go: {\"tags\": [\"Red\", \"Backend\"]} Hope that helps.";
        let parsed: TagSuggestion = extract_json(raw).unwrap();
        assert_eq!(parsed.tags, vec!["Red", "Backend"]);
    }

    #[test]
    fn test_extract_json_without_object_is_parse_error() {
        let err = extract_json::<StatusUpdate>("I cannot help with that").unwrap_err();
        assert_eq!(err.kind, super::super::TextGenErrorKind::ParseError);
    }

    #[tokio::test]
    async fn test_make_perfect_trims_lists_and_parses_date() {
        let generator = CannedGenerator::new(
            r#"{"title": " Fix session expiry ", "description": "Investigate",
                "labels": ["Red", "red", "Auth", "Bug", "Web", "Urgent", "Extra"],
                "subtasks": ["a", "b", "c", "d", "e", "f", "g"],
                "suggestedDueDate": "2026-11-02"}"#,
        );
        let assistant = TaskAssistant::new(generator.clone());
        let proposal = assistant.make_perfect(&context()).await.unwrap();

        assert_eq!(proposal.title, "Fix session expiry");
        assert_eq!(proposal.labels, vec!["Red", "Auth", "Bug", "Web", "Urgent"]);
        assert_eq!(proposal.subtasks.len(), 6);
        assert_eq!(proposal.suggested_due_date, NaiveDate::from_ymd_opt(2026, 11, 2));

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].1.contains("Task: fix login"));
        assert!(prompts[0].1.contains("users get logged out"));
    }

    #[tokio::test]
    async fn test_make_perfect_ignores_unparseable_date() {
        let generator = CannedGenerator::new(r#"{"title": "T", "suggestedDueDate": "soon"}"#);
        let proposal = TaskAssistant::new(generator)
            .make_perfect(&context())
            .await
            .unwrap();
        assert_eq!(proposal.suggested_due_date, None);
    }

    #[tokio::test]
    async fn test_rewrite_uses_tone_and_rejects_empty_title() {
        let generator = CannedGenerator::new(r#"{"title": "", "description": "x"}"#);
        let err = TaskAssistant::new(generator.clone())
            .rewrite(&context(), Tone::Concise)
            .await
            .unwrap_err();
        assert_eq!(err.kind, super::super::TextGenErrorKind::ParseError);
        assert!(generator.prompts.lock().unwrap()[0].0.contains("to be concise"));
    }

    #[tokio::test]
    async fn test_suggest_tags_caps_at_seven() {
        let generator = CannedGenerator::new(
            r#"{"tags": ["1", "2", "3", "4", "5", "6", "7", "8", "9"]}"#,
        );
        let tags = TaskAssistant::new(generator.clone())
            .suggest_tags(&context())
            .await
            .unwrap();
        assert_eq!(tags.tags.len(), 7);
        assert!(generator.prompts.lock().unwrap()[0].0.contains("\"Purple\""));
    }

    #[tokio::test]
    async fn test_status_update_round_trips_markdown() {
        let generator = CannedGenerator::new(r#"{"update": "**On track**"}"#);
        let update = TaskAssistant::new(generator)
            .status_update(&context())
            .await
            .unwrap();
        assert_eq!(update.update, "**On track**");
    }

    #[test]
    fn test_tone_parses_lowercase() {
        let tone: Tone = serde_json::from_str("\"friendly\"").unwrap();
        assert_eq!(tone, Tone::Friendly);
    }
}
