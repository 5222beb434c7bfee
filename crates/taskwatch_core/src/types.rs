use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend-assigned job identifier, validated so it is safe to splice into a path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid task id {raw:?}")]
pub struct InvalidTaskId {
    pub raw: String,
}

impl TaskId {
    pub fn parse(raw: &str) -> Result<Self, InvalidTaskId> {
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if valid {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidTaskId {
                raw: raw.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last six characters, upper-cased; what the dashboard shows next to a row.
    pub fn short(&self) -> String {
        let start = self.0.len().saturating_sub(6);
        self.0[start..].to_ascii_uppercase()
    }
}

impl TryFrom<String> for TaskId {
    type Error = InvalidTaskId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TaskId> for String {
    fn from(value: TaskId) -> Self {
        value.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Queued,
    Running,
    Success,
    Failed,
    Cancelled,
    GeneratingArticle,
    ArticleGenerated,
    ArticleFailed,
    Other(String),
}

impl TaskStatus {
    /// No further log lines are expected once a task reaches one of these.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::GeneratingArticle => "生成文章中",
            TaskStatus::ArticleGenerated => "已生成",
            TaskStatus::ArticleFailed => "生成失败",
            TaskStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "queued" => TaskStatus::Queued,
            "running" => TaskStatus::Running,
            "success" => TaskStatus::Success,
            "failed" => TaskStatus::Failed,
            "cancelled" => TaskStatus::Cancelled,
            "生成文章中" => TaskStatus::GeneratingArticle,
            "已生成" => TaskStatus::ArticleGenerated,
            "生成失败" => TaskStatus::ArticleFailed,
            _ => TaskStatus::Other(value),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(value: TaskStatus) -> Self {
        match value {
            TaskStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArticleStatus {
    Running,
    Success,
    Failed,
    Other(String),
}

impl From<String> for ArticleStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "running" => ArticleStatus::Running,
            "success" => ArticleStatus::Success,
            "failed" => ArticleStatus::Failed,
            _ => ArticleStatus::Other(value),
        }
    }
}

impl From<ArticleStatus> for String {
    fn from(value: ArticleStatus) -> Self {
        match value {
            ArticleStatus::Running => "running".to_string(),
            ArticleStatus::Success => "success".to_string(),
            ArticleStatus::Failed => "failed".to_string(),
            ArticleStatus::Other(raw) => raw,
        }
    }
}

/// One job record as the backend reports it, in either the history or the task list.
///
/// History items carry the identifier under `task_id`, task items under `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    #[serde(alias = "task_id")]
    pub id: TaskId,
    #[serde(default)]
    pub course_url: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub is_drm: Option<bool>,
    #[serde(default)]
    pub article_status: Option<ArticleStatus>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Which push channel a subscription reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    Download,
    Article,
}

impl LogKind {
    /// Server path of the push channel for `task_id`, without the credential query.
    pub fn stream_path(self, task_id: &TaskId) -> String {
        match self {
            LogKind::Download => format!("/api/tasks/{task_id}/logs"),
            LogKind::Article => format!("/api/history/{task_id}/article/logs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedTask {
    pub task_id: TaskId,
    pub kind: LogKind,
}
