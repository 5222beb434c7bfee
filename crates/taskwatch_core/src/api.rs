//! Wire model of the job service's HTTP contract.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{TaskId, TaskSummary};

/// Correlates an issued call with the message reporting its completion.
pub type CallTicket = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A non-success response (or a call that never produced one), reduced to one
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RequestError {
    pub status: Option<u16>,
    pub message: String,
}

impl RequestError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrecheckRequest {
    pub course_url: String,
    pub bearer_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PrecheckReport {
    pub is_drm: bool,
    #[serde(default)]
    pub total_lectures: u32,
    #[serde(default)]
    pub encrypted_lectures: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub kid: String,
    pub key: String,
}

impl KeyEntry {
    /// Parses a `KID:KEY` pair; either half missing yields `None`.
    pub fn parse_pair(raw: &str) -> Option<Self> {
        let (kid, key) = raw.split_once(':')?;
        let (kid, key) = (kid.trim(), key.trim());
        if kid.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self {
            kid: kid.to_string(),
            key: key.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DownloadRequest {
    pub course_url: String,
    pub bearer_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrent_downloads: Option<u32>,
    pub chapter_filter: Option<String>,
    pub download_assets: bool,
    pub download_captions: bool,
    pub download_quizzes: bool,
    pub skip_lectures: bool,
    pub keep_vtt: bool,
    pub skip_hls: bool,
    pub use_h265: bool,
    pub use_nvenc: bool,
    pub use_continuous_lecture_numbers: bool,
    pub key_entries: Vec<KeyEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DownloadAccepted {
    pub task_id: TaskId,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleRequest {
    pub status: String,
}

impl Default for ArticleRequest {
    fn default() -> Self {
        Self {
            status: "draft".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Login(LoginRequest),
    History,
    Tasks,
    Precheck(PrecheckRequest),
    Download(DownloadRequest),
    GenerateArticle {
        task_id: TaskId,
        request: ArticleRequest,
    },
}

impl ApiCall {
    pub fn method(&self) -> HttpMethod {
        match self {
            ApiCall::History | ApiCall::Tasks => HttpMethod::Get,
            ApiCall::Login(_)
            | ApiCall::Precheck(_)
            | ApiCall::Download(_)
            | ApiCall::GenerateArticle { .. } => HttpMethod::Post,
        }
    }

    pub fn path(&self) -> String {
        match self {
            ApiCall::Login(_) => "/api/login".to_string(),
            ApiCall::History => "/api/history".to_string(),
            ApiCall::Tasks => "/api/tasks".to_string(),
            ApiCall::Precheck(_) => "/api/precheck".to_string(),
            ApiCall::Download(_) => "/api/download".to_string(),
            ApiCall::GenerateArticle { task_id, .. } => {
                format!("/api/history/{task_id}/generate-article")
            }
        }
    }

    /// JSON request body, if the call carries one.
    pub fn body(&self) -> Result<Option<Vec<u8>>, serde_json::Error> {
        let body = match self {
            ApiCall::History | ApiCall::Tasks => return Ok(None),
            ApiCall::Login(request) => serde_json::to_vec(request)?,
            ApiCall::Precheck(request) => serde_json::to_vec(request)?,
            ApiCall::Download(request) => serde_json::to_vec(request)?,
            ApiCall::GenerateArticle { request, .. } => serde_json::to_vec(request)?,
        };
        Ok(Some(body))
    }

    pub fn label(&self) -> &'static str {
        match self {
            ApiCall::Login(_) => "login",
            ApiCall::History => "history",
            ApiCall::Tasks => "tasks",
            ApiCall::Precheck(_) => "precheck",
            ApiCall::Download(_) => "download",
            ApiCall::GenerateArticle { .. } => "generate-article",
        }
    }
}

/// Decoded success payload of an [`ApiCall`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiReply {
    Login(LoginResponse),
    History(Vec<TaskSummary>),
    Tasks(Vec<TaskSummary>),
    Precheck(PrecheckReport),
    Download(DownloadAccepted),
    ArticleQueued,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_pair_requires_both_halves() {
        assert_eq!(
            KeyEntry::parse_pair(" ab12 : cd34 "),
            Some(KeyEntry {
                kid: "ab12".to_string(),
                key: "cd34".to_string()
            })
        );
        assert_eq!(KeyEntry::parse_pair("ab12:"), None);
        assert_eq!(KeyEntry::parse_pair("ab12"), None);
    }

    #[test]
    fn calls_map_to_service_routes() {
        let task_id = TaskId::parse("abc").unwrap();
        let call = ApiCall::GenerateArticle {
            task_id,
            request: ArticleRequest::default(),
        };
        assert_eq!(call.method(), HttpMethod::Post);
        assert_eq!(call.path(), "/api/history/abc/generate-article");
        assert_eq!(
            call.body().unwrap(),
            Some(br#"{"status":"draft"}"#.to_vec())
        );
        assert_eq!(ApiCall::Tasks.method(), HttpMethod::Get);
        assert_eq!(ApiCall::Tasks.body().unwrap(), None);
    }
}
