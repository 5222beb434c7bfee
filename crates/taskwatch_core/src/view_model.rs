use crate::{ArticleStatus, SubscriptionId, TaskId, TaskStatus, TaskSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Login,
    Dashboard,
}

/// Sections that changed since the last render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dirty {
    pub screen: bool,
    pub login: bool,
    pub form: bool,
    pub history: bool,
    pub active_tasks: bool,
    pub log: bool,
}

impl Dirty {
    pub fn all() -> Self {
        Self {
            screen: true,
            login: true,
            form: true,
            history: true,
            active_tasks: true,
            log: true,
        }
    }

    pub fn any(&self) -> bool {
        self.screen || self.login || self.form || self.history || self.active_tasks || self.log
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SectionView<T> {
    #[default]
    NotLoaded,
    Loading,
    Loaded(Vec<T>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub screen: Screen,
    pub login: LoginView,
    pub form: FormView,
    pub history: SectionView<HistoryRowView>,
    pub history_notice: Option<String>,
    pub active_tasks: SectionView<ActiveTaskRowView>,
    pub log: LogView,
    pub dirty: Dirty,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoginView {
    pub username: String,
    pub password: String,
    pub remember: bool,
    pub submitting: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PrecheckView {
    #[default]
    Idle,
    Checking,
    Drm { encrypted: u32, total: u32 },
    Clear { total: u32 },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormView {
    pub bearer_token: String,
    pub precheck: PrecheckView,
    pub submitting: bool,
    pub status: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    GenerateArticle,
    RetryArticle,
    /// Disabled marker while generation runs.
    Generating,
    ViewArticleLog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRowView {
    pub task_id: TaskId,
    pub short_id: String,
    pub course_url: String,
    pub status: String,
    pub is_drm: Option<bool>,
    pub started_at: Option<String>,
    pub actions: Vec<HistoryAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveTaskAction {
    ViewLog,
    Waiting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTaskRowView {
    pub task_id: TaskId,
    pub short_id: String,
    pub course_url: String,
    pub status: String,
    pub action: ActiveTaskAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogView {
    pub title: Option<String>,
    /// Subscription the panel was opened for; changes on every attach.
    pub subscription: Option<SubscriptionId>,
    pub lines: Vec<String>,
    /// Lines appended since the panel was cleared; `lines` holds the newest of them.
    pub appended: u64,
    pub streaming: bool,
    pub notice: Option<String>,
}

pub(crate) fn history_row(item: &TaskSummary, generating: bool) -> HistoryRowView {
    HistoryRowView {
        task_id: item.id.clone(),
        short_id: item.id.short(),
        course_url: item.course_url.clone(),
        status: item.status.to_string(),
        is_drm: item.is_drm,
        started_at: item.started_at.clone(),
        actions: history_actions(item, generating),
    }
}

fn history_actions(item: &TaskSummary, generating: bool) -> Vec<HistoryAction> {
    use HistoryAction::*;

    if generating || item.status == TaskStatus::GeneratingArticle {
        return vec![Generating, ViewArticleLog];
    }
    if item.status == TaskStatus::Success {
        return vec![GenerateArticle, ViewArticleLog];
    }
    match item.article_status {
        Some(ArticleStatus::Failed) => vec![RetryArticle, ViewArticleLog],
        Some(ArticleStatus::Success) => vec![ViewArticleLog],
        _ => Vec::new(),
    }
}

pub(crate) fn active_task_row(item: &TaskSummary) -> ActiveTaskRowView {
    let action = if item.status == TaskStatus::Queued {
        ActiveTaskAction::Waiting
    } else {
        ActiveTaskAction::ViewLog
    };
    ActiveTaskRowView {
        task_id: item.id.clone(),
        short_id: item.id.short(),
        course_url: item.course_url.clone(),
        status: item.status.to_string(),
        action,
    }
}
