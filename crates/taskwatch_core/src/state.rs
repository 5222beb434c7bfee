use std::collections::{BTreeMap, BTreeSet};

use watch_logging::{watch_debug, watch_info, watch_trace, watch_warn};

use crate::api::{
    ApiCall, ApiReply, ArticleRequest, CallTicket, DownloadRequest, KeyEntry, LoginRequest,
    PrecheckReport, PrecheckRequest, RequestError,
};
use crate::change::SnapshotFeed;
use crate::log_buffer::FlushToken;
use crate::msg::DownloadForm;
use crate::session::{RestoredSession, Session, StoreChange};
use crate::stream::{StreamController, StreamEvent, StreamOutcome, SubscriptionId};
use crate::view_model::{
    active_task_row, history_row, AppViewModel, Dirty, FormView, LogView, LoginView,
    PrecheckView, Screen, SectionView,
};
use crate::{Effect, LogKind, ObservedTask, TaskId, TaskSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    History,
    Tasks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingCall {
    Login {
        username: String,
        password: String,
        remember: bool,
    },
    Snapshot {
        feed: Feed,
        seq: u64,
        force: bool,
    },
    Precheck,
    Download {
        bearer_token: String,
    },
    GenerateArticle {
        task_id: TaskId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum Section {
    #[default]
    NotLoaded,
    Loading,
    Loaded(Vec<TaskSummary>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    screen: Screen,
    session: Session,
    default_bearer: String,
    stream: StreamController,
    history_feed: SnapshotFeed,
    tasks_feed: SnapshotFeed,
    history: Section,
    history_notice: Option<String>,
    active_tasks: Section,
    generating: BTreeSet<TaskId>,
    pending: BTreeMap<CallTicket, PendingCall>,
    last_ticket: CallTicket,
    login: LoginView,
    form: FormView,
    log: LogView,
    dirty: Dirty,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State whose job form falls back to `bearer` when nothing was remembered.
    pub fn with_default_bearer(bearer: impl Into<String>) -> Self {
        let default_bearer = bearer.into();
        Self {
            form: FormView {
                bearer_token: default_bearer.clone(),
                ..FormView::default()
            },
            default_bearer,
            ..Self::default()
        }
    }

    pub fn view(&self) -> AppViewModel {
        let history = match &self.history {
            Section::NotLoaded => SectionView::NotLoaded,
            Section::Loading => SectionView::Loading,
            Section::Failed(message) => SectionView::Failed(message.clone()),
            Section::Loaded(items) => SectionView::Loaded(
                items
                    .iter()
                    .map(|item| history_row(item, self.generating.contains(&item.id)))
                    .collect(),
            ),
        };
        let active_tasks = match &self.active_tasks {
            Section::NotLoaded => SectionView::NotLoaded,
            Section::Loading => SectionView::Loading,
            Section::Failed(message) => SectionView::Failed(message.clone()),
            Section::Loaded(items) => SectionView::Loaded(items.iter().map(active_task_row).collect()),
        };
        AppViewModel {
            screen: self.screen,
            login: self.login.clone(),
            form: self.form.clone(),
            history,
            history_notice: self.history_notice.clone(),
            active_tasks,
            log: LogView {
                streaming: self.stream.is_open(),
                ..self.log.clone()
            },
            dirty: self.dirty,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn stream(&self) -> &StreamController {
        &self.stream
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// Returns the sections changed since the previous call and resets them.
    pub fn consume_dirty(&mut self) -> Dirty {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn restore(&mut self, restored: RestoredSession) {
        self.session.restore(&restored);
        if let Some(remembered) = restored.remembered_login {
            self.login.username = remembered.username;
            self.login.password = remembered.password;
            self.login.remember = true;
        }
        self.form.bearer_token = self
            .session
            .bearer_override()
            .map(str::to_string)
            .unwrap_or_else(|| self.default_bearer.clone());
        self.dirty.login = true;
        self.dirty.form = true;
    }

    /// Guard for the dashboard: without a credential nothing else is initialized.
    pub(crate) fn open_dashboard(&mut self) -> Vec<Effect> {
        if !self.session.is_authenticated() {
            watch_info!("No credential present; showing login view");
            self.set_screen(Screen::Login);
            return Vec::new();
        }
        self.set_screen(Screen::Dashboard);
        let mut effects = vec![Effect::StartPolling];
        effects.extend(self.refresh(Feed::History, true));
        effects.extend(self.refresh(Feed::Tasks, true));
        effects
    }

    pub(crate) fn submit_login(
        &mut self,
        username: String,
        password: String,
        remember: bool,
    ) -> Vec<Effect> {
        let username = username.trim().to_string();
        let password = password.trim().to_string();
        self.dirty.login = true;
        if username.is_empty() || password.is_empty() {
            self.login.error = Some("Username and password are required".to_string());
            return Vec::new();
        }
        self.login.username = username.clone();
        self.login.remember = remember;
        self.login.submitting = true;
        self.login.error = None;
        let call = ApiCall::Login(LoginRequest {
            username: username.clone(),
            password: password.clone(),
        });
        let pending = PendingCall::Login {
            username,
            password,
            remember,
        };
        // Login never carries a credential, stale or not.
        vec![self.issue(call, pending, None)]
    }

    pub(crate) fn logout(&mut self) -> Vec<Effect> {
        watch_info!("Logging out");
        let mut effects = vec![Effect::Persist(StoreChange::ClearCredential)];
        effects.extend(self.stream.detach());
        effects.push(Effect::StopPolling);

        self.session.sign_out();
        self.stream.clear_panel();
        self.pending.clear();
        self.history_feed.reset();
        self.tasks_feed.reset();
        self.history = Section::NotLoaded;
        self.history_notice = None;
        self.active_tasks = Section::NotLoaded;
        self.generating.clear();
        self.log = LogView::default();
        self.login.password.clear();
        self.login.submitting = false;
        self.screen = Screen::Login;
        self.dirty = Dirty::all();
        effects
    }

    /// Requests a snapshot; background requests are gated by the change detector.
    pub(crate) fn refresh(&mut self, feed: Feed, force: bool) -> Option<Effect> {
        let credential = self.session.credential()?.to_string();
        let seq = self.feed_mut(feed).begin(force)?;
        if force {
            self.set_section(feed, Section::Loading);
        }
        let call = match feed {
            Feed::History => ApiCall::History,
            Feed::Tasks => ApiCall::Tasks,
        };
        Some(self.issue(call, PendingCall::Snapshot { feed, seq, force }, Some(credential)))
    }

    /// Background-style refresh that is issued even while another request for
    /// `feed` is outstanding. Rendering is still gated by the change detector.
    fn refresh_unqueued(&mut self, feed: Feed) -> Option<Effect> {
        let credential = self.session.credential()?.to_string();
        let seq = self.feed_mut(feed).begin_unqueued();
        let call = match feed {
            Feed::History => ApiCall::History,
            Feed::Tasks => ApiCall::Tasks,
        };
        let pending = PendingCall::Snapshot {
            feed,
            seq,
            force: false,
        };
        Some(self.issue(call, pending, Some(credential)))
    }

    pub(crate) fn poll_tick(&mut self) -> Vec<Effect> {
        if !self.session.is_authenticated() {
            return Vec::new();
        }
        watch_trace!("Poll tick");
        let mut effects = Vec::with_capacity(2);
        effects.extend(self.refresh(Feed::History, false));
        effects.extend(self.refresh(Feed::Tasks, false));
        effects
    }

    pub(crate) fn request_precheck(&mut self, course_url: String, bearer_token: String) -> Vec<Effect> {
        let Some(credential) = self.session.credential().map(str::to_string) else {
            return Vec::new();
        };
        let course_url = course_url.trim().to_string();
        self.dirty.form = true;
        if course_url.is_empty() {
            self.form.precheck = PrecheckView::Failed("Course URL is required".to_string());
            return Vec::new();
        }
        self.form.precheck = PrecheckView::Checking;
        let call = ApiCall::Precheck(PrecheckRequest {
            course_url,
            bearer_token: bearer_token.trim().to_string(),
        });
        vec![self.issue(call, PendingCall::Precheck, Some(credential))]
    }

    pub(crate) fn request_download(&mut self, form: DownloadForm) -> Vec<Effect> {
        let Some(credential) = self.session.credential().map(str::to_string) else {
            return Vec::new();
        };
        self.dirty.form = true;
        self.form.status = None;
        let course_url = form.course_url.trim().to_string();
        let bearer_token = form
            .bearer_token
            .map(|bearer| bearer.trim().to_string())
            .unwrap_or_else(|| self.form.bearer_token.clone());
        if course_url.is_empty() || bearer_token.is_empty() {
            self.form.error = Some("Course URL and bearer token are required".to_string());
            return Vec::new();
        }
        if self.form.submitting {
            return Vec::new();
        }

        let key_entries = form
            .drm_pair
            .as_deref()
            .and_then(KeyEntry::parse_pair)
            .into_iter()
            .collect();
        let chapter_filter = form
            .chapter_filter
            .map(|filter| filter.trim().to_string())
            .filter(|filter| !filter.is_empty());
        let request = DownloadRequest {
            course_url,
            bearer_token: bearer_token.clone(),
            chapter_filter,
            download_assets: form.download_assets,
            key_entries,
            ..DownloadRequest::default()
        };
        self.form.submitting = true;
        self.form.error = None;
        vec![self.issue(
            ApiCall::Download(request),
            PendingCall::Download { bearer_token },
            Some(credential),
        )]
    }

    pub(crate) fn request_article(&mut self, raw_task_id: &str) -> Vec<Effect> {
        let Some(credential) = self.session.credential().map(str::to_string) else {
            return Vec::new();
        };
        let task_id = match TaskId::parse(raw_task_id) {
            Ok(task_id) => task_id,
            Err(err) => {
                self.history_notice = Some(err.to_string());
                self.dirty.history = true;
                return Vec::new();
            }
        };
        if !self.generating.insert(task_id.clone()) {
            return Vec::new();
        }
        self.history_notice = None;
        self.dirty.history = true;
        let call = ApiCall::GenerateArticle {
            task_id: task_id.clone(),
            request: ArticleRequest::default(),
        };
        vec![self.issue(call, PendingCall::GenerateArticle { task_id }, Some(credential))]
    }

    /// Points the live log at `raw_task_id`; errors surface on the log panel.
    pub(crate) fn attach(&mut self, raw_task_id: &str, kind: LogKind) -> Vec<Effect> {
        self.dirty.log = true;
        let task_id = match TaskId::parse(raw_task_id) {
            Ok(task_id) => task_id,
            Err(err) => {
                self.log.notice = Some(err.to_string());
                return Vec::new();
            }
        };
        let Some(credential) = self.session.credential().map(str::to_string) else {
            self.log.notice = Some("Sign in before attaching to a task".to_string());
            return Vec::new();
        };

        watch_info!("Attaching to {:?} log of task {}", kind, task_id);
        self.log = LogView {
            title: Some(self.log_title(&task_id, kind)),
            ..LogView::default()
        };
        self.session.observe(ObservedTask {
            task_id: task_id.clone(),
            kind,
        });
        let effects = self.stream.attach(task_id, kind, &credential);
        self.log.subscription = self.stream.subscription();
        effects
    }

    pub(crate) fn detach(&mut self) -> Vec<Effect> {
        let effects: Vec<Effect> = self.stream.detach().into_iter().collect();
        if !effects.is_empty() {
            self.log.notice = Some("Detached from live log".to_string());
            self.dirty.log = true;
        }
        effects
    }

    pub(crate) fn stream_event(
        &mut self,
        subscription: SubscriptionId,
        event: StreamEvent,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.stream.handle(subscription, event, &mut effects) {
            StreamOutcome::Ignored => {
                watch_trace!("Dropping event for closed subscription {}", subscription);
            }
            StreamOutcome::Appended => {}
            StreamOutcome::Ended { task_id, kind } => {
                watch_info!("{:?} log of task {} ended", kind, task_id);
                self.log = LogView {
                    notice: Some(format!("Log stream for task {} ended", task_id.short())),
                    ..LogView::default()
                };
                self.dirty.log = true;
                // The terminal job state must show now, not on the next tick.
                effects.extend(self.refresh(Feed::History, true));
                effects.extend(self.refresh(Feed::Tasks, true));
            }
            StreamOutcome::Dropped { task_id, kind } => {
                watch_warn!("{:?} log of task {} dropped", kind, task_id);
                self.log.notice = Some(format!(
                    "Connection to task {} lost; attach again to resume",
                    task_id.short()
                ));
                self.dirty.log = true;
            }
        }
        effects
    }

    pub(crate) fn flush_log(&mut self, token: FlushToken) {
        if self.stream.take_flush(token) {
            self.log.lines = self.stream.log().snapshot();
            self.log.appended = self.stream.log().appended();
            self.dirty.log = true;
        }
    }

    pub(crate) fn complete_call(
        &mut self,
        ticket: CallTicket,
        result: Result<ApiReply, RequestError>,
    ) -> Vec<Effect> {
        let Some(pending) = self.pending.remove(&ticket) else {
            watch_debug!("Ignoring completion of unknown call {}", ticket);
            return Vec::new();
        };
        match pending {
            PendingCall::Login {
                username,
                password,
                remember,
            } => self.finish_login(result, username, password, remember),
            PendingCall::Snapshot { feed, seq, force } => {
                self.finish_snapshot(feed, seq, force, result)
            }
            PendingCall::Precheck => {
                self.finish_precheck(result);
                Vec::new()
            }
            PendingCall::Download { bearer_token } => self.finish_download(result, bearer_token),
            PendingCall::GenerateArticle { task_id } => self.finish_article(result, task_id),
        }
    }

    fn finish_login(
        &mut self,
        result: Result<ApiReply, RequestError>,
        username: String,
        password: String,
        remember: bool,
    ) -> Vec<Effect> {
        self.login.submitting = false;
        self.dirty.login = true;
        let token = match result {
            Ok(ApiReply::Login(response)) => response.token,
            Ok(other) => {
                self.login.error = Some(unexpected_reply(&other).message);
                return Vec::new();
            }
            Err(err) => {
                watch_warn!("Login failed: {}", err);
                self.login.error = Some(err.message);
                return Vec::new();
            }
        };

        watch_info!("Signed in as {}", username);
        self.session.sign_in(token.clone());
        self.login.error = None;
        let mut effects = vec![Effect::Persist(StoreChange::SaveCredential(token))];
        if remember {
            effects.push(Effect::Persist(StoreChange::RememberLogin { username, password }));
        } else {
            self.login.password.clear();
            effects.push(Effect::Persist(StoreChange::ForgetLogin));
        }
        effects.extend(self.open_dashboard());
        effects
    }

    fn finish_snapshot(
        &mut self,
        feed: Feed,
        seq: u64,
        force: bool,
        result: Result<ApiReply, RequestError>,
    ) -> Vec<Effect> {
        if !self.feed_mut(feed).complete(seq) {
            watch_trace!("Discarding stale {:?} snapshot {}", feed, seq);
            return Vec::new();
        }
        let items = match (feed, result) {
            (Feed::History, Ok(ApiReply::History(items))) => items,
            (Feed::Tasks, Ok(ApiReply::Tasks(items))) => items
                .into_iter()
                .filter(|task| !task.status.is_terminal())
                .collect(),
            (_, Ok(other)) => return self.snapshot_failed(feed, force, unexpected_reply(&other)),
            (_, Err(err)) => return self.snapshot_failed(feed, force, err),
        };

        if !self.feed_mut(feed).detector_mut().observe(items.as_slice(), force) {
            return Vec::new();
        }
        let now_empty = items.is_empty();
        self.set_section(feed, Section::Loaded(items));

        let mut effects = Vec::new();
        if feed == Feed::Tasks && now_empty && self.stream.open_kind() == Some(LogKind::Download) {
            watch_info!("No active tasks left; closing download log");
            effects.extend(self.stream.detach());
            self.stream.clear_panel();
            self.log = LogView::default();
            self.dirty.log = true;
        }
        effects
    }

    fn snapshot_failed(&mut self, feed: Feed, force: bool, err: RequestError) -> Vec<Effect> {
        if force {
            watch_warn!("{:?} refresh failed: {}", feed, err);
            self.feed_mut(feed).detector_mut().reset();
            self.set_section(feed, Section::Failed(err.message));
        } else {
            watch_debug!("Background {:?} refresh failed: {}", feed, err);
        }
        Vec::new()
    }

    fn finish_precheck(&mut self, result: Result<ApiReply, RequestError>) {
        self.dirty.form = true;
        self.form.precheck = match result {
            Ok(ApiReply::Precheck(PrecheckReport {
                is_drm: true,
                total_lectures,
                encrypted_lectures,
            })) => PrecheckView::Drm {
                encrypted: encrypted_lectures,
                total: total_lectures,
            },
            Ok(ApiReply::Precheck(report)) => PrecheckView::Clear {
                total: report.total_lectures,
            },
            Ok(other) => PrecheckView::Failed(unexpected_reply(&other).message),
            Err(err) => PrecheckView::Failed(err.message),
        };
    }

    fn finish_download(
        &mut self,
        result: Result<ApiReply, RequestError>,
        bearer_token: String,
    ) -> Vec<Effect> {
        self.form.submitting = false;
        self.dirty.form = true;
        let accepted = match result {
            Ok(ApiReply::Download(accepted)) => accepted,
            Ok(other) => {
                self.form.error = Some(unexpected_reply(&other).message);
                return Vec::new();
            }
            Err(err) => {
                watch_warn!("Download request failed: {}", err);
                self.form.error = Some(err.message);
                return Vec::new();
            }
        };

        watch_info!("Download task {} started", accepted.task_id);
        self.form.status = Some(format!("Task {} started", accepted.task_id.short()));
        self.form.bearer_token = bearer_token.clone();
        self.session.set_bearer_override(bearer_token.clone());

        let mut effects = vec![Effect::Persist(StoreChange::SaveBearerOverride(bearer_token))];
        effects.extend(self.attach(accepted.task_id.as_str(), LogKind::Download));
        effects.extend(self.refresh(Feed::History, true));
        effects
    }

    fn finish_article(
        &mut self,
        result: Result<ApiReply, RequestError>,
        task_id: TaskId,
    ) -> Vec<Effect> {
        self.generating.remove(&task_id);
        self.dirty.history = true;
        match result {
            // Bypasses the in-flight gate so the row's new article state is fetched now.
            Ok(ApiReply::ArticleQueued) => {
                self.refresh_unqueued(Feed::History).into_iter().collect()
            }
            Ok(other) => {
                self.history_notice = Some(unexpected_reply(&other).message);
                Vec::new()
            }
            Err(err) => {
                watch_warn!("Article generation for {} failed: {}", task_id, err);
                self.history_notice = Some(err.message);
                Vec::new()
            }
        }
    }

    fn issue(&mut self, call: ApiCall, pending: PendingCall, credential: Option<String>) -> Effect {
        self.last_ticket += 1;
        let ticket = self.last_ticket;
        self.pending.insert(ticket, pending);
        Effect::Call {
            ticket,
            call,
            credential,
        }
    }

    fn log_title(&self, task_id: &TaskId, kind: LogKind) -> String {
        match kind {
            LogKind::Download => format!("Watching task {}", task_id),
            LogKind::Article => {
                let course_url = match &self.history {
                    Section::Loaded(items) => items
                        .iter()
                        .find(|item| &item.id == task_id && !item.course_url.is_empty())
                        .map(|item| item.course_url.clone()),
                    _ => None,
                };
                format!(
                    "Article log: {}",
                    course_url.unwrap_or_else(|| task_id.to_string())
                )
            }
        }
    }

    fn feed_mut(&mut self, feed: Feed) -> &mut SnapshotFeed {
        match feed {
            Feed::History => &mut self.history_feed,
            Feed::Tasks => &mut self.tasks_feed,
        }
    }

    fn set_section(&mut self, feed: Feed, section: Section) {
        match feed {
            Feed::History => {
                self.history = section;
                self.dirty.history = true;
            }
            Feed::Tasks => {
                self.active_tasks = section;
                self.dirty.active_tasks = true;
            }
        }
    }

    fn set_screen(&mut self, screen: Screen) {
        if self.screen != screen {
            self.screen = screen;
            self.dirty.screen = true;
        }
    }
}

fn unexpected_reply(reply: &ApiReply) -> RequestError {
    watch_warn!("Unexpected reply {:?}", reply);
    RequestError::new(None, "Unexpected response from server")
}
