//! Taskwatch core: pure client state machine and view-model helpers.
mod api;
mod change;
mod effect;
mod log_buffer;
mod msg;
mod session;
mod state;
mod stream;
mod types;
mod update;
mod view_model;

pub use api::{
    ApiCall, ApiReply, ArticleRequest, CallTicket, DownloadAccepted, DownloadRequest, HttpMethod,
    KeyEntry, LoginRequest, LoginResponse, PrecheckReport, PrecheckRequest, RequestError,
};
pub use change::{should_render, ChangeDetector, Signature, SnapshotFeed};
pub use effect::Effect;
pub use log_buffer::{FlushToken, LogBuffer, LOG_BUFFER_LIMIT};
pub use msg::{DownloadForm, Msg};
pub use session::{
    RememberedLogin, RestoredSession, Session, StoreChange, REMEMBER_DURATION_MS,
};
pub use state::{AppState, Feed};
pub use stream::{
    StreamController, StreamEvent, StreamOutcome, StreamState, SubscriptionId, DROP_NOTICE,
    END_NOTICE,
};
pub use types::{ArticleStatus, InvalidTaskId, LogKind, ObservedTask, TaskId, TaskStatus, TaskSummary};
pub use update::update;
pub use view_model::{
    ActiveTaskAction, ActiveTaskRowView, AppViewModel, Dirty, FormView, HistoryAction,
    HistoryRowView, LogView, LoginView, PrecheckView, Screen, SectionView,
};
