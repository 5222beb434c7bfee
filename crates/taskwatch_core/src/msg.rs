use crate::api::{ApiReply, CallTicket, RequestError};
use crate::log_buffer::FlushToken;
use crate::session::RestoredSession;
use crate::stream::{StreamEvent, SubscriptionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Durable values loaded at start-up.
    Restore(RestoredSession),
    /// Protected dashboard entry; falls back to the login view without a credential.
    DashboardOpened,
    LoginSubmitted {
        username: String,
        password: String,
        remember: bool,
    },
    LogoutClicked,
    /// Explicit refresh of history and active tasks; never suppressed.
    RefreshClicked,
    /// Background poll timer fired.
    PollTick,
    PrecheckRequested {
        course_url: String,
        bearer_token: String,
    },
    DownloadRequested(DownloadForm),
    /// Attach the live view to a job's download log.
    AttachClicked { task_id: String },
    /// Attach the live view to a job's article-generation log.
    ArticleLogClicked { task_id: String },
    GenerateArticleClicked { task_id: String },
    /// User navigated away from the live log.
    DetachClicked,
    /// Engine finished an API call issued through `Effect::Call`.
    CallCompleted {
        ticket: CallTicket,
        result: Result<ApiReply, RequestError>,
    },
    /// Engine delivered a push-channel event.
    Stream {
        subscription: SubscriptionId,
        event: StreamEvent,
    },
    /// A previously scheduled log flush is due.
    LogFlushDue { token: FlushToken },
    /// Fallback for placeholder wiring.
    NoOp,
}

/// Fields of the job submission form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DownloadForm {
    pub course_url: String,
    /// Falls back to the remembered or configured bearer when absent.
    pub bearer_token: Option<String>,
    /// `KID:KEY` pair for DRM courses.
    pub drm_pair: Option<String>,
    pub chapter_filter: Option<String>,
    pub download_assets: bool,
}
