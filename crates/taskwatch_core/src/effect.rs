use crate::api::{ApiCall, CallTicket};
use crate::log_buffer::FlushToken;
use crate::session::StoreChange;
use crate::stream::SubscriptionId;
use crate::{LogKind, TaskId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Issue an HTTP call; `credential` is attached as a bearer header when present.
    Call {
        ticket: CallTicket,
        call: ApiCall,
        credential: Option<String>,
    },
    /// Open the push channel for `(task_id, kind)`.
    OpenStream {
        subscription: SubscriptionId,
        task_id: TaskId,
        kind: LogKind,
        credential: String,
    },
    CloseStream { subscription: SubscriptionId },
    /// Deliver `Msg::LogFlushDue` after one frame interval.
    ScheduleLogFlush { token: FlushToken },
    StartPolling,
    StopPolling,
    Persist(StoreChange),
}
