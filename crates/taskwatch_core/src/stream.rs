//! Live log subscription state machine.
//!
//! The controller is the only writer of the log buffer and of the
//! subscription handle, which is what keeps at most one subscription open.
use crate::log_buffer::{FlushToken, LogBuffer};
use crate::{Effect, LogKind, TaskId};

/// Identifies one attach; events carrying an older id are dropped.
pub type SubscriptionId = u64;

pub const END_NOTICE: &str = "[system] log stream ended";
pub const DROP_NOTICE: &str = "[system] connection lost";

/// Typed push-channel events, in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Message(String),
    /// The server's named `end` event.
    End,
    /// Connection failure or a close without `end`.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Open {
        subscription: SubscriptionId,
        task_id: TaskId,
        kind: LogKind,
    },
}

/// What a delivered event did to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Event belonged to a closed or superseded subscription.
    Ignored,
    Appended,
    Ended { task_id: TaskId, kind: LogKind },
    Dropped { task_id: TaskId, kind: LogKind },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamController {
    state: StreamState,
    log: LogBuffer,
    last_subscription: SubscriptionId,
}

impl StreamController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, StreamState::Open { .. })
    }

    pub fn open_kind(&self) -> Option<LogKind> {
        match &self.state {
            StreamState::Open { kind, .. } => Some(*kind),
            StreamState::Idle => None,
        }
    }

    pub fn subscription(&self) -> Option<SubscriptionId> {
        match &self.state {
            StreamState::Open { subscription, .. } => Some(*subscription),
            StreamState::Idle => None,
        }
    }

    pub fn log(&self) -> &LogBuffer {
        &self.log
    }

    /// Opens a subscription for `(task_id, kind)`, closing the current one first.
    ///
    /// The returned effects always list the close before the open.
    pub fn attach(&mut self, task_id: TaskId, kind: LogKind, credential: &str) -> Vec<Effect> {
        let mut effects = Vec::with_capacity(2);
        effects.extend(self.detach());
        self.log.clear();

        self.last_subscription += 1;
        let subscription = self.last_subscription;
        self.state = StreamState::Open {
            subscription,
            task_id: task_id.clone(),
            kind,
        };
        effects.push(Effect::OpenStream {
            subscription,
            task_id,
            kind,
            credential: credential.to_string(),
        });
        effects
    }

    /// Closes the open subscription, if any. Calling it while idle is a no-op.
    pub fn detach(&mut self) -> Option<Effect> {
        match std::mem::take(&mut self.state) {
            StreamState::Open { subscription, .. } => Some(Effect::CloseStream { subscription }),
            StreamState::Idle => None,
        }
    }

    pub fn clear_panel(&mut self) {
        self.log.clear();
    }

    pub fn take_flush(&mut self, token: FlushToken) -> bool {
        self.log.take_flush(token)
    }

    pub fn handle(
        &mut self,
        subscription: SubscriptionId,
        event: StreamEvent,
        effects: &mut Vec<Effect>,
    ) -> StreamOutcome {
        let (task_id, kind) = match &self.state {
            StreamState::Open {
                subscription: current,
                task_id,
                kind,
            } if *current == subscription => (task_id.clone(), *kind),
            _ => return StreamOutcome::Ignored,
        };

        match event {
            StreamEvent::Message(line) => {
                self.append(line, effects);
                StreamOutcome::Appended
            }
            StreamEvent::End => {
                self.append(END_NOTICE, effects);
                effects.extend(self.detach());
                self.log.clear();
                StreamOutcome::Ended { task_id, kind }
            }
            StreamEvent::Error(_) => {
                self.append(DROP_NOTICE, effects);
                effects.extend(self.detach());
                StreamOutcome::Dropped { task_id, kind }
            }
        }
    }

    fn append(&mut self, line: impl Into<String>, effects: &mut Vec<Effect>) {
        if let Some(token) = self.log.append(line) {
            effects.push(Effect::ScheduleLogFlush { token });
        }
    }
}
