use std::time::Duration;

use taskwatch_core::{ApiReply, CallTicket, FlushToken, RequestError, StreamEvent, SubscriptionId};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/";

/// Everything the engine reports back to the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    CallCompleted {
        ticket: CallTicket,
        result: Result<ApiReply, RequestError>,
    },
    Stream {
        subscription: SubscriptionId,
        event: StreamEvent,
    },
    PollTick,
    FlushDue {
        token: FlushToken,
    },
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub base_url: Url,
    pub connect_timeout: Duration,
    /// Applies to JSON calls only; push channels have no overall timeout.
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub flush_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(5),
            flush_interval: Duration::from_millis(50),
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelEventSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}
