//! Taskwatch engine: HTTP calls, push channels, timers and durable storage.
mod engine;
mod persist;
mod poll;
mod store;
mod stream;
mod transport;
mod types;

pub use engine::EngineHandle;
pub use persist::{ensure_store_dir, write_atomic, StoreError};
pub use poll::run_poll_timer;
pub use store::{ClientStore, BEARER_OVERRIDE_KEY, REMEMBERED_LOGIN_KEY, SESSION_TOKEN_KEY};
pub use stream::{follow_log_stream, stream_client, stream_url, END_EVENT};
pub use transport::{
    extract_error_message, ReqwestTransport, Transport, DETAIL_SEPARATOR, GENERIC_ERROR_MESSAGE,
};
pub use types::{ChannelEventSink, EngineEvent, EngineSettings, EventSink, DEFAULT_BASE_URL};
