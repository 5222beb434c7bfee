//! Server-sent log channels.
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use taskwatch_core::{LogKind, StreamEvent, SubscriptionId, TaskId};
use tokio_util::sync::CancellationToken;
use url::Url;
use watch_logging::{watch_debug, watch_info, watch_trace};

use crate::{EngineEvent, EventSink};

/// Named event the server sends once a channel has no more lines.
pub const END_EVENT: &str = "end";
const MESSAGE_EVENT: &str = "message";

/// URL of the push channel; the credential travels as a query parameter
/// because the channel cannot carry custom headers.
pub fn stream_url(
    base_url: &Url,
    task_id: &TaskId,
    kind: LogKind,
    credential: &str,
) -> Result<Url, url::ParseError> {
    let mut url = base_url.join(&kind.stream_path(task_id))?;
    url.query_pairs_mut().append_pair("token", credential);
    Ok(url)
}

/// Client for push channels: bounded connect time, no overall timeout.
pub fn stream_client(connect_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
}

/// Forwards one channel's events to `sink` until it ends, fails or is cancelled.
///
/// Exactly one terminal event (`End` or `Error`) is emitted unless the
/// subscription was cancelled, in which case nothing more is emitted.
pub async fn follow_log_stream(
    client: reqwest::Client,
    url: Url,
    subscription: SubscriptionId,
    sink: &dyn EventSink,
    cancel: CancellationToken,
) {
    let terminal = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        terminal = read_stream(&client, url, subscription, sink, &cancel) => Some(terminal),
    };
    match terminal {
        Some(event) if !cancel.is_cancelled() => {
            watch_info!("Subscription {} finished: {:?}", subscription, event);
            sink.emit(EngineEvent::Stream {
                subscription,
                event,
            });
        }
        _ => watch_debug!("Subscription {} closed", subscription),
    }
}

async fn read_stream(
    client: &reqwest::Client,
    url: Url,
    subscription: SubscriptionId,
    sink: &dyn EventSink,
    cancel: &CancellationToken,
) -> StreamEvent {
    let response = match client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => return StreamEvent::Error(format!("connection failed: {err}")),
    };
    let status = response.status();
    if !status.is_success() {
        return StreamEvent::Error(format!("http status {status}"));
    }

    let mut events = Box::pin(response.bytes_stream().eventsource());
    while let Some(item) = events.next().await {
        match item {
            Ok(event) if event.event == END_EVENT => return StreamEvent::End,
            Ok(event) if event.event.is_empty() || event.event == MESSAGE_EVENT => {
                // Closing must win over lines that are already buffered.
                if cancel.is_cancelled() {
                    break;
                }
                sink.emit(EngineEvent::Stream {
                    subscription,
                    event: StreamEvent::Message(event.data),
                });
            }
            Ok(event) => watch_trace!("Ignoring '{}' event on {}", event.event, subscription),
            Err(err) => return StreamEvent::Error(err.to_string()),
        }
    }
    StreamEvent::Error("stream closed without end event".to_string())
}
