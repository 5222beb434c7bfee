use std::collections::HashMap;
use std::sync::{mpsc, Arc};
use std::thread;

use taskwatch_core::{
    ApiCall, CallTicket, FlushToken, LogKind, RequestError, StreamEvent, SubscriptionId, TaskId,
};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use watch_logging::{mask_secret, watch_debug, watch_error, watch_info};

use crate::poll::run_poll_timer;
use crate::stream::{follow_log_stream, stream_client, stream_url};
use crate::transport::{ReqwestTransport, Transport};
use crate::{ChannelEventSink, EngineEvent, EngineSettings, EventSink};

enum EngineCommand {
    Call {
        ticket: CallTicket,
        call: ApiCall,
        credential: Option<String>,
    },
    OpenStream {
        subscription: SubscriptionId,
        task_id: TaskId,
        kind: LogKind,
        credential: String,
    },
    CloseStream {
        subscription: SubscriptionId,
    },
    ScheduleFlush {
        token: FlushToken,
    },
    StartPolling,
    StopPolling,
}

/// Cheap, cloneable handle to the I/O thread.
///
/// Commands run in the order they were sent, so a close sent before an open
/// always takes effect first.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Starts the I/O thread; events arrive on the returned receiver.
    pub fn spawn(settings: EngineSettings) -> Result<(Self, mpsc::Receiver<EngineEvent>), RequestError> {
        let (event_tx, event_rx) = mpsc::channel();
        let sink: Arc<dyn EventSink> = Arc::new(ChannelEventSink::new(event_tx));
        let handle = Self::with_sink(settings, sink)?;
        Ok((handle, event_rx))
    }

    pub fn with_sink(settings: EngineSettings, sink: Arc<dyn EventSink>) -> Result<Self, RequestError> {
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(&settings)?);
        let streams = stream_client(settings.connect_timeout)
            .map_err(|err| RequestError::new(None, err.to_string()))?;
        let runtime = Runtime::new().map_err(|err| RequestError::new(None, err.to_string()))?;
        let (cmd_tx, cmd_rx) = mpsc::channel();

        thread::spawn(move || {
            let mut worker = Worker {
                runtime,
                settings,
                transport,
                streams,
                sink,
                subscriptions: HashMap::new(),
                poller: None,
            };
            while let Ok(command) = cmd_rx.recv() {
                worker.handle(command);
            }
            worker.shutdown();
        });

        Ok(Self { cmd_tx })
    }

    pub fn call(&self, ticket: CallTicket, call: ApiCall, credential: Option<String>) {
        self.send(EngineCommand::Call {
            ticket,
            call,
            credential,
        });
    }

    pub fn open_stream(
        &self,
        subscription: SubscriptionId,
        task_id: TaskId,
        kind: LogKind,
        credential: String,
    ) {
        self.send(EngineCommand::OpenStream {
            subscription,
            task_id,
            kind,
            credential,
        });
    }

    pub fn close_stream(&self, subscription: SubscriptionId) {
        self.send(EngineCommand::CloseStream { subscription });
    }

    pub fn schedule_flush(&self, token: FlushToken) {
        self.send(EngineCommand::ScheduleFlush { token });
    }

    pub fn start_polling(&self) {
        self.send(EngineCommand::StartPolling);
    }

    pub fn stop_polling(&self) {
        self.send(EngineCommand::StopPolling);
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            watch_error!("Engine thread is gone; command dropped");
        }
    }
}

struct Worker {
    runtime: Runtime,
    settings: EngineSettings,
    transport: Arc<dyn Transport>,
    streams: reqwest::Client,
    sink: Arc<dyn EventSink>,
    subscriptions: HashMap<SubscriptionId, CancellationToken>,
    poller: Option<CancellationToken>,
}

impl Worker {
    fn handle(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Call {
                ticket,
                call,
                credential,
            } => {
                watch_debug!("Call {} ({})", ticket, call.label());
                let transport = self.transport.clone();
                let sink = self.sink.clone();
                self.runtime.spawn(async move {
                    let result = transport.call(&call, credential.as_deref()).await;
                    sink.emit(EngineEvent::CallCompleted { ticket, result });
                });
            }
            EngineCommand::OpenStream {
                subscription,
                task_id,
                kind,
                credential,
            } => self.open_stream(subscription, task_id, kind, credential),
            EngineCommand::CloseStream { subscription } => {
                if let Some(cancel) = self.subscriptions.remove(&subscription) {
                    watch_info!("Closing subscription {}", subscription);
                    cancel.cancel();
                }
            }
            EngineCommand::ScheduleFlush { token } => {
                let sink = self.sink.clone();
                let delay = self.settings.flush_interval;
                self.runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    sink.emit(EngineEvent::FlushDue { token });
                });
            }
            EngineCommand::StartPolling => {
                if self.poller.is_some() {
                    return;
                }
                let cancel = CancellationToken::new();
                let sink = self.sink.clone();
                let period = self.settings.poll_interval;
                let token = cancel.clone();
                self.runtime.spawn(async move {
                    run_poll_timer(period, sink.as_ref(), token).await;
                });
                self.poller = Some(cancel);
            }
            EngineCommand::StopPolling => {
                if let Some(cancel) = self.poller.take() {
                    cancel.cancel();
                }
            }
        }
    }

    fn open_stream(
        &mut self,
        subscription: SubscriptionId,
        task_id: TaskId,
        kind: LogKind,
        credential: String,
    ) {
        let url = match stream_url(&self.settings.base_url, &task_id, kind, &credential) {
            Ok(url) => url,
            Err(err) => {
                self.sink.emit(EngineEvent::Stream {
                    subscription,
                    event: StreamEvent::Error(format!("invalid stream url: {err}")),
                });
                return;
            }
        };
        watch_info!(
            "Opening {:?} log for task {} as subscription {} (token {})",
            kind,
            task_id,
            subscription,
            mask_secret(&credential)
        );

        let cancel = CancellationToken::new();
        self.subscriptions.insert(subscription, cancel.clone());
        let client = self.streams.clone();
        let sink = self.sink.clone();
        self.runtime.spawn(async move {
            follow_log_stream(client, url, subscription, sink.as_ref(), cancel).await;
        });
    }

    fn shutdown(&mut self) {
        for (_, cancel) in self.subscriptions.drain() {
            cancel.cancel();
        }
        if let Some(cancel) = self.poller.take() {
            cancel.cancel();
        }
    }
}
