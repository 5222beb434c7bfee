use std::sync::mpsc;
use std::thread;

use chrono::Utc;
use taskwatch_core::{Effect, Msg};
use taskwatch_engine::{ClientStore, EngineEvent, EngineHandle};
use watch_logging::{watch_debug, watch_error};

use super::app::Inbox;

/// Runs the effects `update` asks for against the engine and the store.
pub struct EffectRunner {
    engine: EngineHandle,
    store: ClientStore,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, store: ClientStore) -> Self {
        Self { engine, store }
    }

    pub fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Call {
                    ticket,
                    call,
                    credential,
                } => self.engine.call(ticket, call, credential),
                Effect::OpenStream {
                    subscription,
                    task_id,
                    kind,
                    credential,
                } => self
                    .engine
                    .open_stream(subscription, task_id, kind, credential),
                Effect::CloseStream { subscription } => self.engine.close_stream(subscription),
                Effect::ScheduleLogFlush { token } => self.engine.schedule_flush(token),
                Effect::StartPolling => {
                    watch_debug!("Polling started");
                    self.engine.start_polling();
                }
                Effect::StopPolling => {
                    watch_debug!("Polling stopped");
                    self.engine.stop_polling();
                }
                Effect::Persist(change) => {
                    let now_ms = Utc::now().timestamp_millis();
                    if let Err(err) = self.store.apply(change, now_ms) {
                        watch_error!("Failed to update store {:?}: {}", self.store.path(), err);
                    }
                }
            }
        }
    }
}

/// Maps an engine report onto the message `update` understands.
pub fn engine_event_to_msg(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::CallCompleted { ticket, result } => Msg::CallCompleted { ticket, result },
        EngineEvent::Stream {
            subscription,
            event,
        } => Msg::Stream {
            subscription,
            event,
        },
        EngineEvent::PollTick => Msg::PollTick,
        EngineEvent::FlushDue { token } => Msg::LogFlushDue { token },
    }
}

/// Forwards engine events into the dispatch loop until either side hangs up.
pub(crate) fn spawn_event_forwarder(events: mpsc::Receiver<EngineEvent>, inbox: mpsc::Sender<Inbox>) {
    thread::spawn(move || {
        for event in events {
            if inbox.send(Inbox::Msg(engine_event_to_msg(event))).is_err() {
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskwatch_core::{RequestError, StreamEvent};

    #[test]
    fn engine_events_map_one_to_one() {
        assert_eq!(engine_event_to_msg(EngineEvent::PollTick), Msg::PollTick);
        assert_eq!(
            engine_event_to_msg(EngineEvent::FlushDue { token: 4 }),
            Msg::LogFlushDue { token: 4 }
        );
        assert_eq!(
            engine_event_to_msg(EngineEvent::Stream {
                subscription: 2,
                event: StreamEvent::End,
            }),
            Msg::Stream {
                subscription: 2,
                event: StreamEvent::End,
            }
        );
        let failed = Err(RequestError::new(Some(500), "Request failed"));
        assert_eq!(
            engine_event_to_msg(EngineEvent::CallCompleted {
                ticket: 7,
                result: failed.clone(),
            }),
            Msg::CallCompleted {
                ticket: 7,
                result: failed,
            }
        );
    }
}
