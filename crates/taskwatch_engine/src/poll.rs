use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use watch_logging::watch_debug;

use crate::{EngineEvent, EventSink};

/// Emits `EngineEvent::PollTick` every `period` until cancelled.
///
/// The first tick fires one full period after start; ticks missed while the
/// runtime was busy are delayed rather than bunched.
pub async fn run_poll_timer(period: Duration, sink: &dyn EventSink, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => sink.emit(EngineEvent::PollTick),
        }
    }
    watch_debug!("Poll timer stopped");
}
