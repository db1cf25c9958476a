//! Keep-alive ticker.
//!
//! Ticks are forwarded to the session actor, which only emits a heartbeat
//! while connected with keep-alive active.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::Command;

/// Why the heartbeat loop ended.
#[derive(Debug, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// Cancelled by shutdown.
    Cancelled,
    /// The session actor is gone.
    ClientGone,
}

/// Send [`Command::Heartbeat`] every `interval` until cancelled.
pub(crate) async fn run_heartbeat(
    commands: mpsc::Sender<Command>,
    interval: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let interval = interval.max(Duration::from_millis(1));
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
            _ = ticker.tick() => {
                if commands.send(Command::Heartbeat).await.is_err() {
                    return HeartbeatResult::ClientGone;
                }
            }
        }
    }
}
