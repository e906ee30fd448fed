//! Expiry sweeper: periodic cleanup of abandoned rooms.
//!
//! The sweeper never touches the registry itself — it only drops a
//! [`RouterEvent::Sweep`] onto the router's queue, so expiry serializes
//! with ordinary message handling and cannot race an in-flight mutation
//! on the same room.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::router::RouterEvent;

/// Spawns the sweep timer. The returned handle is owned by the server and
/// aborted at shutdown; the task also stops on its own once the router's
/// queue closes.
pub(crate) fn spawn_sweeper(
    events: mpsc::UnboundedSender<RouterEvent>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of `interval` fires immediately; swallow it so
        // sweeps start one full interval after boot.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            tracing::trace!("sweep tick");
            if events.send(RouterEvent::Sweep).is_err() {
                tracing::debug!("router gone, sweeper stopping");
                break;
            }
        }
    })
}
