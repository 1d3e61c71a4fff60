use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::debug;

/// Emits `event` every `period` until the receiving side goes away.
///
/// The first tick lands one full period after spawn; callers do their own
/// initial load. Ticks missed while the runtime was busy are skipped, never
/// bunched up.
pub fn spawn_refresh_timer<E>(period: Duration, tx: UnboundedSender<E>, event: E) -> JoinHandle<()>
where
    E: Clone + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if tx.send(event.clone()).is_err() {
                debug!("Refresh receiver dropped; stopping timer");
                return;
            }
        }
    })
}
