use crate::connection::LinkStatus;
use crate::rest::ApiClient;
use council_core::TelemetryState;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Fixed gauge refresh interval.
pub const TELEMETRY_INTERVAL: Duration = Duration::from_secs(3);

/// Spawn the health poller. Publishes a merged `TelemetryState` on every
/// successful poll; failures are swallowed and the gauges simply stop
/// updating until the next success. Polling pauses while the session link is
/// down and resumes with it, so no periodic work leaks across a dead link.
pub fn spawn_poller(
    api: ApiClient,
    mut link: watch::Receiver<LinkStatus>,
    interval: Duration,
) -> (watch::Receiver<TelemetryState>, JoinHandle<()>) {
    let (state_tx, state_rx) = watch::channel(TelemetryState::default());
    let task = tokio::spawn(async move {
        let mut state = TelemetryState::default();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            if *link.borrow_and_update() != LinkStatus::Connected {
                if link.changed().await.is_err() {
                    return;
                }
                ticker.reset();
                continue;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    match api.fetch_health().await {
                        Ok(snapshot) => {
                            state.absorb(&snapshot);
                            if state_tx.send(state.clone()).is_err() {
                                return;
                            }
                        }
                        Err(err) => debug!("health_poll_failed: {err}"),
                    }
                }
                changed = link.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    });
    (state_rx, task)
}
