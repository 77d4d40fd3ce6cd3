//! Periodic pipeline runs.

use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::orchestrator::RunReport;

/// Run immediately, then once per `period`, until `shutdown` resolves.
///
/// Each report is logged; failures inside a run never stop the schedule. A
/// run still in progress when `shutdown` resolves is abandoned. Returns the
/// number of completed runs.
pub async fn run_periodically<F, Fut, S>(period: Duration, shutdown: S, mut run: F) -> usize
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RunReport>,
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(period_secs = period.as_secs(), "⏰ Scheduler started");
    let mut completed = 0;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => {
                warn!("Shutdown requested during a run, abandoning it");
                break;
            }
            report = run() => {
                report.log();
                completed += 1;
            }
        }
    }

    info!(completed, "🛑 Scheduler stopped");
    completed
}
