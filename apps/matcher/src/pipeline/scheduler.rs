use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::pipeline::orchestrator::{PassOutcome, Pipeline};

/// Runs a pass every `period` until `shutdown` resolves.
///
/// Passes are awaited inline, so they never overlap; ticks missed while a
/// long pass runs are dropped rather than queued. The first pass starts
/// immediately.
pub async fn run_scheduler<F>(pipeline: Arc<Pipeline>, period: Duration, shutdown: F) -> usize
where
    F: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!("Pipeline scheduler started (every {}s)", period.as_secs());
    let mut passes = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if let PassOutcome::Completed(_) = pipeline.run_pass().await {
                    passes += 1;
                }
            }
        }
    }
    info!("Pipeline scheduler stopped after {passes} passes");
    passes
}
