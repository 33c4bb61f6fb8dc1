//! Daily scheduler for notification passes.
//!
//! Sleeps until the configured local time of day, runs one pass, and
//! repeats until the shutdown future resolves. A pass that finds the
//! cooldown gate closed waits for it to open and runs then.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};

use common::AppResult;

use crate::jobs::{NotificationJob, PassReport};

/// First instant strictly after `now` at which the local clock at `offset`
/// reads `send_at`.
pub fn next_run_after(now: DateTime<Utc>, send_at: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let local_today = now.with_timezone(&offset).date_naive().and_time(send_at);
    let utc_today = local_today - Duration::seconds(i64::from(offset.local_minus_utc()));
    let candidate = Utc.from_utc_datetime(&utc_today);

    if candidate > now {
        candidate
    } else {
        candidate + Duration::days(1)
    }
}

/// Shortest pause before re-checking a gate held by a running pass.
const MIN_GATE_RECHECK: StdDuration = StdDuration::from_secs(1);

/// Run scheduled passes until `shutdown` resolves.
pub async fn run<F>(job: Arc<NotificationJob>, send_at: NaiveTime, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let now = Utc::now();
        let next = next_run_after(now, send_at, job.settings().utc_offset);
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!(next_run = %next, "Next notification pass scheduled");

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Notification scheduler stopped");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Notification scheduler stopped");
                return;
            }
            outcome = run_due_pass(&job, Utc::now, tokio::time::sleep) => match outcome {
                Ok(PassReport::Completed(summary)) => {
                    tracing::debug!(?summary, "Scheduled notification pass completed");
                }
                Ok(PassReport::Skipped { reason }) => {
                    tracing::info!(?reason, "Scheduled notification pass skipped");
                }
                Err(e) => tracing::error!("Scheduled notification pass failed: {}", e),
            },
        }
    }
}

/// Run the pass that is due, waiting for the gate whenever it is closed.
///
/// A closed gate defers the scheduled pass until `last_run_at + cooldown`
/// instead of dropping it. Fatal errors end the attempt.
pub async fn run_due_pass<C, W, Fut>(
    job: &NotificationJob,
    mut now: C,
    mut wait: W,
) -> AppResult<PassReport>
where
    C: FnMut() -> DateTime<Utc>,
    W: FnMut(StdDuration) -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        let report = job.run_pass(now()).await?;
        let PassReport::Skipped { reason } = report else {
            return Ok(report);
        };

        let opens_at = job.status().last_run_at + job.settings().cooldown;
        let delay = (opens_at - now())
            .to_std()
            .unwrap_or_default()
            .max(MIN_GATE_RECHECK);
        tracing::info!(?reason, retry_at = %opens_at, "Scheduled notification pass deferred");
        wait(delay).await;
    }
}
