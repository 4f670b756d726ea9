//! Scheduled housekeeping
//!
//! Cron-driven background tasks: the credential pool refresh and the link
//! validation sweep. Tasks are spawned from `main`, hold `Arc`s to the
//! explicitly owned components, and stop on the shared cancellation token.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use cron::Schedule;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::{LinkCache, ManifestCache};
use crate::fetch::ManifestFetcher;
use crate::pool::{Credentials, SessionPool};
use crate::resolver::UpstreamApi;

/// Sleep until the next firing of `schedule`, or return `false` when the
/// token is cancelled first.
async fn wait_for_next(schedule: &Schedule, token: &CancellationToken) -> bool {
    let Some(next) = schedule.upcoming(Utc).next() else {
        warn!("cron schedule has no future firings, stopping task");
        return false;
    };
    let delay = (next - Utc::now())
        .to_std()
        .unwrap_or(std::time::Duration::ZERO);

    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

fn parse_schedule(expression: &str, job: &str) -> Option<Schedule> {
    match Schedule::from_str(expression) {
        Ok(schedule) => Some(schedule),
        Err(e) => {
            warn!(job, expression, error = %e, "invalid cron expression, task disabled");
            None
        }
    }
}

/// Spawn the periodic credential pool refresh.
pub fn spawn_pool_refresh(
    expression: String,
    pool: Arc<SessionPool>,
    api: Arc<UpstreamApi>,
    credentials: Vec<Credentials>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(schedule) = parse_schedule(&expression, "pool_refresh") else {
            return;
        };
        info!(cron = %expression, "pool refresh task started");
        while wait_for_next(&schedule, &token).await {
            pool.refresh(api.as_ref(), &credentials).await;
        }
        info!("pool refresh task stopped");
    })
}

/// Spawn the periodic link validation sweep.
pub fn spawn_link_sweep(
    expression: String,
    links: Arc<LinkCache>,
    manifests: Arc<ManifestCache>,
    prober: Arc<dyn ManifestFetcher>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(schedule) = parse_schedule(&expression, "link_sweep") else {
            return;
        };
        info!(cron = %expression, "link validation task started");
        while wait_for_next(&schedule, &token).await {
            links.sweep(prober.as_ref(), manifests.as_ref()).await;
        }
        info!("link validation task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedules_parse_and_have_future_firings() {
        for expression in ["0 0 */4 * * *", "0 30 4 * * *"] {
            let schedule = Schedule::from_str(expression).expect("valid cron expression");
            assert!(schedule.upcoming(Utc).next().is_some());
        }
    }

    #[tokio::test]
    async fn cancelled_token_stops_the_wait() {
        let schedule = Schedule::from_str("0 0 */4 * * *").unwrap();
        let token = CancellationToken::new();
        token.cancel();
        assert!(!wait_for_next(&schedule, &token).await);
    }
}
