//! Long-running background task that moves campaigns through their
//! fundraising window: opens due `pending` campaigns and finalizes the ones
//! whose window has ended.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::errors::{ApiError, Result};
use crate::service::{Advance, Service};

/// Run the sweeper until `shutdown` is cancelled.
pub async fn run(service: Service, interval_secs: u64, shutdown: CancellationToken) {
    info!("Lifecycle sweeper starting, interval {interval_secs}s");

    loop {
        match sweep_once(&service).await {
            Ok(0) => {}
            Ok(changed) => info!("Sweep advanced {changed} campaigns"),
            Err(e) => error!("Sweep error: {e}"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(interval_secs)) => {}
        }
    }

    info!("Lifecycle sweeper stopped");
}

/// Perform a single pass over open campaigns.
///
/// Returns the number of campaigns that changed status. A conflict on one
/// campaign means a request got there first; it is skipped, not retried.
pub async fn sweep_once(service: &Service) -> Result<usize> {
    let now = Utc::now();
    let mut changed = 0;

    for id in service.open_campaigns().await? {
        match service.advance_lifecycle(id, now).await {
            Ok(Advance::Unchanged) => {}
            Ok(_) => changed += 1,
            Err(ApiError::Conflict(_)) => {
                warn!("Campaign {id} changed during sweep, skipping");
            }
            Err(e) => error!("Failed to advance campaign {id}: {e}"),
        }
    }

    Ok(changed)
}
