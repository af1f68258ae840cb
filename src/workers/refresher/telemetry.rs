// Package refresher provides telemetry for scheduled refreshes.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use super::counters::Counters;
use super::refresher::COMPONENT;

/// Periodically drains the counters into the log and the metrics facade.
pub async fn logger(
    shutdown_token: CancellationToken,
    name: String,
    counters: Arc<Counters>,
    refresh_interval: Duration,
    each: Duration,
) {
    let mut ticker = interval(each);

    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                tracing::debug!(component = COMPONENT, event = "logger_stopped", name = %name, "logger stopped");
                return;
            }
            _ = ticker.tick() => {
                let (refreshed, skipped, failed_dbs, keys, errors) = counters.reset();

                metrics::counter!("keyscope_scheduled_refreshes_total", "outcome" => "refreshed").increment(refreshed as u64);
                metrics::counter!("keyscope_scheduled_refreshes_total", "outcome" => "skipped").increment(skipped as u64);
                metrics::counter!("keyscope_scheduled_refreshes_total", "outcome" => "error").increment(errors as u64);

                tracing::info!(
                    component = COMPONENT,
                    event = "stats",
                    name = %name,
                    interval = ?refresh_interval,
                    refreshed = refreshed,
                    skipped = skipped,
                    failed_dbs = failed_dbs,
                    keys = keys,
                    errors = errors,
                    "refresher stats"
                );
            }
        }
    }
}
