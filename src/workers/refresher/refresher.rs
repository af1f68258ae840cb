// Package refresher provides the scheduled refresh worker.

use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ConfigTrait};
use crate::loader::CacheLoader;
use crate::model::WorkerId;
use crate::registry::Registry;

use super::counters::Counters;
use super::telemetry;

const TELEMETRY_EVERY: Duration = Duration::from_secs(5);
pub(super) const COMPONENT: &str = "refresher";

/// Refreshes every registered server on a fixed interval, as its own worker.
pub struct Refresher {
    shutdown_token: CancellationToken,
    name: String,
    worker: WorkerId,
    every: Duration,
    registry: Arc<Registry>,
    loader: Arc<CacheLoader>,
    counters: Arc<Counters>,
    inited: AtomicBool,
}

impl Refresher {
    pub fn new(
        shutdown_token: CancellationToken,
        name: impl Into<String>,
        cfg: &Config,
        registry: Arc<Registry>,
        loader: Arc<CacheLoader>,
    ) -> Arc<Self> {
        Arc::new(Self {
            shutdown_token,
            name: name.into(),
            worker: WorkerId::next(),
            every: cfg.refresh_interval(),
            registry,
            loader,
            counters: Arc::new(Counters::new()),
            inited: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    /// Starts the loop and its telemetry. Returns `None` when already started.
    pub fn serve(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self
            .inited
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }

        tokio::task::spawn(telemetry::logger(
            self.shutdown_token.clone(),
            self.name.clone(),
            self.counters.clone(),
            self.every,
            TELEMETRY_EVERY,
        ));

        let refresher = Arc::clone(self);
        Some(tokio::spawn(async move {
            refresher.loop_worker().await;
        }))
    }

    async fn loop_worker(&self) {
        let mut ticker = interval_at(Instant::now() + self.every, self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            component = COMPONENT,
            event = "started",
            name = %self.name,
            worker = %self.worker,
            every = ?self.every,
            "refresher started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!(component = COMPONENT, event = "stopped", name = %self.name, "refresher stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// Refreshes every registered server once, concurrently.
    pub async fn tick(&self) {
        let names = self.registry.names();
        let results = join_all(
            names
                .iter()
                .map(|name| self.loader.refresh_server(self.worker, name)),
        )
        .await;

        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(r) if r.skipped => {
                    self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                }
                Ok(r) => {
                    self.counters.refreshed.fetch_add(1, Ordering::Relaxed);
                    self.counters.failed_dbs.fetch_add(r.failures.len() as i64, Ordering::Relaxed);
                    self.counters.keys.fetch_add(r.total_keys() as i64, Ordering::Relaxed);
                }
                Err(e) => {
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        component = COMPONENT,
                        event = "refresh_failed",
                        name = %self.name,
                        server = %name,
                        error = %e,
                        "scheduled refresh failed"
                    );
                }
            }
        }
    }
}
