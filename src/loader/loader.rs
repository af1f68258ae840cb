// Package loader provides the cache loader.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigTrait};
use crate::conn::ConnectionProvider;
use crate::db::KeyCache;
use crate::error::{DriverError, Error};
use crate::model::keys::collect_sorted;
use crate::model::{DbFailure, DbIndex, DbLoad, RefreshResult, WorkerId};
use crate::rate::{Limiters, Pacer};
use crate::registry::Registry;

const COMPONENT: &str = "loader";

/// Orchestrates refreshes: gate, connect, enumerate, store, release.
pub struct CacheLoader {
    registry: Arc<Registry>,
    provider: Arc<ConnectionProvider>,
    cache: Arc<KeyCache>,
    limiters: Arc<Limiters>,
    pacer: Pacer,
    pattern: String,
    timeout: Duration,
}

impl CacheLoader {
    pub fn new(
        cfg: &Config,
        registry: Arc<Registry>,
        provider: Arc<ConnectionProvider>,
        cache: Arc<KeyCache>,
        limiters: Arc<Limiters>,
    ) -> Self {
        Self {
            registry,
            provider,
            cache,
            limiters,
            pacer: Pacer::new(cfg.scan_rate()),
            pattern: cfg.pattern().to_string(),
            timeout: cfg.refresh_timeout(),
        }
    }

    /// Rebuilds every logical database of `server`.
    ///
    /// Returns a skipped result when the server's gate is closed. Otherwise
    /// all databases are attempted; per-database failures are collected in
    /// the result and the permit is released exactly once at the end.
    pub async fn refresh_server(&self, worker: WorkerId, server: &str) -> Result<RefreshResult, Error> {
        self.refresh(worker, server, DbIndex::all()).await
    }

    /// Rebuilds a single database of `server`, under the same gate.
    pub async fn refresh_database(
        &self,
        worker: WorkerId,
        server: &str,
        db: DbIndex,
    ) -> Result<RefreshResult, Error> {
        self.refresh(worker, server, std::iter::once(db)).await
    }

    /// Runs `refresh_server` on its own task so slow enumerations never hold
    /// up the caller's loop.
    ///
    /// The task owns `worker` for its lifetime: the worker's connections are
    /// dropped once the refresh finishes. Long-lived workers that want to
    /// keep theirs call `refresh_server` directly and release them with
    /// `ConnectionProvider::release_worker` on teardown.
    pub fn spawn(self: &Arc<Self>, worker: WorkerId, server: impl Into<String>) -> JoinHandle<Result<RefreshResult, Error>> {
        let loader = Arc::clone(self);
        let server = server.into();
        tokio::spawn(async move {
            let result = loader.refresh_server(worker, &server).await;
            loader.provider.release_worker(worker);
            result
        })
    }

    async fn refresh(
        &self,
        worker: WorkerId,
        server: &str,
        dbs: impl Iterator<Item = DbIndex>,
    ) -> Result<RefreshResult, Error> {
        self.registry.lookup(server)?;

        let gate = self.limiters.for_server(server);
        let Some(permit) = gate.try_acquire() else {
            debug!(component = COMPONENT, event = "refresh_skipped", server, %worker, gate = %gate.name(), "refresh throttled");
            metrics::counter!("keyscope_refresh_total", "server" => server.to_string(), "outcome" => "skipped").increment(1);
            return Ok(RefreshResult::skipped(server));
        };

        let started = Instant::now();
        let mut result = RefreshResult::started(server);
        for db in dbs {
            match self.load(worker, server, db).await {
                Ok(keys) => result.loaded.push(DbLoad { db, keys }),
                Err(error) => {
                    warn!(component = COMPONENT, event = "db_failed", server, %db, %worker, error = %error, "database not indexed");
                    metrics::counter!("keyscope_enumeration_errors_total", "server" => server.to_string()).increment(1);
                    result.failures.push(DbFailure { db, error });
                }
            }
        }
        result.elapsed = started.elapsed();
        permit.release();

        let outcome = if result.failures.is_empty() { "ok" } else { "partial" };
        metrics::counter!("keyscope_refresh_total", "server" => server.to_string(), "outcome" => outcome).increment(1);
        info!(
            component = COMPONENT,
            event = "refreshed",
            server,
            %worker,
            databases = result.loaded.len(),
            failed = result.failures.len(),
            keys = result.total_keys(),
            took_ms = result.elapsed.as_millis() as u64,
            "key index refreshed"
        );
        Ok(result)
    }

    async fn load(&self, worker: WorkerId, server: &str, db: DbIndex) -> Result<usize, Error> {
        let conn = self.provider.get_connection(worker, server, db).await?;
        self.pacer.take().await;

        let enumerated = tokio::time::timeout(self.timeout, async {
            let mut conn = conn.lock().await;
            conn.select(db).await?;
            let raw = conn.list_keys(&self.pattern).await?;
            let kinds = conn.key_types(&raw).await?;
            Ok::<_, DriverError>(collect_sorted(&raw, &kinds))
        })
        .await
        .unwrap_or(Err(DriverError::Timeout(self.timeout)));

        let records = match enumerated {
            Ok(records) => records,
            Err(source) => {
                // Next refresh reconnects; this one does not retry.
                self.provider.invalidate(worker, server, db);
                return Err(Error::Enumeration {
                    server: server.to_string(),
                    db,
                    source,
                });
            }
        };

        let keys = records.len();
        self.cache.put(server, db, records);
        metrics::gauge!("keyscope_keys_indexed", "server" => server.to_string(), "db" => db.to_string()).set(keys as f64);
        Ok(keys)
    }
}
