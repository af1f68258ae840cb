// Key index application: wires registry, connections, cache, gates, loader
// and the scheduled refresher from configuration.

use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, ConfigTrait, LimiterScope, RefreshMode};
use crate::conn::ConnectionProvider;
use crate::db::KeyCache;
use crate::driver::{Driver, RedisDriver};
use crate::loader::CacheLoader;
use crate::model::{RefreshResult, WorkerId};
use crate::rate::Limiters;
use crate::registry::Registry;
use crate::workers::Refresher;

pub const SVC_REFRESHER: &str = "wrk-refresher";

/// Encapsulates the entire key index state.
pub struct App {
    cfg: Config,
    registry: Arc<Registry>,
    provider: Arc<ConnectionProvider>,
    cache: Arc<KeyCache>,
    loader: Arc<CacheLoader>,
    refresher: Option<Arc<Refresher>>,
}

impl App {
    /// Builds the application over the `redis` driver.
    pub fn with_redis(shutdown_token: CancellationToken, cfg: Config) -> Result<Self> {
        let driver = Arc::new(RedisDriver::new(cfg.scan_count()));
        Self::new(shutdown_token, cfg, driver)
    }

    /// Builds the application and registers the configured servers.
    /// A server that fails validation is logged and left out.
    /// Must be called from within a tokio runtime.
    pub fn new(shutdown_token: CancellationToken, cfg: Config, driver: Arc<dyn Driver>) -> Result<Self> {
        let registry = Arc::new(Registry::new(driver));
        for server in cfg.servers() {
            if let Err(e) = registry.register(&server.name, &server.host, server.port, server.password.clone()) {
                error!(
                    component = "app",
                    event = "register_failed",
                    server = %server.name,
                    error = %e,
                    "server left out"
                );
            }
        }
        if registry.is_empty() {
            warn!(component = "app", event = "no_servers", "no servers registered");
        }

        let provider = Arc::new(ConnectionProvider::new(registry.clone(), cfg.connect_timeout()));
        let cache = Arc::new(KeyCache::new());
        let limiters = Arc::new(Limiters::new(
            shutdown_token.clone(),
            cfg.limiter_scope(),
            cfg.cooldown(),
        ));
        let loader = Arc::new(CacheLoader::new(
            &cfg,
            registry.clone(),
            provider.clone(),
            cache.clone(),
            limiters,
        ));

        let refresher = match cfg.refresh_mode() {
            RefreshMode::Auto => Some(Refresher::new(
                shutdown_token,
                SVC_REFRESHER,
                &cfg,
                registry.clone(),
                loader.clone(),
            )),
            RefreshMode::Manually => None,
        };

        Ok(Self {
            cfg,
            registry,
            provider,
            cache,
            loader,
            refresher,
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn provider(&self) -> &Arc<ConnectionProvider> {
        &self.provider
    }

    pub fn cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }

    pub fn loader(&self) -> &Arc<CacheLoader> {
        &self.loader
    }

    /// The scheduled refresher; present only in auto mode.
    pub fn refresher(&self) -> Option<&Arc<Refresher>> {
        self.refresher.as_ref()
    }

    /// Initial load of every registered server on a dedicated worker.
    /// Refreshes go through the gates like any other, so in global scope
    /// only the first server is loaded until the cooldown elapses.
    pub async fn warm_up(&self) -> Vec<RefreshResult> {
        let worker = WorkerId::next();
        let names = self.registry.names();
        if self.cfg.limiter_scope() == LimiterScope::Global && names.len() > 1 {
            warn!(
                component = "app",
                event = "warm_up_throttled",
                servers = names.len(),
                "global limiter scope: warm-up loads one server per cooldown"
            );
        }

        let results = join_all(names.iter().map(|name| self.loader.refresh_server(worker, name))).await;
        self.provider.release_worker(worker);

        let mut done = Vec::with_capacity(results.len());
        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(r) => done.push(r),
                Err(e) => error!(component = "app", event = "warm_up_failed", server = %name, error = %e, "warm-up failed"),
            }
        }
        let stats = self.cache.stats();
        info!(
            component = "app",
            event = "warmed_up",
            servers = done.len(),
            entries = stats.entries,
            keys = stats.keys,
            "key index warmed up"
        );
        done
    }

    /// Starts background workers. Returns the refresher's task in auto mode.
    pub fn serve(&self) -> Option<JoinHandle<()>> {
        let handle = self.refresher.as_ref().and_then(|r| r.serve());
        info!(
            component = "app",
            event = "started",
            mode = ?self.cfg.refresh_mode(),
            scope = ?self.cfg.limiter_scope(),
            servers = self.registry.len(),
            "application lifecycle"
        );
        handle
    }
}
