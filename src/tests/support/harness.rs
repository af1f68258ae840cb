// Test harness wiring registry, provider, cache, limiters and loader.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::MockDriver;
use crate::config::{self, Config, ConfigTrait, LimiterScope};
use crate::conn::ConnectionProvider;
use crate::db::KeyCache;
use crate::loader::CacheLoader;
use crate::model::DbIndex;
use crate::rate::Limiters;
use crate::registry::Registry;

pub fn db(i: u32) -> DbIndex {
    DbIndex::new(i).unwrap()
}

/// The core with a `MockDriver` behind it. Build inside a tokio runtime.
pub struct TestCore {
    pub driver: MockDriver,
    pub registry: Arc<Registry>,
    pub provider: Arc<ConnectionProvider>,
    pub cache: Arc<KeyCache>,
    pub limiters: Arc<Limiters>,
    pub loader: Arc<CacheLoader>,
    pub token: CancellationToken,
}

impl TestCore {
    /// Per-server gates with a 3s cooldown.
    pub fn new() -> Self {
        Self::with_limiter(LimiterScope::Server, Duration::from_secs(3))
    }

    pub fn with_limiter(scope: LimiterScope, cooldown: Duration) -> Self {
        let mut cfg = config::new_test_config();
        if let Some(limiter) = cfg.keyscope.limiter.as_mut() {
            limiter.scope = Some(scope);
            limiter.cooldown = Some(cooldown);
        }
        Self::with_config(cfg)
    }

    pub fn with_config(cfg: Config) -> Self {
        let driver = MockDriver::new();
        let token = CancellationToken::new();
        let registry = Arc::new(Registry::new(Arc::new(driver.clone())));
        let provider = Arc::new(ConnectionProvider::new(registry.clone(), cfg.connect_timeout()));
        let cache = Arc::new(KeyCache::new());
        let limiters = Arc::new(Limiters::new(token.clone(), cfg.limiter_scope(), cfg.cooldown()));
        let loader = Arc::new(CacheLoader::new(
            &cfg,
            registry.clone(),
            provider.clone(),
            cache.clone(),
            limiters.clone(),
        ));
        Self {
            driver,
            registry,
            provider,
            cache,
            limiters,
            loader,
            token,
        }
    }

    /// Registers `name` at `localhost:6379`.
    pub fn register(&self, name: &str) {
        self.registry.register(name, "localhost", 6379, None).unwrap();
    }
}
