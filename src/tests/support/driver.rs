// In-memory backing store used in place of a real key-value server.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::driver::{Client, Connection, Driver};
use crate::error::DriverError;
use crate::model::{DbIndex, KeyKind, ServerDescriptor};

#[derive(Default)]
struct State {
    // server -> db -> key -> kind
    data: HashMap<String, BTreeMap<u8, BTreeMap<String, KeyKind>>>,
    rejected_hosts: HashSet<String>,
    down_servers: HashSet<String>,
    broken_dbs: HashSet<(String, u8)>,
    connect_delay: Option<Duration>,
    list_delay: Option<Duration>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    handshakes: AtomicUsize,
    // Upcoming handshakes that hand out connections which then fail
    doomed: AtomicUsize,
    selects: AtomicUsize,
    listings: AtomicUsize,
}

/// Scriptable fake driver. Clones share state.
#[derive(Clone, Default)]
pub struct MockDriver {
    inner: Arc<Inner>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds keys for a server's database.
    pub fn set_keys(&self, server: &str, db: u8, keys: &[(&str, KeyKind)]) {
        let mut state = self.inner.state.lock();
        let dbs = state.data.entry(server.to_string()).or_default();
        let entry = dbs.entry(db).or_default();
        entry.clear();
        for (k, kind) in keys {
            entry.insert(k.to_string(), *kind);
        }
    }

    /// Seeds `count` string keys named `{prefix}{i}`.
    pub fn fill(&self, server: &str, db: u8, prefix: &str, count: usize) {
        let keys: Vec<(String, KeyKind)> = (0..count)
            .map(|i| (format!("{prefix}{i}"), KeyKind::String))
            .collect();
        let refs: Vec<(&str, KeyKind)> = keys.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        self.set_keys(server, db, &refs);
    }

    /// Makes `Driver::client` reject descriptors for this host.
    pub fn reject_host(&self, host: &str) {
        self.inner.state.lock().rejected_hosts.insert(host.to_string());
    }

    /// Makes every handshake to the server fail.
    pub fn set_down(&self, server: &str, down: bool) {
        let mut state = self.inner.state.lock();
        if down {
            state.down_servers.insert(server.to_string());
        } else {
            state.down_servers.remove(server);
        }
    }

    /// Makes listing keys of one database fail.
    pub fn break_db(&self, server: &str, db: u8) {
        self.inner.state.lock().broken_dbs.insert((server.to_string(), db));
    }

    /// The next `count` handshakes succeed but their connections fail
    /// every listing, as after a server restart.
    pub fn break_next_connections(&self, count: usize) {
        self.inner.doomed.store(count, Ordering::SeqCst);
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        self.inner.state.lock().connect_delay = Some(delay);
    }

    pub fn set_list_delay(&self, delay: Duration) {
        self.inner.state.lock().list_delay = Some(delay);
    }

    pub fn handshakes(&self) -> usize {
        self.inner.handshakes.load(Ordering::SeqCst)
    }

    pub fn selects(&self) -> usize {
        self.inner.selects.load(Ordering::SeqCst)
    }

    pub fn listings(&self) -> usize {
        self.inner.listings.load(Ordering::SeqCst)
    }
}

impl Driver for MockDriver {
    fn client(&self, server: &ServerDescriptor) -> Result<Arc<dyn Client>, DriverError> {
        if self.inner.state.lock().rejected_hosts.contains(server.host()) {
            return Err(DriverError::Backend(format!("unresolvable host {}", server.host())));
        }
        Ok(Arc::new(MockClient {
            server: server.name().to_string(),
            inner: self.inner.clone(),
        }))
    }
}

struct MockClient {
    server: String,
    inner: Arc<Inner>,
}

#[async_trait]
impl Client for MockClient {
    async fn connect(&self) -> Result<Box<dyn Connection>, DriverError> {
        let (delay, down) = {
            let state = self.inner.state.lock();
            (state.connect_delay, state.down_servers.contains(&self.server))
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if down {
            return Err(DriverError::Backend("connection refused".to_string()));
        }
        self.inner.handshakes.fetch_add(1, Ordering::SeqCst);
        let dead = self
            .inner
            .doomed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Ok(Box::new(MockConnection {
            server: self.server.clone(),
            db: 0,
            dead,
            inner: self.inner.clone(),
        }))
    }
}

struct MockConnection {
    server: String,
    db: u8,
    dead: bool,
    inner: Arc<Inner>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn select(&mut self, db: DbIndex) -> Result<(), DriverError> {
        self.inner.selects.fetch_add(1, Ordering::SeqCst);
        self.db = db.get();
        Ok(())
    }

    async fn list_keys(&mut self, pattern: &str) -> Result<Vec<Vec<u8>>, DriverError> {
        let delay = self.inner.state.lock().list_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.listings.fetch_add(1, Ordering::SeqCst);
        if self.dead {
            return Err(DriverError::Backend("connection reset by peer".to_string()));
        }

        let state = self.inner.state.lock();
        if state.broken_dbs.contains(&(self.server.clone(), self.db)) {
            return Err(DriverError::Backend(format!("ERR db{} is unavailable", self.db)));
        }
        let prefix = pattern.strip_suffix('*').unwrap_or(pattern);
        Ok(state
            .data
            .get(&self.server)
            .and_then(|dbs| dbs.get(&self.db))
            .map(|keys| {
                keys.keys()
                    .filter(|k| pattern == "*" || k.starts_with(prefix))
                    .map(|k| k.as_bytes().to_vec())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn key_types(&mut self, keys: &[Vec<u8>]) -> Result<Vec<KeyKind>, DriverError> {
        let state = self.inner.state.lock();
        let db = state.data.get(&self.server).and_then(|dbs| dbs.get(&self.db));
        Ok(keys
            .iter()
            .map(|k| {
                let k = String::from_utf8_lossy(k);
                db.and_then(|keys| keys.get(k.as_ref()).copied())
                    .unwrap_or(KeyKind::None)
            })
            .collect())
    }
}
