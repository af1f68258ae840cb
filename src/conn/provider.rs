// Package conn provides the per-worker connection cache.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::driver::Connection;
use crate::error::{DriverError, Error};
use crate::model::{DbIndex, WorkerId};
use crate::registry::{Registry, Server};

/// A connection owned by one worker. The mutex only serializes that
/// worker's own concurrent calls; it is never shared across workers.
pub type SharedConnection = Arc<Mutex<Box<dyn Connection>>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ConnKey {
    worker: WorkerId,
    server: String,
    db: DbIndex,
}

struct Slot {
    // Registration the connection was opened against
    server: Arc<Server>,
    conn: OnceCell<SharedConnection>,
}

impl Slot {
    fn new(server: Arc<Server>) -> Arc<Self> {
        Arc::new(Self {
            server,
            conn: OnceCell::new(),
        })
    }
}

/// Hands out connections cached by `(worker, server, db)`.
///
/// The first call for a key performs the handshake and selects the database;
/// concurrent first calls wait on the same handshake. A failed handshake is
/// reported and nothing is cached. Re-registering a server invalidates the
/// connections opened against the previous registration.
pub struct ConnectionProvider {
    registry: Arc<Registry>,
    connect_timeout: Duration,
    slots: DashMap<ConnKey, Arc<Slot>>,
}

impl ConnectionProvider {
    pub fn new(registry: Arc<Registry>, connect_timeout: Duration) -> Self {
        Self {
            registry,
            connect_timeout,
            slots: DashMap::new(),
        }
    }

    /// Returns the worker's connection for `(server, db)`, creating it on first use.
    pub async fn get_connection(
        &self,
        worker: WorkerId,
        server: &str,
        db: DbIndex,
    ) -> Result<SharedConnection, Error> {
        let current = self.registry.lookup(server)?;
        let slot = self.slot(ConnKey {
            worker,
            server: server.to_string(),
            db,
        }, &current);

        slot.conn
            .get_or_try_init(|| self.connect(slot.server.clone(), worker, db))
            .await
            .map(Arc::clone)
    }

    /// Returns a connection created earlier, without connecting.
    pub fn get_existing(
        &self,
        worker: WorkerId,
        server: &str,
        db: DbIndex,
    ) -> Result<SharedConnection, Error> {
        let key = ConnKey {
            worker,
            server: server.to_string(),
            db,
        };
        self.slots
            .get(&key)
            .and_then(|slot| slot.conn.get().cloned())
            .ok_or_else(|| Error::ConnectionMissing {
                worker,
                server: server.to_string(),
                db,
            })
    }

    /// Drops the worker's connection for `(server, db)` so the next call
    /// handshakes again. Used once a connection has failed after its
    /// handshake. A handshake still in flight is left alone.
    pub fn invalidate(&self, worker: WorkerId, server: &str, db: DbIndex) -> bool {
        let key = ConnKey {
            worker,
            server: server.to_string(),
            db,
        };
        let dropped = self
            .slots
            .remove_if(&key, |_, slot| slot.conn.initialized())
            .is_some();
        if dropped {
            debug!(component = "conn", event = "invalidated", server, %db, %worker, "broken connection dropped");
        }
        dropped
    }

    /// Drops every connection held by a worker. Returns how many were open.
    pub fn release_worker(&self, worker: WorkerId) -> usize {
        let keys: Vec<ConnKey> = self
            .slots
            .iter()
            .filter(|e| e.key().worker == worker)
            .map(|e| e.key().clone())
            .collect();

        let mut closed = 0;
        for key in keys {
            if let Some((_, slot)) = self.slots.remove(&key) {
                if slot.conn.initialized() {
                    closed += 1;
                }
            }
        }
        if closed > 0 {
            debug!(component = "conn", event = "worker_released", %worker, closed, "worker connections dropped");
        }
        closed
    }

    /// Number of established connections.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|e| e.value().conn.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: ConnKey, current: &Arc<Server>) -> Arc<Slot> {
        let mut entry = self
            .slots
            .entry(key)
            .or_insert_with(|| Slot::new(current.clone()));
        if !Arc::ptr_eq(&entry.server, current) {
            *entry = Slot::new(current.clone());
        }
        entry.clone()
    }

    async fn connect(&self, server: Arc<Server>, worker: WorkerId, db: DbIndex) -> Result<SharedConnection, Error> {
        let started = Instant::now();
        let name = server.name().to_string();
        let connection_err = |source: DriverError| Error::Connection {
            server: name.clone(),
            db,
            source,
        };

        let mut conn = match tokio::time::timeout(self.connect_timeout, server.client().connect()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                warn!(component = "conn", event = "handshake_failed", server = %name, %db, %worker, error = %e, "handshake failed");
                return Err(connection_err(e));
            }
            Err(_) => {
                warn!(component = "conn", event = "handshake_timeout", server = %name, %db, %worker, timeout = ?self.connect_timeout, "handshake timed out");
                return Err(connection_err(DriverError::Timeout(self.connect_timeout)));
            }
        };
        conn.select(db).await.map_err(connection_err)?;

        info!(
            component = "conn",
            event = "connected",
            server = %name,
            %db,
            %worker,
            took_ms = started.elapsed().as_millis() as u64,
            "connection established"
        );
        Ok(Arc::new(Mutex::new(conn)))
    }
}
