// Package registry provides the server registry.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::driver::{Client, Driver};
use crate::error::Error;
use crate::model::ServerDescriptor;

/// A registered server: its descriptor plus the client handle built for it.
pub struct Server {
    descriptor: ServerDescriptor,
    client: Arc<dyn Client>,
}

impl Server {
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn descriptor(&self) -> &ServerDescriptor {
        &self.descriptor
    }

    pub fn client(&self) -> &Arc<dyn Client> {
        &self.client
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Additive registry of servers, keyed by unique name.
/// Registering an existing name replaces the previous entry.
pub struct Registry {
    driver: Arc<dyn Driver>,
    servers: RwLock<BTreeMap<String, Arc<Server>>>,
}

impl Registry {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            servers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Validates and registers a server.
    pub fn register(
        &self,
        name: &str,
        host: &str,
        port: u32,
        credential: Option<String>,
    ) -> Result<Arc<Server>, Error> {
        let descriptor = ServerDescriptor::new(name, host, port, credential)?;
        self.register_descriptor(descriptor)
    }

    /// Registers an already validated descriptor.
    pub fn register_descriptor(&self, descriptor: ServerDescriptor) -> Result<Arc<Server>, Error> {
        let client = self
            .driver
            .client(&descriptor)
            .map_err(|e| Error::configuration(descriptor.name(), e.to_string()))?;

        let server = Arc::new(Server { descriptor, client });
        let replaced = self
            .servers
            .write()
            .insert(server.name().to_string(), server.clone())
            .is_some();

        let event = if replaced { "server_replaced" } else { "server_registered" };
        info!(
            component = "registry",
            event,
            server = %server.name(),
            addr = %server.descriptor.addr(),
            auth = server.descriptor.credential().is_some(),
            "server registered"
        );

        Ok(server)
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<Server>, Error> {
        self.servers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// All servers, ordered by name.
    pub fn servers(&self) -> Vec<Arc<Server>> {
        self.servers.read().values().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.servers.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.servers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.read().is_empty()
    }
}
