// Package model provides server descriptors.

use std::fmt;

use crate::error::Error;

/// A credential that never shows up in logs or debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Exposes the raw secret. Only drivers should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Connection metadata for one registered backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    name: String,
    host: String,
    port: u16,
    credential: Option<Secret>,
}

impl ServerDescriptor {
    /// Validates registration input.
    ///
    /// Rejects an empty name, an empty host or one containing whitespace,
    /// and ports outside `1..=65535`. An empty credential is treated as none.
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u32,
        credential: Option<String>,
    ) -> Result<Self, Error> {
        let name = name.into();
        let host = host.into();

        if name.trim().is_empty() {
            return Err(Error::configuration(&name, "server name is empty"));
        }
        if host.is_empty() {
            return Err(Error::configuration(&name, "host is empty"));
        }
        if host.chars().any(char::is_whitespace) {
            return Err(Error::configuration(&name, format!("host {host:?} contains whitespace")));
        }
        let port = match u16::try_from(port) {
            Ok(p) if p != 0 => p,
            _ => return Err(Error::configuration(&name, format!("port {port} is out of range"))),
        };

        Ok(Self {
            name,
            host,
            port,
            credential: credential.filter(|c| !c.is_empty()).map(Secret::new),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn credential(&self) -> Option<&Secret> {
        self.credential.as_ref()
    }

    /// `host:port`, for logs.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
