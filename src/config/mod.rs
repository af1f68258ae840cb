// Configuration loading and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub const PROD: &str = "prod";
#[allow(dead_code)]
pub const DEV: &str = "dev";
pub const TEST: &str = "test";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);
const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_PATTERN: &str = "*";
const DEFAULT_SCAN_COUNT: usize = 1000;
const DEFAULT_SCAN_RATE: u32 = 64;

/// Which refreshes share a cooldown gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LimiterScope {
    /// One gate for the whole process: any refresh throttles every server.
    Global,
    /// One gate per server.
    #[default]
    Server,
}

/// Whether the key index is refreshed on a timer or only on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    #[default]
    Manually,
    Auto,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Keyscope {
    #[serde(rename = "keyscope")]
    pub keyscope: KeyscopeBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeyscopeBox {
    pub env: String,
    pub logs: Option<Logs>,
    pub connections: Option<Connections>,
    pub limiter: Option<Limiter>,
    pub refresh: Option<Refresh>,
    pub servers: Option<Vec<Server>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Connections {
    #[serde(rename = "connect_timeout", default, with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Limiter {
    pub scope: Option<LimiterScope>,
    #[serde(default, with = "humantime_serde")]
    pub cooldown: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Refresh {
    pub mode: Option<RefreshMode>,
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,
    pub pattern: Option<String>,
    #[serde(rename = "scan_count")]
    pub scan_count: Option<usize>,
    #[serde(rename = "scan_rate")]
    pub scan_rate: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(rename = "warm_up")]
    pub warm_up: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Server {
    pub name: String,
    pub host: String,
    pub port: u32,
    pub password: Option<String>,
}

// Config trait
pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    #[allow(dead_code)]
    fn is_test(&self) -> bool;
    fn connect_timeout(&self) -> Duration;
    fn limiter_scope(&self) -> LimiterScope;
    fn cooldown(&self) -> Duration;
    fn refresh_mode(&self) -> RefreshMode;
    fn refresh_interval(&self) -> Duration;
    fn refresh_timeout(&self) -> Duration;
    fn pattern(&self) -> &str;
    fn scan_count(&self) -> usize;
    fn scan_rate(&self) -> u32;
    fn warm_up(&self) -> bool;
    fn servers(&self) -> &[Server];
}

// Config type alias for convenience
pub type Config = Keyscope;

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.keyscope.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.keyscope.env == PROD
    }

    fn is_test(&self) -> bool {
        self.keyscope.env == TEST
    }

    fn connect_timeout(&self) -> Duration {
        self.keyscope
            .connections
            .as_ref()
            .and_then(|c| c.connect_timeout)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT)
    }

    fn limiter_scope(&self) -> LimiterScope {
        self.keyscope
            .limiter
            .as_ref()
            .and_then(|l| l.scope)
            .unwrap_or_default()
    }

    fn cooldown(&self) -> Duration {
        self.keyscope
            .limiter
            .as_ref()
            .and_then(|l| l.cooldown)
            .unwrap_or(DEFAULT_COOLDOWN)
    }

    fn refresh_mode(&self) -> RefreshMode {
        self.refresh().and_then(|r| r.mode).unwrap_or_default()
    }

    fn refresh_interval(&self) -> Duration {
        self.refresh()
            .and_then(|r| r.interval)
            .unwrap_or(DEFAULT_INTERVAL)
    }

    fn refresh_timeout(&self) -> Duration {
        self.refresh()
            .and_then(|r| r.timeout)
            .unwrap_or(DEFAULT_REFRESH_TIMEOUT)
    }

    fn pattern(&self) -> &str {
        self.refresh()
            .and_then(|r| r.pattern.as_deref())
            .unwrap_or(DEFAULT_PATTERN)
    }

    fn scan_count(&self) -> usize {
        self.refresh()
            .and_then(|r| r.scan_count)
            .unwrap_or(DEFAULT_SCAN_COUNT)
    }

    fn scan_rate(&self) -> u32 {
        self.refresh()
            .and_then(|r| r.scan_rate)
            .unwrap_or(DEFAULT_SCAN_RATE)
    }

    fn warm_up(&self) -> bool {
        self.refresh().and_then(|r| r.warm_up).unwrap_or(true)
    }

    fn servers(&self) -> &[Server] {
        self.keyscope.servers.as_deref().unwrap_or(&[])
    }
}

impl Config {
    fn refresh(&self) -> Option<&Refresh> {
        self.keyscope.refresh.as_ref()
    }

    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Resolve absolute path
        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        Self::from_yaml(&data).with_context(|| format!("load config from {:?}", abs_path))
    }

    /// Parses and validates configuration from YAML text.
    pub fn from_yaml(data: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(data).context("unmarshal yaml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.pattern().is_empty() {
            anyhow::bail!("refresh.pattern must not be empty");
        }
        if self.refresh_mode() == RefreshMode::Auto && self.refresh_interval().is_zero() {
            anyhow::bail!("refresh.interval must be positive in auto mode");
        }
        if self.connect_timeout().is_zero() {
            anyhow::bail!("connections.connect_timeout must be positive");
        }
        if self.refresh_timeout().is_zero() {
            anyhow::bail!("refresh.timeout must be positive");
        }

        // Servers are validated on registration; duplicates only overwrite.
        let mut seen = HashSet::new();
        for server in self.servers() {
            if !seen.insert(server.name.as_str()) {
                warn!(
                    component = "config",
                    event = "duplicate_server",
                    server = %server.name,
                    "server listed twice, the last entry wins"
                );
            }
        }
        Ok(())
    }
}

// Test config is always available for integration tests
mod test_config;
#[allow(dead_code)]
pub use test_config::new_test_config;
