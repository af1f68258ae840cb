use super::{Config, Connections, KeyscopeBox, Limiter, LimiterScope, Logs, Refresh, RefreshMode};
use std::time::Duration;

/// Creates a new test configuration: three-second cooldown, per-server gates,
/// manual refresh, no scan pacing and no servers.
pub fn new_test_config() -> Config {
    Config {
        keyscope: KeyscopeBox {
            env: super::TEST.to_string(),
            logs: Some(Logs {
                level: Some("debug".to_string()),
            }),
            connections: Some(Connections {
                connect_timeout: Some(Duration::from_secs(1)),
            }),
            limiter: Some(Limiter {
                scope: Some(LimiterScope::Server),
                cooldown: Some(Duration::from_secs(3)),
            }),
            refresh: Some(Refresh {
                mode: Some(RefreshMode::Manually),
                interval: Some(Duration::from_secs(10)),
                pattern: Some("*".to_string()),
                scan_count: Some(100),
                scan_rate: Some(0),
                timeout: Some(Duration::from_secs(5)),
                warm_up: Some(false),
            }),
            servers: None,
        },
    }
}
