// Resolves the refresh gate guarding a given server.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::CooldownGate;
use crate::config::LimiterScope;

const GLOBAL_GATE: &str = "global";

/// Refresh gates by scope: a single process-wide gate, or one per server.
pub struct Limiters {
    scope: LimiterScope,
    cooldown: Duration,
    shutdown_token: CancellationToken,
    global: Arc<CooldownGate>,
    per_server: DashMap<String, Arc<CooldownGate>>,
}

impl Limiters {
    /// Must be called from within a tokio runtime.
    pub fn new(shutdown_token: CancellationToken, scope: LimiterScope, cooldown: Duration) -> Self {
        Self {
            scope,
            cooldown,
            global: CooldownGate::new(shutdown_token.clone(), GLOBAL_GATE, cooldown),
            shutdown_token,
            per_server: DashMap::new(),
        }
    }

    pub fn scope(&self) -> LimiterScope {
        self.scope
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Gate guarding refreshes of `server`.
    pub fn for_server(&self, server: &str) -> Arc<CooldownGate> {
        match self.scope {
            LimiterScope::Global => self.global.clone(),
            LimiterScope::Server => {
                if let Some(gate) = self.per_server.get(server) {
                    return gate.clone();
                }
                self.per_server
                    .entry(server.to_string())
                    .or_insert_with(|| CooldownGate::new(self.shutdown_token.clone(), server, self.cooldown))
                    .clone()
            }
        }
    }
}
