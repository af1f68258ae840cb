// Single-permit gate with a cooldown after release.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const OPEN: u8 = 0;
const HELD: u8 = 1;
const COOLING: u8 = 2;

// Low byte is the state, the rest a generation bumped on every release.
const STATE_BITS: u32 = 8;
const STATE_MASK: u64 = 0xff;

fn pack(generation: u64, state: u8) -> u64 {
    (generation << STATE_BITS) | state as u64
}

fn state_of(raw: u64) -> u8 {
    (raw & STATE_MASK) as u8
}

fn generation_of(raw: u64) -> u64 {
    raw >> STATE_BITS
}

/// Observable state of a `CooldownGate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Open,
    Held,
    CoolingDown,
}

/// Gate allowing at most one refresh per cooldown window.
///
/// `try_acquire` never blocks. Releasing a permit moves the gate to
/// cooling-down until `release + cooldown`; from that instant on the gate
/// counts as open. A timer task spawned per release reopens it eagerly, but
/// an acquire past the deadline does not wait for the timer: it takes the
/// permit straight from cooling-down. Timers only reopen the generation they
/// were armed for, so a stale timer never cuts a later cooldown short.
pub struct CooldownGate {
    name: String,
    cooldown: Duration,
    state: AtomicU64,
    // Nanoseconds since `epoch` at which the current cooldown ends
    reopen_at: AtomicU64,
    epoch: Instant,
    runtime: Handle,
    shutdown_token: CancellationToken,
    granted: AtomicU64,
    denied: AtomicU64,
}

impl CooldownGate {
    /// Creates an open gate. Must be called from within a tokio runtime.
    pub fn new(shutdown_token: CancellationToken, name: impl Into<String>, cooldown: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            cooldown,
            state: AtomicU64::new(pack(0, OPEN)),
            reopen_at: AtomicU64::new(0),
            epoch: Instant::now(),
            runtime: Handle::current(),
            shutdown_token,
            granted: AtomicU64::new(0),
            denied: AtomicU64::new(0),
        })
    }

    /// Takes the permit if the gate is open or its cooldown has elapsed.
    /// Returns `None` immediately otherwise.
    pub fn try_acquire(self: &Arc<Self>) -> Option<Permit> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let takeable = match state_of(current) {
                OPEN => true,
                COOLING => self.cooldown_elapsed(),
                _ => false,
            };
            if !takeable {
                self.denied.fetch_add(1, Ordering::Relaxed);
                return None;
            }

            let held = pack(generation_of(current), HELD);
            match self
                .state
                .compare_exchange(current, held, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    self.granted.fetch_add(1, Ordering::Relaxed);
                    return Some(Permit {
                        gate: Some(Arc::clone(self)),
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub fn state(&self) -> GateState {
        match state_of(self.state.load(Ordering::Acquire)) {
            OPEN => GateState::Open,
            HELD => GateState::Held,
            _ if self.cooldown_elapsed() => GateState::Open,
            _ => GateState::CoolingDown,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Permits handed out so far.
    pub fn granted(&self) -> u64 {
        self.granted.load(Ordering::Relaxed)
    }

    /// Acquire attempts refused so far.
    pub fn denied(&self) -> u64 {
        self.denied.load(Ordering::Relaxed)
    }

    fn cooldown_elapsed(&self) -> bool {
        let reopen_at = self.epoch + Duration::from_nanos(self.reopen_at.load(Ordering::Acquire));
        Instant::now() >= reopen_at
    }

    fn release(self: &Arc<Self>) {
        let current = self.state.load(Ordering::Acquire);
        if state_of(current) != HELD {
            warn!(
                component = "rate",
                event = "release_without_hold",
                gate = %self.name,
                "permit released while gate was not held"
            );
            return;
        }

        let generation = generation_of(current) + 1;
        if self.cooldown.is_zero() {
            self.state.store(pack(generation, OPEN), Ordering::Release);
            return;
        }

        // Only the holder gets here, so nobody reads the deadline until
        // the state below says cooling.
        let deadline = Instant::now() + self.cooldown;
        self.reopen_at
            .store((deadline - self.epoch).as_nanos() as u64, Ordering::Release);
        let cooling = pack(generation, COOLING);
        self.state.store(cooling, Ordering::Release);

        let gate = Arc::clone(self);
        self.runtime.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                _ = gate.shutdown_token.cancelled() => {}
            }
            gate.reopen(cooling);
        });
    }

    fn reopen(&self, cooling: u64) {
        let open = pack(generation_of(cooling), OPEN);
        match self
            .state
            .compare_exchange(cooling, open, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => debug!(component = "rate", event = "reopened", gate = %self.name, "gate reopened"),
            // Already taken past the deadline, possibly released again since.
            Err(_) => debug!(
                component = "rate",
                event = "reopen_skipped",
                gate = %self.name,
                "cooldown elapsed but gate had moved on"
            ),
        }
    }
}

impl fmt::Debug for CooldownGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CooldownGate")
            .field("name", &self.name)
            .field("cooldown", &self.cooldown)
            .field("state", &self.state())
            .finish()
    }
}

/// Exclusive right to run one refresh. Released on `release()` or drop,
/// whichever comes first, and never twice.
#[must_use = "dropping the permit releases it immediately"]
pub struct Permit {
    gate: Option<Arc<CooldownGate>>,
}

impl Permit {
    /// Signals that the guarded work finished and starts the cooldown.
    pub fn release(mut self) {
        if let Some(gate) = self.gate.take() {
            gate.release();
        }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(gate) = self.gate.take() {
            gate.release();
        }
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("gate", &self.gate.as_ref().map(|g| g.name()))
            .finish()
    }
}
