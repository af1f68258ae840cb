#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, Instant};
    use tokio_util::sync::CancellationToken;

    use crate::rate::{CooldownGate, GateState};

    const COOLDOWN: Duration = Duration::from_secs(3);

    fn gate() -> Arc<CooldownGate> {
        CooldownGate::new(CancellationToken::new(), "test", COOLDOWN)
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_permit() {
        let gate = gate();
        let permit = gate.try_acquire().expect("open gate must grant a permit");
        assert_eq!(gate.state(), GateState::Held);
        assert!(gate.try_acquire().is_none());
        assert!(gate.try_acquire().is_none());
        permit.release();
        assert_eq!(gate.granted(), 1);
        assert_eq!(gate.denied(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_counts_from_release() {
        let gate = gate();
        let permit = gate.try_acquire().unwrap();

        // Long refresh: the cooldown must not start while the permit is held.
        sleep(Duration::from_secs(10)).await;
        assert!(gate.try_acquire().is_none());

        let released_at = Instant::now();
        permit.release();
        assert_eq!(gate.state(), GateState::CoolingDown);

        sleep(COOLDOWN - Duration::from_millis(1)).await;
        assert!(gate.try_acquire().is_none(), "gate reopened before cooldown elapsed");

        sleep(Duration::from_millis(2)).await;
        assert!(Instant::now() >= released_at + COOLDOWN);
        assert_eq!(gate.state(), GateState::Open);
        assert!(gate.try_acquire().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_does_not_block_caller() {
        let gate = gate();
        let permit = gate.try_acquire().unwrap();
        let before = Instant::now();
        permit.release();
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_once() {
        let gate = gate();
        {
            let _permit = gate.try_acquire().unwrap();
        }
        assert_eq!(gate.state(), GateState::CoolingDown);

        sleep(COOLDOWN + Duration::from_millis(1)).await;
        assert_eq!(gate.state(), GateState::Open);

        // A single reopen: a second permit keeps the gate held afterwards.
        let permit = gate.try_acquire().unwrap();
        sleep(COOLDOWN * 2).await;
        assert_eq!(gate.state(), GateState::Held);
        drop(permit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_on_panic_path() {
        let gate = gate();
        let g = gate.clone();
        let handle = tokio::spawn(async move {
            let _permit = g.try_acquire().unwrap();
            panic!("refresh blew up");
        });
        assert!(handle.await.is_err());
        assert_eq!(gate.state(), GateState::CoolingDown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_cooldown_reopens_immediately() {
        let gate = CooldownGate::new(CancellationToken::new(), "zero", Duration::ZERO);
        gate.try_acquire().unwrap().release();
        assert_eq!(gate.state(), GateState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_reopens_without_waiting() {
        let token = CancellationToken::new();
        let gate = CooldownGate::new(token.clone(), "shutdown", COOLDOWN);
        gate.try_acquire().unwrap().release();

        token.cancel();
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(gate.state(), GateState::Open);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_grants_at_most_one() {
        let gate = CooldownGate::new(CancellationToken::new(), "race", Duration::from_secs(60));
        let winners = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..64 {
            let gate = gate.clone();
            let winners = winners.clone();
            handles.push(tokio::spawn(async move {
                if let Some(permit) = gate.try_acquire() {
                    winners.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    permit.release();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(gate.state(), GateState::CoolingDown);
        assert!(gate.try_acquire().is_none());
    }

    // Timer tasks spawned on this runtime only run while it is driven.
    fn idle_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
    }

    #[test]
    fn test_acquire_past_deadline_does_not_wait_for_timer() {
        let idle = idle_runtime();
        let gate = {
            let _guard = idle.enter();
            CooldownGate::new(CancellationToken::new(), "idle", Duration::from_millis(50))
        };
        gate.try_acquire().unwrap().release();
        assert!(gate.try_acquire().is_none());

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(gate.state(), GateState::Open);
        let permit = gate.try_acquire();
        assert!(permit.is_some());
        assert_eq!(gate.state(), GateState::Held);
    }

    #[test]
    fn test_stale_timer_keeps_later_cooldown() {
        let idle = idle_runtime();
        let gate = {
            let _guard = idle.enter();
            CooldownGate::new(CancellationToken::new(), "stale", Duration::from_millis(200))
        };
        gate.try_acquire().unwrap().release();
        std::thread::sleep(Duration::from_millis(250));

        // Taken before the first timer ran, then released again.
        gate.try_acquire().unwrap().release();

        // Let the first timer fire; the second one is still pending.
        idle.block_on(async { sleep(Duration::from_millis(10)).await });
        assert_eq!(gate.state(), GateState::CoolingDown);
        assert!(gate.try_acquire().is_none());
    }
}
