//! RequestThrottle: global serializer + cooldown gate for the aggregation service
//!
//! One instance is shared by every room session in the process: the external
//! aggregation quota is per-process, so the bottleneck is deliberate.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::sleep;
use tracing::{debug, info};

/// Throttle tuning.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Admissions allowed between cooldowns.
    pub threshold: u32,
    /// How long admission suspends once the threshold is reached.
    pub cooldown: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            threshold: 8,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default)]
struct Gate {
    /// Admissions since the last cooldown.
    admitted: u32,
    /// Set when the remote service signalled a rate limit; forces the next
    /// admission to sit out a full cooldown regardless of the counter.
    forced: bool,
}

/// FIFO admission gate in front of the aggregation-service call path.
///
/// Callers `admit()` and hold the returned permit for the duration of the
/// protected call; the tokio mutex underneath queues waiters fairly, so the
/// path is fully serialized. Every `threshold` admissions, the admitting
/// caller sleeps out the cooldown window before proceeding.
#[derive(Clone)]
pub struct RequestThrottle {
    gate: Arc<Mutex<Gate>>,
    config: ThrottleConfig,
}

impl RequestThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            gate: Arc::new(Mutex::new(Gate::default())),
            config,
        }
    }

    /// Wait for admission to the protected path.
    ///
    /// Suspends until every earlier caller has finished and, when the
    /// threshold (or a forced cooldown) is hit, until the cooldown window has
    /// elapsed. The counter resets after each cooldown.
    pub async fn admit(&self) -> ThrottlePermit {
        let mut gate = self.gate.clone().lock_owned().await;

        if gate.forced || gate.admitted >= self.config.threshold {
            info!(
                admitted = gate.admitted,
                forced = gate.forced,
                cooldown_secs = self.config.cooldown.as_secs(),
                "throttle cooldown"
            );
            sleep(self.config.cooldown).await;
            gate.admitted = 0;
            gate.forced = false;
        }

        gate.admitted += 1;
        debug!(admitted = gate.admitted, "throttle admission");

        ThrottlePermit { gate }
    }
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}

/// Exclusive admission token; the protected path is held for as long as this
/// permit lives.
pub struct ThrottlePermit {
    gate: OwnedMutexGuard<Gate>,
}

impl ThrottlePermit {
    /// Report an explicit rate-limit signal from the remote service: the next
    /// admission will sit out a full cooldown.
    pub fn rate_limited(&mut self) {
        self.gate.forced = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn fast(threshold: u32, cooldown_ms: u64) -> RequestThrottle {
        RequestThrottle::new(ThrottleConfig {
            threshold,
            cooldown: Duration::from_millis(cooldown_ms),
        })
    }

    #[tokio::test]
    async fn admissions_below_threshold_do_not_wait() {
        let throttle = fast(3, 5_000);
        let start = Instant::now();
        for _ in 0..3 {
            drop(throttle.admit().await);
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn threshold_admission_sits_out_the_cooldown() {
        let throttle = fast(2, 200);
        drop(throttle.admit().await);
        drop(throttle.admit().await);

        let start = Instant::now();
        drop(throttle.admit().await);
        assert!(start.elapsed() >= Duration::from_millis(200));

        // Counter reset: the next admission is free again.
        let start = Instant::now();
        drop(throttle.admit().await);
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn rate_limit_signal_forces_a_cooldown() {
        let throttle = fast(100, 200);
        {
            let mut permit = throttle.admit().await;
            permit.rate_limited();
        }

        let start = Instant::now();
        drop(throttle.admit().await);
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn concurrent_callers_are_serialized() {
        let throttle = fast(100, 1_000);
        let running = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let throttle = throttle.clone();
            let running = running.clone();
            handles.push(tokio::spawn(async move {
                let _permit = throttle.admit().await;
                let now = running.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                assert_eq!(now, 0, "two permits held at once");
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
    }
}
