//! Runtime pacing for scan workers.

use crate::config::TimingLimits;
use crate::scanner::rate_limiter::RateLimiter;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Applies a scan's timing limits while it runs.
///
/// Shared by all workers: the rate limiter bucket is global, the
/// inter-probe delay is taken by each worker independently.
#[derive(Debug, Clone)]
pub struct TimingController {
    limits: TimingLimits,
    rate_limiter: Option<RateLimiter>,
}

impl TimingController {
    pub fn new(limits: TimingLimits) -> Self {
        Self {
            rate_limiter: limits.max_rate.map(RateLimiter::new),
            limits,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        self.limits.probe_timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.limits.max_retries
    }

    /// Number of workers to spawn for `pending` probes.
    pub fn worker_count(&self, pending: usize) -> usize {
        self.limits.max_concurrent_probes.min(pending)
    }

    /// The pause before a worker's next probe, jittered uniformly within
    /// [delay/2, 3*delay/2] when enabled.
    pub fn next_delay(&self) -> Duration {
        let delay = self.limits.inter_probe_delay;
        if delay.is_zero() || !self.limits.jitter {
            return delay;
        }
        let nanos = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        let low = nanos / 2;
        let high = nanos.saturating_add(nanos / 2);
        Duration::from_nanos(rand::thread_rng().gen_range(low..=high))
    }

    /// Sleep for the next inter-probe delay, returning early on cancellation.
    pub async fn pace(&self, cancel: &CancellationToken) {
        let delay = self.next_delay();
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {}
        }
    }

    /// Wait for the global rate limiter, if one is configured.
    pub async fn throttle(&self, cancel: &CancellationToken) {
        if let Some(limiter) = &self.rate_limiter {
            tokio::select! {
                _ = limiter.wait() => {}
                _ = cancel.cancelled() => {}
            }
        }
    }
}
