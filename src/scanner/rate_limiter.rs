//! Global probe rate limiting.
//!
//! A token bucket shared by every worker caps the number of probes issued
//! per second across the whole scan.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter as GovLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;

/// A shared probes-per-second limiter.
///
/// Clones share the same bucket.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<DefaultDirectRateLimiter>,
    rate: NonZeroU32,
}

impl RateLimiter {
    /// Limit to `rate` probes per second, one at a time.
    pub fn new(rate: NonZeroU32) -> Self {
        let quota = Quota::per_second(rate).allow_burst(nonzero!(1u32));
        Self {
            limiter: Arc::new(GovLimiter::direct(quota)),
            rate,
        }
    }

    /// Wait until the bucket allows another probe.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").field("rate", &self.rate).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_first_probe_is_immediate() {
        let limiter = RateLimiter::new(nonzero!(1u32));
        let start = Instant::now();
        tokio_test::block_on(limiter.wait());
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_wait_paces_probes() {
        let limiter = RateLimiter::new(nonzero!(20u32));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.wait().await;
        }
        // Two waits at 20/s need at least ~100ms.
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_clones_share_bucket() {
        let first = RateLimiter::new(nonzero!(10u32));
        let second = first.clone();
        let start = Instant::now();
        first.wait().await;
        second.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
