//! RateLimiter - N permits per period
//!
//! A semaphore holds the permits of the current period; a background task
//! tops it back up to `permits` at every period boundary. Acquired permits
//! are consumed, not returned.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument};

use crate::error::{ConcurrentError, Result};

/// Token-bucket style rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    refill: JoinHandle<()>,
    permits: u32,
    period: Duration,
}

impl RateLimiter {
    /// Allow `permits` acquisitions per `period`
    ///
    /// The first period starts immediately with a full bucket. Spawns the
    /// refill task, so it must be called within a tokio runtime. Zero
    /// permits or a zero period is rejected with `InvalidRate`.
    pub fn new(permits: u32, period: Duration) -> Result<Self> {
        if permits == 0 || period.is_zero() {
            return Err(ConcurrentError::invalid_rate(permits, period));
        }

        let semaphore = Arc::new(Semaphore::new(permits as usize));
        let refill = tokio::spawn(refill_loop(Arc::clone(&semaphore), permits, period));

        Ok(Self {
            semaphore,
            refill,
            permits,
            period,
        })
    }

    /// Wait for a permit in the current or a later period
    ///
    /// Returns `Shutdown` once [`RateLimiter::shutdown`] was called, including
    /// for callers already waiting.
    pub async fn acquire(&self) -> Result<()> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ConcurrentError::Shutdown)?;
        permit.forget();
        Ok(())
    }

    /// Take a permit without waiting
    pub fn try_acquire(&self) -> Result<()> {
        match self.semaphore.try_acquire() {
            Ok(permit) => {
                permit.forget();
                Ok(())
            }
            Err(TryAcquireError::NoPermits) => Err(ConcurrentError::WouldBlock),
            Err(TryAcquireError::Closed) => Err(ConcurrentError::Shutdown),
        }
    }

    /// Stop refilling and release every waiter with `Shutdown`
    #[instrument(name = "rate_limiter_shutdown", skip(self))]
    pub fn shutdown(&self) {
        self.semaphore.close();
        self.refill.abort();
        debug!(permits = self.permits, "rate limiter shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Permits left in the current period
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn permits(&self) -> u32 {
        self.permits
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.semaphore.close();
        self.refill.abort();
    }
}

async fn refill_loop(semaphore: Arc<Semaphore>, permits: u32, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately; the bucket starts full
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if semaphore.is_closed() {
            break;
        }
        let missing = (permits as usize).saturating_sub(semaphore.available_permits());
        if missing > 0 {
            semaphore.add_permits(missing);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_burst_then_wait_for_next_period() {
        let limiter = RateLimiter::new(5, Duration::from_millis(100)).unwrap();
        let start = Instant::now();

        for _ in 0..5 {
            limiter.acquire().await.unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(80));
        assert_eq!(limiter.try_acquire(), Err(ConcurrentError::WouldBlock));

        limiter.acquire().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn test_throughput_bound() {
        let limiter = RateLimiter::new(50, Duration::from_millis(100)).unwrap();
        let start = Instant::now();

        for _ in 0..100 {
            limiter.acquire().await.unwrap();
        }

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(90), "too fast: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(600), "too slow: {elapsed:?}");
    }

    #[tokio::test]
    async fn test_refill_does_not_exceed_capacity() {
        let limiter = RateLimiter::new(3, Duration::from_millis(20)).unwrap();
        tokio::time::sleep(Duration::from_millis(90)).await;
        assert_eq!(limiter.available(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_releases_waiters() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(60)).unwrap());
        limiter.acquire().await.unwrap();

        let waiter = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.acquire().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        limiter.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter must not hang after shutdown")
            .unwrap();
        assert_eq!(result, Err(ConcurrentError::Shutdown));
        assert!(limiter.is_shutdown());
        assert_eq!(limiter.try_acquire(), Err(ConcurrentError::Shutdown));
    }

    #[tokio::test]
    async fn test_zero_period_rejected() {
        let err = RateLimiter::new(1, Duration::ZERO).unwrap_err();
        assert_eq!(err, ConcurrentError::invalid_rate(1, Duration::ZERO));
    }

    #[tokio::test]
    async fn test_zero_permits_rejected() {
        let err = RateLimiter::new(0, Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, ConcurrentError::InvalidRate { permits: 0, period_ms: 10 }));
        assert!(err.to_string().contains("0 permits per 10ms"));
    }
}
