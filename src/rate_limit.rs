//! Rolling-window rate limiter for outbound API calls.
//!
//! Allows at most `max_requests` acquisitions inside any window of length
//! `period`. The limiter is an ordinary value owned by the caller and
//! passed to whatever needs it; nothing here is global.

use anyhow::{ensure, Result};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

pub struct RateLimiter {
    max_requests: usize,
    period: Duration,
    sent: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, period: Duration) -> Result<Self> {
        ensure!(max_requests > 0, "rate limit max_requests must be > 0");
        ensure!(!period.is_zero(), "rate limit period must be > 0");
        Ok(Self {
            max_requests,
            period,
            sent: Mutex::new(VecDeque::with_capacity(max_requests)),
        })
    }

    pub fn from_config(config: &RateLimitConfig) -> Result<Self> {
        Self::new(config.max_requests, Duration::from_secs(config.period_secs))
    }

    /// Wait until a request slot is free, then claim it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut sent = self.sent.lock().await;
                let now = Instant::now();
                while let Some(&oldest) = sent.front() {
                    if now.duration_since(oldest) >= self.period {
                        sent.pop_front();
                    } else {
                        break;
                    }
                }
                if sent.len() < self.max_requests {
                    sent.push_back(now);
                    return;
                }
                match sent.front() {
                    Some(&oldest) => (oldest + self.period).saturating_duration_since(now),
                    None => Duration::ZERO,
                }
            };
            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_limits() {
        assert!(RateLimiter::new(0, Duration::from_secs(1)).is_err());
        assert!(RateLimiter::new(1, Duration::ZERO).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_up_to_limit_then_waits_for_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60)).unwrap();
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(1));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn window_rolls_rather_than_resets() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10)).unwrap();
        let start = Instant::now();

        limiter.acquire().await;
        tokio::time::sleep(Duration::from_secs(6)).await;
        limiter.acquire().await;

        // Only the first slot has aged out at t=10.
        limiter.acquire().await;
        let third = start.elapsed();
        assert!(third >= Duration::from_secs(10) && third < Duration::from_secs(11));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(16));
    }
}
