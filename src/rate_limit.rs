use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::watch;

use crate::error::AppError;
use crate::state::SharedState;

/// Named per-IP budget for one server action.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub key: &'static str,
    pub limit: u32,
    pub window: Duration,
}

pub const CHANGE_PASSWORD: RateLimit = RateLimit {
    key: "change-password",
    limit: 2,
    window: Duration::from_millis(30_000),
};

pub const RESET_PASSWORD: RateLimit = RateLimit {
    key: "reset-password",
    limit: 3,
    window: Duration::from_millis(60_000),
};

/// Per-IP-per-action limiter using a fixed window.
pub struct IpRateLimiter {
    /// (action key, ip) -> (count, window_start)
    entries: DashMap<(&'static str, IpAddr), (u32, Instant)>,
}

impl Default for IpRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl IpRateLimiter {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Count one call. Returns Ok(()) or Err with retry-after seconds.
    pub fn check(&self, rule: RateLimit, ip: IpAddr) -> Result<(), u64> {
        self.check_at(rule, ip, Instant::now())
    }

    fn check_at(&self, rule: RateLimit, ip: IpAddr, now: Instant) -> Result<(), u64> {
        let mut entry = self.entries.entry((rule.key, ip)).or_insert((0, now));
        let (count, start) = entry.value_mut();

        if now.duration_since(*start) >= rule.window {
            *count = 1;
            *start = now;
            return Ok(());
        }

        if *count >= rule.limit {
            let remaining = rule.window.saturating_sub(now.duration_since(*start));
            // Round up so a client waiting exactly this long finds the window reset
            let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            return Err(secs.max(1));
        }

        *count += 1;
        Ok(())
    }

    /// Remove stale entries older than the given duration.
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        self.entries.retain(|_, (_, start)| now.duration_since(*start) < max_age);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Charge one call against `rule` for `ip`, mapping exhaustion to a 429.
pub fn rate_limit_by_ip(limiter: &IpRateLimiter, rule: RateLimit, ip: IpAddr) -> Result<(), AppError> {
    limiter.check(rule, ip).map_err(|retry_after| {
        tracing::warn!(key = rule.key, %ip, retry_after, "Rate limit exceeded");
        AppError::RateLimited {
            message: "Rate limit exceeded".to_string(),
            retry_after,
        }
    })
}

/// Periodically drop expired limiter entries until shutdown is signaled.
pub async fn run_sweeper(
    state: SharedState,
    every: Duration,
    max_age: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let before = state.limiter.len();
                state.limiter.cleanup(max_age);
                let removed = before.saturating_sub(state.limiter.len());
                if removed > 0 {
                    tracing::debug!("Rate limiter swept {removed} entries");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    tracing::debug!("Rate limit sweeper stopped");
}
