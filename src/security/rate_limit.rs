//! Per-client rate limiting middleware.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::StatusCode;
use dashmap::DashMap;

use crate::http::{RequestContext, RequestError};
use crate::observability::metrics;
use crate::plugin::{settings, Configurable, ConfigurationError, Middleware, Settings};

pub const DEFAULT_MAX_REQUESTS_PER_MINUTE: u64 = 60;
pub const DEFAULT_MAX_TRACKED_CLIENTS: usize = 10_000;

const WINDOW: Duration = Duration::from_secs(60);

/// A fixed one-minute request counter.
#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    count: u64,
    window_start: Instant,
}

impl WindowCounter {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    fn elapsed(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= WINDOW
    }

    fn try_acquire(&mut self, now: Instant, max: u64) -> bool {
        if self.elapsed(now) {
            self.count = 1;
            self.window_start = now;
            return true;
        }

        self.count += 1;
        self.count <= max
    }
}

/// Caps requests per client IP per minute.
///
/// Settings: `MaxRequestsPerMinute` (default 60), `MaxTrackedClients`
/// (default 10 000; when exceeded, counters whose window elapsed are swept).
#[derive(Debug)]
pub struct RateLimiter {
    counters: DashMap<IpAddr, WindowCounter>,
    max_requests: u64,
    max_tracked: usize,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS_PER_MINUTE)
    }
}

impl RateLimiter {
    pub const CLASS_NAME: &'static str = "RateLimitingModule";

    pub fn new(max_requests: u64) -> Self {
        Self {
            counters: DashMap::new(),
            max_requests,
            max_tracked: DEFAULT_MAX_TRACKED_CLIENTS,
        }
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    pub fn tracked_clients(&self) -> usize {
        self.counters.len()
    }

    /// Count one request from `client` at `now`; `false` means over the limit.
    pub fn check_at(&self, client: IpAddr, now: Instant) -> bool {
        let allowed = self
            .counters
            .entry(client)
            .or_insert_with(|| WindowCounter::new(now))
            .try_acquire(now, self.max_requests);

        if self.counters.len() > self.max_tracked {
            self.sweep(now);
        }
        allowed
    }

    pub fn check(&self, client: IpAddr) -> bool {
        self.check_at(client, Instant::now())
    }

    /// Drop counters whose window has elapsed. They would reset on their next
    /// request anyway.
    fn sweep(&self, now: Instant) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, counter| !counter.elapsed(now));
        let swept = before.saturating_sub(self.counters.len());
        tracing::debug!(swept, tracked = self.counters.len(), "Rate limiter counters swept");
        swept
    }
}

impl Configurable for RateLimiter {
    fn configure(&mut self, settings: &Settings) -> Result<(), ConfigurationError> {
        if let Some(max) = settings::optional_u64(settings, "MaxRequestsPerMinute")? {
            self.max_requests = max;
        }
        if let Some(max) = settings::optional_u64(settings, "MaxTrackedClients")? {
            if max == 0 {
                return Err(ConfigurationError::invalid("MaxTrackedClients", "must be at least 1"));
            }
            self.max_tracked = usize::try_from(max).unwrap_or(usize::MAX);
        }
        Ok(())
    }
}

#[async_trait]
impl Middleware for RateLimiter {
    async fn process_request(&self, ctx: &mut RequestContext) -> Result<bool, RequestError> {
        let client = ctx.request().client().ip();
        if self.check(client) {
            return Ok(true);
        }

        tracing::warn!(
            request_id = %ctx.request().id(),
            client = %client,
            limit = self.max_requests,
            "Rate limit exceeded"
        );
        metrics::record_rate_limited("per_minute");
        ctx.respond(StatusCode::FORBIDDEN);
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Request;
    use axum::http::Method;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn sixty_first_request_in_window_is_refused() {
        let limiter = RateLimiter::new(60);
        let start = Instant::now();
        let client = ip("10.0.0.1");

        for i in 0..60 {
            assert!(limiter.check_at(client, start + Duration::from_millis(i * 100)), "request {i}");
        }
        assert!(!limiter.check_at(client, start + Duration::from_secs(10)));

        // Other clients are unaffected.
        assert!(limiter.check_at(ip("10.0.0.2"), start + Duration::from_secs(10)));
    }

    #[test]
    fn next_window_starts_fresh() {
        let limiter = RateLimiter::new(2);
        let start = Instant::now();
        let client = ip("::1");

        assert!(limiter.check_at(client, start));
        assert!(limiter.check_at(client, start));
        assert!(!limiter.check_at(client, start + Duration::from_secs(59)));
        assert!(limiter.check_at(client, start + Duration::from_secs(60)));
        assert!(limiter.check_at(client, start + Duration::from_secs(61)));
        assert!(!limiter.check_at(client, start + Duration::from_secs(62)));
    }

    #[test]
    fn idle_counters_are_swept_past_the_bound() {
        let mut limiter = RateLimiter::new(5);
        limiter.max_tracked = 2;
        let start = Instant::now();

        limiter.check_at(ip("10.0.0.1"), start);
        limiter.check_at(ip("10.0.0.2"), start);
        assert_eq!(limiter.tracked_clients(), 2);

        // Third client arrives after the first two windows elapsed.
        limiter.check_at(ip("10.0.0.3"), start + Duration::from_secs(61));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn configure_reads_limits() {
        let mut limiter = RateLimiter::default();
        let settings: Settings =
            serde_json::from_value(serde_json::json!({ "MaxRequestsPerMinute": 3 })).unwrap();
        limiter.configure(&settings).unwrap();
        assert_eq!(limiter.max_requests(), 3);

        let bad: Settings =
            serde_json::from_value(serde_json::json!({ "MaxTrackedClients": 0 })).unwrap();
        assert!(limiter.configure(&bad).is_err());
    }

    #[tokio::test]
    async fn refusal_answers_forbidden() {
        let limiter = RateLimiter::new(0);
        let request = Request::new("192.168.1.7:4000".parse().unwrap(), Method::GET, "/");
        let (mut ctx, _rx) = RequestContext::new(request);

        assert!(!limiter.process_request(&mut ctx).await.unwrap());
        assert_eq!(ctx.status(), StatusCode::FORBIDDEN);
    }
}
