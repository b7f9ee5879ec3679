/// Security helpers shared by the HTTP layer
/// Features:
/// - Per-IP rate limiting for login attempts (brute-force protection)
/// - Security headers (XSS, clickjacking, MIME sniffing protection)

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::configuration::RateLimitSettings;

/// Buckets beyond this count trigger a sweep of fully refilled ones
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Token bucket: `capacity` requests, refilled evenly over `window`
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    capacity: f64,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    fn new(capacity: u32, window: Duration, now: Instant) -> Self {
        let window_secs = window.as_secs_f64().max(1.0);
        Self {
            tokens: capacity as f64,
            last_refill: now,
            capacity: capacity as f64,
            refill_rate: capacity as f64 / window_secs,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    fn try_take_token(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn is_full(&self) -> bool {
        self.tokens >= self.capacity
    }
}

/// Rate limiter manager - tracks limits per client IP
pub struct RateLimiterManager {
    max_requests: u32,
    window: Duration,
    limiters: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiterManager {
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self {
            max_requests: settings.login_max_requests,
            window: Duration::from_secs(settings.login_window_secs),
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// Check if a request from `ip` is allowed, consuming one token
    pub fn check_rate_limit(&self, ip: &str) -> Result<(), String> {
        self.check_rate_limit_at(ip, Instant::now())
    }

    fn check_rate_limit_at(&self, ip: &str, now: Instant) -> Result<(), String> {
        let mut limiters = self.lock();

        if limiters.len() > MAX_TRACKED_CLIENTS {
            limiters.retain(|_, bucket| {
                bucket.refill(now);
                !bucket.is_full()
            });
        }

        let (max_requests, window) = (self.max_requests, self.window);
        let limiter = limiters
            .entry(ip.to_string())
            .or_insert_with(|| TokenBucket::new(max_requests, window, now));

        if limiter.try_take_token(now) {
            Ok(())
        } else {
            Err(format!(
                "Too many login attempts: max {} per {} seconds",
                self.max_requests,
                self.window.as_secs()
            ))
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        // Buckets stay consistent even if a holder panicked
        self.limiters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Security headers for HTTP responses
pub struct SecurityHeaders;

impl SecurityHeaders {
    pub fn get_headers() -> Vec<(&'static str, &'static str)> {
        vec![
            // Clickjacking
            ("X-Frame-Options", "DENY"),
            // XSS / MIME sniffing
            ("X-Content-Type-Options", "nosniff"),
            ("X-XSS-Protection", "1; mode=block"),
            ("Content-Security-Policy", "default-src 'none'; frame-ancestors 'none'"),
            ("Referrer-Policy", "strict-origin-when-cross-origin"),
            ("Permissions-Policy", "geolocation=(), microphone=(), camera=()"),
        ]
    }
}
