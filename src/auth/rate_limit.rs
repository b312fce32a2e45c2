/*!
 * # Login Rate Limiting
 *
 * Fixed-window attempt counting per `email|ip` key. Persistent lockout after
 * repeated bad passwords is tracked on the supplier row; this limiter only
 * throttles bursts and forgets everything on restart.
 */

use crate::config::AppConfig;
use crate::errors::ServiceError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct AuthRateLimitConfig {
    pub max_attempts: u32,
    pub window: Duration,
}

impl Default for AuthRateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl From<&AppConfig> for AuthRateLimitConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.login_rate_limit,
            window: Duration::from_secs(config.login_rate_window_secs),
        }
    }
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    attempts: u32,
    first_attempt: Instant,
}

impl RateLimitEntry {
    fn new() -> Self {
        Self {
            attempts: 0,
            first_attempt: Instant::now(),
        }
    }

    fn should_reset(&self, window: Duration) -> bool {
        Instant::now().duration_since(self.first_attempt) > window
    }
}

/// In-memory limiter for the login endpoint
#[derive(Clone)]
pub struct AuthRateLimiter {
    config: AuthRateLimitConfig,
    limits: Arc<Mutex<HashMap<String, RateLimitEntry>>>,
}

impl AuthRateLimiter {
    pub fn new(config: AuthRateLimitConfig) -> Self {
        Self {
            config,
            limits: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn key(email: &str, ip: &str) -> String {
        format!("{}|{}", email.trim().to_lowercase(), ip)
    }

    /// Count one attempt for `key`, failing once the window's budget is spent.
    pub async fn check(&self, key: &str) -> Result<(), ServiceError> {
        let mut limits = self.limits.lock().await;
        let entry = limits
            .entry(key.to_string())
            .or_insert_with(RateLimitEntry::new);

        if entry.should_reset(self.config.window) {
            *entry = RateLimitEntry::new();
        }

        if entry.attempts >= self.config.max_attempts {
            warn!(key, attempts = entry.attempts, "login rate limit exceeded");
            metrics::counter!("flexvolt_auth.rate_limited", 1);
            return Err(ServiceError::RateLimitExceeded);
        }

        entry.attempts += 1;
        Ok(())
    }

    /// A successful login clears the key's counter
    pub async fn record_success(&self, key: &str) {
        let mut limits = self.limits.lock().await;
        limits.remove(key);
    }

    pub async fn cleanup(&self) {
        let mut limits = self.limits.lock().await;
        let before = limits.len();
        limits.retain(|_, entry| !entry.should_reset(self.config.window * 2));
        debug!(removed = before - limits.len(), "rate limit cleanup");
    }
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new(AuthRateLimitConfig::default())
    }
}

/// Background task to drop stale rate limit entries
pub async fn cleanup_rate_limits(rate_limiter: Arc<AuthRateLimiter>) {
    loop {
        sleep(Duration::from_secs(60 * 10)).await;
        rate_limiter.cleanup().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn limiter(max_attempts: u32) -> AuthRateLimiter {
        AuthRateLimiter::new(AuthRateLimitConfig {
            max_attempts,
            window: Duration::from_secs(60),
        })
    }

    #[tokio::test]
    async fn blocks_after_budget_is_spent() {
        let limiter = limiter(3);
        let key = AuthRateLimiter::key("Buyer@Example.com", "10.0.0.1");
        for _ in 0..3 {
            limiter.check(&key).await.unwrap();
        }
        assert_matches!(limiter.check(&key).await, Err(ServiceError::RateLimitExceeded));

        // other clients are unaffected
        let other = AuthRateLimiter::key("buyer@example.com", "10.0.0.2");
        assert!(limiter.check(&other).await.is_ok());
    }

    #[tokio::test]
    async fn success_resets_counter() {
        let limiter = limiter(2);
        let key = AuthRateLimiter::key("a@b.co", "127.0.0.1");
        limiter.check(&key).await.unwrap();
        limiter.check(&key).await.unwrap();
        limiter.record_success(&key).await;
        assert!(limiter.check(&key).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn window_expiry_resets_counter() {
        let limiter = limiter(1);
        let key = AuthRateLimiter::key("a@b.co", "127.0.0.1");
        limiter.check(&key).await.unwrap();
        assert!(limiter.check(&key).await.is_err());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check(&key).await.is_ok());
    }

    #[test]
    fn key_normalises_email() {
        assert_eq!(
            AuthRateLimiter::key(" Ops@FlexVolt.io ", "1.2.3.4"),
            "ops@flexvolt.io|1.2.3.4"
        );
    }
}
