use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::trace;

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RateLimit {
    pub requests_per_second: f64,
    pub burst_size: f64,
}

impl Default for RateLimit {
    fn default() -> Self {
        RateLimit {
            requests_per_second: 2.0,
            burst_size: 5.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limit wait for {host} would exceed {max_wait:?}")]
    MaxWaitExceeded { host: String, max_wait: Duration },
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Per-host token buckets with continuous refill. One limiter instance is
/// shared by every outbound fetch; hosts are keyed by name so all requests
/// against an endpoint serialize through the same budget.
pub struct HostRateLimiter {
    default_limit: RateLimit,
    overrides: HashMap<String, RateLimit>,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl HostRateLimiter {
    pub fn new(default_limit: RateLimit, overrides: HashMap<String, RateLimit>) -> HostRateLimiter {
        HostRateLimiter {
            default_limit,
            overrides,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn limit_for(&self, host: &str) -> RateLimit {
        self.overrides.get(host).copied().unwrap_or(self.default_limit)
    }

    /// Takes one token for the host, waiting for refill when the bucket is
    /// empty. With `max_wait` set the call fails fast instead of queueing
    /// past the caller's budget.
    pub async fn acquire(
        &self,
        host: &str,
        max_wait: Option<Duration>,
    ) -> Result<(), RateLimitError> {
        let limit = self.limit_for(host);
        let mut waited = Duration::ZERO;

        loop {
            let wait = {
                let mut buckets = self.buckets.lock().await;
                let bucket = buckets.entry(host.to_string()).or_insert_with(|| Bucket {
                    tokens: limit.burst_size,
                    last_refill: Instant::now(),
                });

                let elapsed = bucket.last_refill.elapsed().as_secs_f64();
                bucket.tokens =
                    (bucket.tokens + elapsed * limit.requests_per_second).min(limit.burst_size);
                bucket.last_refill = Instant::now();

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    trace!(host, tokens_left = bucket.tokens, "token acquired");
                    return Ok(());
                }

                Duration::from_secs_f64((1.0 - bucket.tokens) / limit.requests_per_second)
            };

            if let Some(max_wait) = max_wait {
                if waited + wait > max_wait {
                    return Err(RateLimitError::MaxWaitExceeded {
                        host: host.to_string(),
                        max_wait,
                    });
                }
            }

            waited += wait;
            tokio::time::sleep(wait).await;
        }
    }
}
