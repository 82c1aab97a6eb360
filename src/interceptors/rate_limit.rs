//! Per-client token bucket rate limiting.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::rpc::{CallContext, CallResult, Handler, Interceptor, Status};

/// Bucket key for calls without a peer address.
pub const ANONYMOUS: &str = "anonymous";

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    /// Takes one token, or returns how long until one is available.
    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> Result<(), Duration> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / refill_rate))
        }
    }
}

pub struct RateLimitInterceptor {
    buckets: DashMap<String, TokenBucket>,
    rps: f64,
    burst: f64,
    max_delay: Duration,
}

impl RateLimitInterceptor {
    /// Create a limiter refilling `requests_per_second` tokens per second,
    /// holding at most `burst_size`.
    pub fn new(requests_per_second: u32, burst_size: u32, max_delay: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            rps: f64::from(requests_per_second.max(1)),
            burst: f64::from(burst_size.max(1)),
            max_delay,
        }
    }

    /// Build from the `[rate_limit]` section.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.requests_per_second,
            config.burst_size,
            Duration::from_millis(config.max_delay_ms),
        )
    }

    fn key(ctx: &CallContext) -> String {
        ctx.peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| ANONYMOUS.to_string())
    }

    fn acquire(&self, key: &str) -> Result<(), Duration> {
        // The shard guard is released before any await.
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst));
        bucket.try_acquire(self.burst, self.rps)
    }

    /// Number of distinct clients seen so far.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

#[async_trait]
impl Interceptor for RateLimitInterceptor {
    fn name(&self) -> &str {
        "rate-limit"
    }

    async fn intercept(
        &self,
        ctx: &mut CallContext,
        request: Bytes,
        next: &dyn Handler,
    ) -> CallResult {
        let key = Self::key(ctx);

        if let Err(wait) = self.acquire(&key) {
            if self.max_delay.is_zero() {
                return Err(reject(ctx, &key));
            }
            let delay = (wait + Duration::from_millis(1)).min(self.max_delay);
            ctx.run(async move {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await?;
            if self.acquire(&key).is_err() {
                return Err(reject(ctx, &key));
            }
        }

        next.call(ctx, request).await
    }
}

fn reject(ctx: &CallContext, key: &str) -> Status {
    tracing::warn!(client = %key, method = %ctx.method(), "Rate limit exceeded");
    metrics::record_rate_limited(ctx.method());
    Status::resource_exhausted("rate limit exceeded")
}
