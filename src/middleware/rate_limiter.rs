//! Per-client request throttling

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

use super::client::client_of;
use crate::error::ApiError;

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl Bucket {
    fn full(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            refilled_at: Instant::now(),
        }
    }

    /// Take one token, or report how long until one is available
    fn take(&mut self, rate: f64, capacity: f64, now: Instant) -> Result<(), Duration> {
        let elapsed = now.saturating_duration_since(self.refilled_at).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.refilled_at = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / rate))
        }
    }
}

/// Token buckets keyed by client address. Bursts up to twice the rate.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, Bucket>>>,
    rate: f64,
    capacity: f64,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        let rate = f64::from(requests_per_second.max(1));
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            rate,
            capacity: rate * 2.0,
        }
    }

    /// `Err` carries the suggested wait before retrying
    pub async fn check(&self, client: &str) -> Result<(), Duration> {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(client.to_string())
            .or_insert_with(|| Bucket::full(self.capacity))
            .take(self.rate, self.capacity, Instant::now())
    }

    /// Forget clients idle for longer than `max_idle`
    pub async fn evict_idle(&self, max_idle: Duration) {
        let now = Instant::now();
        self.buckets
            .lock()
            .await
            .retain(|_, b| now.saturating_duration_since(b.refilled_at) < max_idle);
    }

    /// Periodic eviction in the background
    pub fn spawn_eviction(&self, every: Duration) {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                limiter.evict_idle(every).await;
            }
        });
    }
}

/// Use with `axum::middleware::from_fn_with_state`, inside [`resolve_client`]
///
/// [`resolve_client`]: super::resolve_client
pub async fn rate_limit(State(limiter): State<RateLimiter>, request: Request, next: Next) -> Response {
    let client = client_of(&request);

    if let Err(wait) = limiter.check(client.as_str()).await {
        tracing::warn!(client = %client.as_str(), "Rate limit exceeded");
        let retry_after = wait.as_secs().max(1).to_string();
        let mut response = ApiError::TooManyRequests.into_response();
        if let Ok(value) = HeaderValue::from_str(&retry_after) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    next.run(request).await
}
