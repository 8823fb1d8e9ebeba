//! Per-client-IP request rate limiting.
//!
//! Two independent token buckets are tracked per source IP: a general bucket
//! covering every request, and a stricter bucket applied only to the login
//! route. Both are simple fixed-window counters rather than a continuous
//! token bucket — good enough to blunt brute-force and scraping traffic
//! without the bookkeeping of leaky-bucket refill math.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::RwLock;

use crate::state::AppState;

struct Window {
    count: u32,
    started_at: Instant,
}

/// Fixed-window rate limiter shared across requests via `Arc`.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: RwLock<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// Record one request from `ip`. Returns `Ok(())` if under the limit, or
    /// `Err(retry_after)` if the window is exhausted.
    async fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        let mut windows = self.windows.write().await;
        let now = Instant::now();

        let entry = windows.entry(ip).or_insert_with(|| Window {
            count: 0,
            started_at: now,
        });

        if now.duration_since(entry.started_at) >= self.window {
            entry.count = 0;
            entry.started_at = now;
        }

        entry.count += 1;

        if entry.count > self.limit {
            let elapsed = now.duration_since(entry.started_at);
            return Err(self.window.saturating_sub(elapsed));
        }

        Ok(())
    }

    /// Drop every tracked key whose window has already elapsed. Keeps the
    /// map from growing without bound as distinct client IPs come and go.
    async fn prune(&self) {
        let mut windows = self.windows.write().await;
        let now = Instant::now();
        windows.retain(|_, w| now.duration_since(w.started_at) < self.window);
    }
}

/// Two named buckets held in [`AppState`]: `general` gates every request,
/// `login` additionally gates the login route.
pub struct RateLimiters {
    pub general: RateLimiter,
    pub login: RateLimiter,
}

impl RateLimiters {
    async fn prune(&self) {
        self.general.prune().await;
        self.login.prune().await;
    }
}

/// Periodically drop stale rate-limit entries so the in-memory maps don't
/// grow unbounded over a long-running process. Runs until `shutdown` fires.
pub async fn prune_rate_limiters(
    state: Arc<AppState>,
    shutdown: &mut tokio::sync::watch::Receiver<bool>,
    interval_secs: u64,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                state.rate_limiters.prune().await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

fn too_many_requests(retry_after: Duration) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        axum::Json(serde_json::json!({
            "error": "rate_limited",
            "message": "too many requests",
        })),
    )
        .into_response();

    if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after.as_secs().to_string()) {
        response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
    }

    response
}

/// Applies the general per-IP bucket to every request that passes through it.
pub async fn general_rate_limit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    match state.rate_limiters.general.check(addr.ip()).await {
        Ok(()) => next.run(req).await,
        Err(retry_after) => too_many_requests(retry_after),
    }
}

/// Applies the stricter login-route bucket, layered on top of the general
/// bucket on the login route specifically.
pub async fn login_rate_limit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    match state.rate_limiters.login.check(addr.ip()).await {
        Ok(()) => next.run(req).await,
        Err(retry_after) => too_many_requests(retry_after),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn requests_under_the_limit_all_succeed() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for _ in 0..3 {
            assert!(limiter.check(ip).await.is_ok());
        }
    }

    #[tokio::test]
    async fn the_request_past_the_limit_is_rejected() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        assert!(limiter.check(ip).await.is_ok());
        assert!(limiter.check(ip).await.is_ok());
        assert!(limiter.check(ip).await.is_err());
    }

    #[tokio::test]
    async fn distinct_ips_get_independent_buckets() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(a).await.is_ok());
        assert!(limiter.check(b).await.is_ok());
        assert!(limiter.check(a).await.is_err());
    }
}
