// Fixed-window request limiter keyed by client address

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Above this many tracked clients, expired windows are pruned on insert.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clients: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub async fn check(&self, client: &str) -> Decision {
        self.check_at(client, Instant::now()).await
    }

    pub async fn check_at(&self, client: &str, now: Instant) -> Decision {
        let mut clients = self.clients.lock().await;

        if clients.len() >= PRUNE_THRESHOLD && !clients.contains_key(client) {
            let window = self.window;
            clients.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = clients.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            return Decision::Limited {
                retry_after: self.window - now.saturating_duration_since(entry.started),
            };
        }

        entry.count += 1;
        Decision::Allowed {
            remaining: self.max_requests - entry.count,
        }
    }

    #[cfg(test)]
    async fn tracked_clients(&self) -> usize {
        self.clients.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_after_limit_within_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let t0 = Instant::now();

        assert_eq!(
            limiter.check_at("a", t0).await,
            Decision::Allowed { remaining: 1 }
        );
        assert_eq!(
            limiter.check_at("a", t0).await,
            Decision::Allowed { remaining: 0 }
        );
        assert_eq!(
            limiter.check_at("a", t0 + Duration::from_secs(20)).await,
            Decision::Limited {
                retry_after: Duration::from_secs(40)
            }
        );
    }

    #[tokio::test]
    async fn window_resets_after_expiry() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let t0 = Instant::now();

        assert!(matches!(
            limiter.check_at("a", t0).await,
            Decision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check_at("a", t0 + Duration::from_secs(59)).await,
            Decision::Limited { .. }
        ));
        assert!(matches!(
            limiter.check_at("a", t0 + Duration::from_secs(60)).await,
            Decision::Allowed { .. }
        ));
    }

    #[tokio::test]
    async fn clients_are_counted_separately() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let t0 = Instant::now();

        assert!(matches!(limiter.check_at("a", t0).await, Decision::Allowed { .. }));
        assert!(matches!(limiter.check_at("b", t0).await, Decision::Allowed { .. }));
        assert!(matches!(limiter.check_at("a", t0).await, Decision::Limited { .. }));
    }

    #[tokio::test]
    async fn prunes_expired_windows() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1));
        let t0 = Instant::now();

        for i in 0..PRUNE_THRESHOLD {
            limiter.check_at(&format!("client-{i}"), t0).await;
        }
        assert_eq!(limiter.tracked_clients().await, PRUNE_THRESHOLD);

        limiter
            .check_at("late", t0 + Duration::from_secs(2))
            .await;
        assert_eq!(limiter.tracked_clients().await, 1);
    }
}
