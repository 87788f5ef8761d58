//! In-memory per-project rate limiting.
//!
//! A single fixed-window bucket keyed by project id. Windows are one minute
//! long; state lives in process memory, so limits apply per instance.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

const WINDOW: Duration = Duration::from_secs(60);

/// Outcome of a rate limit check.
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Requests left in the current minute window.
    pub remaining_minute: u32,
    /// Seconds until the window resets, set when the request was rejected.
    pub retry_after_seconds: Option<u64>,
}

#[derive(Debug)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// Fixed-window limiter shared across request handlers.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<Uuid, Window>>>,
}

impl RateLimiter {
    pub fn new_in_memory() -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record one request against `project_id` and report whether it fits
    /// under `limit_per_minute`.
    pub async fn check_project(&self, project_id: Uuid, limit_per_minute: u32) -> RateLimitResult {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        let window = windows.entry(project_id).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now.duration_since(window.started_at) >= WINDOW {
            window.started_at = now;
            window.count = 0;
        }

        if window.count >= limit_per_minute {
            let elapsed = now.duration_since(window.started_at);
            let retry_after = WINDOW.saturating_sub(elapsed).as_secs().max(1);
            return RateLimitResult {
                allowed: false,
                remaining_minute: 0,
                retry_after_seconds: Some(retry_after),
            };
        }

        window.count += 1;
        RateLimitResult {
            allowed: true,
            remaining_minute: limit_per_minute - window.count,
            retry_after_seconds: None,
        }
    }

    /// Drop windows that have been idle for a full minute. Called
    /// periodically from a background task.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        windows.retain(|_, w| now.duration_since(w.started_at) < WINDOW);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_request_is_allowed() {
        let limiter = RateLimiter::new_in_memory();
        let project = Uuid::new_v4();

        let result = limiter.check_project(project, 60).await;
        assert!(result.allowed, "First request should be allowed");
        assert_eq!(result.remaining_minute, 59, "Should have 59 remaining");
    }

    #[tokio::test]
    async fn request_over_limit_is_rejected() {
        let limiter = RateLimiter::new_in_memory();
        let project = Uuid::new_v4();

        for i in 0..60 {
            let result = limiter.check_project(project, 60).await;
            assert!(result.allowed, "Request {} should be allowed", i);
        }

        let result = limiter.check_project(project, 60).await;
        assert!(!result.allowed, "61st request should be rejected");
        assert!(
            result.retry_after_seconds.is_some(),
            "Should have retry_after"
        );
    }

    #[tokio::test]
    async fn projects_are_isolated() {
        let limiter = RateLimiter::new_in_memory();
        let project_1 = Uuid::new_v4();
        let project_2 = Uuid::new_v4();

        for _ in 0..5 {
            limiter.check_project(project_1, 5).await;
        }

        let result_1 = limiter.check_project(project_1, 5).await;
        assert!(!result_1.allowed, "Project 1 should be blocked");

        let result_2 = limiter.check_project(project_2, 5).await;
        assert!(result_2.allowed, "Project 2 should be allowed");
    }

    #[tokio::test]
    async fn concurrent_requests_respect_limit() {
        use tokio::sync::Barrier;

        let limiter = Arc::new(RateLimiter::new_in_memory());
        let project = Uuid::new_v4();

        for _ in 0..55 {
            limiter.check_project(project, 60).await;
        }

        let barrier = Arc::new(Barrier::new(10));
        let mut handles = vec![];

        for _ in 0..10 {
            let limiter = Arc::clone(&limiter);
            let barrier = Arc::clone(&barrier);

            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                limiter.check_project(project, 60).await
            }));
        }

        let mut allowed = 0;
        for handle in handles {
            if let Ok(result) = handle.await {
                if result.allowed {
                    allowed += 1;
                }
            }
        }

        assert!(allowed <= 5, "At most 5 concurrent should succeed");
    }

    #[tokio::test]
    async fn cleanup_does_not_corrupt_state() {
        let limiter = RateLimiter::new_in_memory();
        let project = Uuid::new_v4();

        for _ in 0..5 {
            limiter.check_project(project, 10).await;
        }

        limiter.cleanup().await;

        let result = limiter.check_project(project, 10).await;
        assert!(result.allowed, "Should still work after cleanup");
    }
}
