//! Admission control: the single gate in front of every upstream endpoint.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default limit: 5 requests per 10-second window.
pub const DEFAULT_RATE_LIMIT: usize = 5;
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    /// Requests allowed inside one window.
    pub limit: usize,
    /// Sliding window length.
    pub window: Duration,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        AdmissionPolicy {
            limit: DEFAULT_RATE_LIMIT,
            window: DEFAULT_RATE_WINDOW,
        }
    }
}

/// Why a request was turned away.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("Rate limit exceeded. Max {limit} requests per {window_secs} seconds.")]
    RateLimited { limit: usize, window_secs: u64 },

    #[error("CRM API is currently down for maintenance")]
    ServiceUnavailable,
}

/// Snapshot of the gate for the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionStatus {
    pub down_mode: bool,
    pub recent_requests: usize,
    pub rate_limit: usize,
    pub window_seconds: u64,
}

/// Outage flag plus recent admissions, behind one lock so that each
/// decision sees a consistent view of both.
#[derive(Debug, Default)]
struct Gate {
    outage: bool,
    /// Admission instants, oldest first.
    recent: VecDeque<Instant>,
}

impl Gate {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.recent.front() {
            if now.duration_since(*oldest) >= window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Sliding-window rate limiter with an operator-controlled outage switch.
#[derive(Debug)]
pub struct AdmissionController {
    policy: AdmissionPolicy,
    gate: Mutex<Gate>,
}

impl AdmissionController {
    pub fn new(policy: AdmissionPolicy) -> Self {
        AdmissionController {
            policy,
            gate: Mutex::new(Gate::default()),
        }
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    /// Decide whether one request may proceed.
    ///
    /// Outage wins over everything. Otherwise, rejected requests are not
    /// recorded, so a client hammering a full window does not extend it.
    pub async fn admit(&self) -> Result<(), AdmissionError> {
        let mut gate = self.gate.lock().await;
        if gate.outage {
            tracing::warn!("request rejected: outage mode");
            return Err(AdmissionError::ServiceUnavailable);
        }

        let now = Instant::now();
        gate.prune(now, self.policy.window);
        if gate.recent.len() >= self.policy.limit {
            tracing::warn!(
                recent = gate.recent.len(),
                limit = self.policy.limit,
                "request rejected: rate limited"
            );
            return Err(AdmissionError::RateLimited {
                limit: self.policy.limit,
                window_secs: self.policy.window.as_secs(),
            });
        }

        gate.recent.push_back(now);
        tracing::debug!(recent = gate.recent.len(), "request admitted");
        Ok(())
    }

    /// Forget every recorded admission.
    pub async fn reset(&self) {
        self.gate.lock().await.recent.clear();
    }

    /// Set the outage flag to `down`. Returns the new value.
    pub async fn set_outage(&self, down: bool) -> bool {
        let mut gate = self.gate.lock().await;
        if gate.outage != down {
            tracing::info!(down, "outage mode changed");
        }
        gate.outage = down;
        down
    }

    /// Flip the outage flag. Returns the new value.
    pub async fn toggle_outage(&self) -> bool {
        let mut gate = self.gate.lock().await;
        gate.outage = !gate.outage;
        tracing::info!(down = gate.outage, "outage mode toggled");
        gate.outage
    }

    pub async fn status(&self) -> AdmissionStatus {
        let mut gate = self.gate.lock().await;
        gate.prune(Instant::now(), self.policy.window);
        AdmissionStatus {
            down_mode: gate.outage,
            recent_requests: gate.recent.len(),
            rate_limit: self.policy.limit,
            window_seconds: self.policy.window.as_secs(),
        }
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        AdmissionController::new(AdmissionPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn sixth_request_in_window_is_rate_limited() {
        let gate = AdmissionController::default();
        for _ in 0..5 {
            gate.admit().await.unwrap();
            tokio::time::advance(Duration::from_millis(500)).await;
        }
        assert_eq!(
            gate.admit().await,
            Err(AdmissionError::RateLimited {
                limit: 5,
                window_secs: 10
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn admission_resumes_once_oldest_leaves_window() {
        let gate = AdmissionController::default();
        gate.admit().await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;
        for _ in 0..4 {
            gate.admit().await.unwrap();
        }
        assert!(gate.admit().await.is_err());

        // Oldest admission is now exactly one window old.
        tokio::time::advance(Duration::from_secs(7)).await;
        gate.admit().await.unwrap();
        assert!(gate.admit().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rejections_do_not_extend_the_window() {
        let gate = AdmissionController::default();
        for _ in 0..5 {
            gate.admit().await.unwrap();
        }
        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(3)).await;
            assert!(gate.admit().await.is_err());
        }
        tokio::time::advance(Duration::from_secs(1)).await;
        gate.admit().await.unwrap();
    }

    #[tokio::test]
    async fn outage_overrides_an_empty_window() {
        let gate = AdmissionController::default();
        gate.set_outage(true).await;
        for _ in 0..3 {
            assert_eq!(gate.admit().await, Err(AdmissionError::ServiceUnavailable));
        }
        assert_eq!(gate.status().await.recent_requests, 0);

        gate.set_outage(false).await;
        gate.admit().await.unwrap();
    }

    #[tokio::test]
    async fn outage_overrides_a_full_window() {
        let gate = AdmissionController::default();
        for _ in 0..5 {
            gate.admit().await.unwrap();
        }
        assert!(gate.toggle_outage().await);
        assert_eq!(gate.admit().await, Err(AdmissionError::ServiceUnavailable));
        assert!(!gate.toggle_outage().await);
        assert!(matches!(
            gate.admit().await,
            Err(AdmissionError::RateLimited { .. })
        ));
    }

    #[tokio::test]
    async fn set_outage_is_idempotent() {
        let gate = AdmissionController::default();
        assert!(gate.set_outage(true).await);
        assert!(gate.set_outage(true).await);
        assert!(gate.status().await.down_mode);
    }

    #[tokio::test]
    async fn reset_clears_window_but_not_outage() {
        let gate = AdmissionController::default();
        for _ in 0..5 {
            gate.admit().await.unwrap();
        }
        gate.set_outage(true).await;
        gate.reset().await;
        let status = gate.status().await;
        assert_eq!(status.recent_requests, 0);
        assert!(status.down_mode);
    }

    #[tokio::test]
    async fn concurrent_callers_never_exceed_the_limit() {
        let gate = Arc::new(AdmissionController::default());
        let mut handles = Vec::new();
        for _ in 0..20 {
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move { gate.admit().await.is_ok() }));
        }
        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }
}
