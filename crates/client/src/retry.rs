//! Retry/backoff policy (§4.1, §8 property 7).

use std::time::Duration;

use rand::Rng;

use crate::error::ClientError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_millis(500),
            cap: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable(&self, err: &ClientError) -> bool {
        err.is_retryable()
    }

    /// Delay for attempt `k` (0-based): `min(base * 2^k + jitter, cap)`, with
    /// `jitter ∈ [0, 0.1 * base * 2^k)`.
    pub fn delay_for_attempt(&self, k: u32) -> Duration {
        let base_nanos = self.base.as_nanos() as f64;
        let scaled = base_nanos * 2f64.powi(k as i32);
        let jitter_fraction: f64 = rand::thread_rng().gen_range(0.0..0.1);
        let with_jitter = scaled * (1.0 + jitter_fraction);
        let capped = with_jitter.min(self.cap.as_nanos() as f64);
        Duration::from_nanos(capped.max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_within_documented_bounds() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base: Duration::from_millis(100),
            cap: Duration::from_secs(30),
        };

        for k in 0..6 {
            let base_ms = 100.0 * 2f64.powi(k);
            let delay = policy.delay_for_attempt(k as u32);
            let delay_ms = delay.as_secs_f64() * 1000.0;
            assert!(delay_ms >= base_ms, "k={k} delay {delay_ms} below base {base_ms}");
            assert!(
                delay_ms <= base_ms * 1.1 + 1.0,
                "k={k} delay {delay_ms} above 1.1x base {base_ms}"
            );
            assert!(delay <= policy.cap);
        }
    }

    #[test]
    fn delay_never_exceeds_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
        };
        let delay = policy.delay_for_attempt(8);
        assert!(delay <= Duration::from_secs(30));
    }

    #[test]
    fn classifies_retryable_errors() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable(&ClientError::Timeout));
        assert!(policy.is_retryable(&ClientError::Server {
            status: 503,
            message: "busy".to_string()
        }));
        assert!(!policy.is_retryable(&ClientError::Server {
            status: 404,
            message: "not found".to_string()
        }));
        assert!(!policy.is_retryable(&ClientError::Cancelled));
    }
}
