//! Answer oracle
//!
//! The oracle is an external, fallible, rate-limited question answerer. Calls
//! are awaited one at a time. Only rate-limit signals are retried, with
//! exponential backoff bounded by [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Oracle call failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// Provider asked us to slow down
    #[error("rate limited")]
    RateLimited { retry_after_ms: Option<u64> },

    /// Request could not be sent or completed
    #[error("oracle transport error: {0}")]
    Transport(String),

    /// Provider answered with an error status
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// Response did not contain an answer
    #[error("malformed oracle response: {0}")]
    Malformed(String),
}

impl OracleError {
    /// Whether the call may succeed if retried
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// External question answerer
#[async_trait::async_trait]
pub trait Oracle: Send + Sync {
    /// Answer one question
    async fn ask(&self, question: &str) -> Result<String, OracleError>;
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Never retry
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Retry without waiting
    #[must_use]
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            multiplier: 1.0,
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, initial_ms: u64, max_ms: u64) -> Self {
        self.initial_backoff_ms = initial_ms;
        self.max_backoff_ms = max_ms;
        self
    }

    /// Delay before retry number `attempt` (0-based), capped
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.initial_backoff_ms as f64 * self.multiplier.powi(exponent);
        let capped = raw.min(self.max_backoff_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Delay honoring a provider hint, still capped
    #[must_use]
    pub fn delay_for(&self, attempt: u32, error: &OracleError) -> Duration {
        match error {
            OracleError::RateLimited {
                retry_after_ms: Some(ms),
            } => Duration::from_millis((*ms).min(self.max_backoff_ms)),
            _ => self.backoff(attempt),
        }
    }
}

/// Ask `oracle`, retrying rate-limit failures per `policy`
///
/// # Errors
/// The last error once retries are exhausted, or the first non-retryable one.
pub async fn ask_with_retry(
    oracle: &dyn Oracle,
    question: &str,
    policy: &RetryPolicy,
) -> Result<String, OracleError> {
    let mut attempt = 0;
    loop {
        match oracle.ask(question).await {
            Ok(answer) => return Ok(answer),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt, &e);
                tracing::warn!(attempt = attempt + 1, delay_ms = delay.as_millis(), "oracle rate limited, retrying");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Flaky {
        failures: Mutex<u32>,
        error: OracleError,
        calls: Mutex<u32>,
    }

    impl Flaky {
        fn new(failures: u32, error: OracleError) -> Self {
            Self {
                failures: Mutex::new(failures),
                error,
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Oracle for Flaky {
        async fn ask(&self, _question: &str) -> Result<String, OracleError> {
            *self.calls.lock() += 1;
            let mut failures = self.failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(self.error.clone());
            }
            Ok("42".into())
        }
    }

    fn rate_limited() -> OracleError {
        OracleError::RateLimited { retry_after_ms: None }
    }

    #[tokio::test]
    async fn retries_rate_limits_until_success() {
        let oracle = Flaky::new(2, rate_limited());
        let answer = ask_with_retry(&oracle, "q", &RetryPolicy::immediate(3)).await;
        assert_eq!(answer.unwrap(), "42");
        assert_eq!(*oracle.calls.lock(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let oracle = Flaky::new(10, rate_limited());
        let answer = ask_with_retry(&oracle, "q", &RetryPolicy::immediate(2)).await;
        assert_eq!(answer.unwrap_err(), rate_limited());
        assert_eq!(*oracle.calls.lock(), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let oracle = Flaky::new(1, OracleError::Transport("reset".into()));
        let answer = ask_with_retry(&oracle, "q", &RetryPolicy::immediate(5)).await;
        assert!(matches!(answer, Err(OracleError::Transport(_))));
        assert_eq!(*oracle.calls.lock(), 1);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4_000));
        assert_eq!(policy.backoff(10), Duration::from_millis(8_000));
        assert_eq!(RetryPolicy::immediate(3).backoff(2), Duration::ZERO);
    }

    #[test]
    fn provider_hint_is_capped() {
        let policy = RetryPolicy::default().with_backoff(100, 2_000);
        let hinted = OracleError::RateLimited {
            retry_after_ms: Some(60_000),
        };
        assert_eq!(policy.delay_for(0, &hinted), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(1, &rate_limited()), Duration::from_millis(200));
    }
}
