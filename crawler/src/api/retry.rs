use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{info, warn};

use super::ApiError;

#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random extra delay, as a share of the backoff.
    pub jitter_ratio: f64,
    /// Added on top of the time left until a rate-limit window resets.
    pub reset_margin: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(900),
            jitter_ratio: 0.3,
            reset_margin: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Exponential part of the delay; `attempt` is 1-based.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    pub fn backoff<R: Rng + ?Sized>(
        &self,
        attempt: u32,
        error: &ApiError,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Duration {
        let base = self.base_backoff(attempt);
        let jitter = base.as_secs_f64() * self.jitter_ratio * rng.gen::<f64>();
        let delay = base + Duration::from_secs_f64(jitter);

        match error.rate_limit_reset() {
            Some(reset) if error.is_rate_limited() => {
                let until_reset = Duration::from_secs((reset - now.timestamp()).max(0) as u64);
                delay.max(until_reset + self.reset_margin)
            }
            _ => delay,
        }
    }
}

/// Runs remote calls under a [`RetryPolicy`].
#[derive(Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Retrier {
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute<T, F, Fut>(&self, label: &str, mut action: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match action().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(error);
            }
            if attempt >= max_attempts {
                warn!("{label} failed after {attempt} attempts: {error}");
                return Err(error);
            }

            let delay = self
                .policy
                .backoff(attempt, &error, Utc::now(), &mut rand::thread_rng());
            info!(
                "{label} failed ({error}), attempt {attempt}/{max_attempts}, retrying in {:.2}s",
                delay.as_secs_f64()
            );
            self.sleeper.sleep(delay).await;
        }
    }
}

#[cfg(test)]
pub(crate) struct RecordingSleeper {
    pub slept: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slept: Default::default(),
        })
    }

    pub fn calls(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn retrier(sleeper: Arc<RecordingSleeper>) -> Retrier {
        Retrier::new(RetryPolicy::default(), sleeper)
    }

    /// Fails with the queued errors in order, then succeeds.
    fn scripted(errors: Vec<ApiError>) -> (Mutex<Vec<ApiError>>, Mutex<u32>) {
        let mut errors = errors;
        errors.reverse();
        (Mutex::new(errors), Mutex::new(0))
    }

    #[test]
    fn base_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_backoff(1), Duration::from_secs(2));
        assert_eq!(policy.base_backoff(2), Duration::from_secs(4));
        assert_eq!(policy.base_backoff(5), Duration::from_secs(32));
        assert_eq!(policy.base_backoff(10), Duration::from_secs(900));
        assert_eq!(policy.base_backoff(64), Duration::from_secs(900));
    }

    #[test]
    fn jitter_stays_within_ratio() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        let error = ApiError::status(502, "Bad Gateway");
        for attempt in 1..=6 {
            let base = policy.base_backoff(attempt);
            let delay = policy.backoff(attempt, &error, Utc::now(), &mut rng);
            assert!(delay >= base);
            assert!(delay <= base.mul_f64(1.3));
        }
    }

    #[test]
    fn rate_limit_reset_extends_delay() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc::now();
        let error = ApiError::status(403, "API rate limit exceeded")
            .with_rate_limit_reset(Some(now.timestamp() + 600));

        let delay = policy.backoff(1, &error, now, &mut rng);
        assert_eq!(delay, Duration::from_secs(605));
    }

    #[test]
    fn past_reset_still_waits_margin() {
        let policy = RetryPolicy {
            jitter_ratio: 0.0,
            base_delay: Duration::from_secs(1),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc::now();
        let error =
            ApiError::status(429, "slow down").with_rate_limit_reset(Some(now.timestamp() - 30));

        assert_eq!(policy.backoff(1, &error, now, &mut rng), Duration::from_secs(5));
    }

    #[test]
    fn reset_ignored_for_server_errors_and_missing_header() {
        let policy = RetryPolicy {
            jitter_ratio: 0.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc::now();

        let server = ApiError::status(503, "unavailable")
            .with_rate_limit_reset(Some(now.timestamp() + 600));
        assert_eq!(policy.backoff(1, &server, now, &mut rng), Duration::from_secs(2));

        let no_header = ApiError::status(403, "forbidden");
        assert_eq!(policy.backoff(2, &no_header, now, &mut rng), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn succeeds_after_retryable_failures() {
        let sleeper = RecordingSleeper::new();
        let (errors, calls) = scripted(vec![
            ApiError::status(500, "boom"),
            ApiError::status(429, "slow down"),
            ApiError::Transport("connection reset".to_string()),
        ]);

        let (errors, calls) = (&errors, &calls);
        let result = retrier(sleeper.clone())
            .execute("GET /repos/acme/widget", move || async move {
                *calls.lock().unwrap() += 1;
                match errors.lock().unwrap().pop() {
                    Some(error) => Err(error),
                    None => Ok(42),
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(*calls.lock().unwrap(), 4);

        let slept = sleeper.calls();
        assert_eq!(slept.len(), 3);
        let policy = RetryPolicy::default();
        for (i, delay) in slept.iter().enumerate() {
            let base = policy.base_backoff(i as u32 + 1);
            assert!(*delay >= base && *delay <= base.mul_f64(1.3));
        }
    }

    #[tokio::test]
    async fn non_retryable_fails_immediately() {
        let sleeper = RecordingSleeper::new();
        let calls = &Mutex::new(0);

        let result: Result<(), _> = retrier(sleeper.clone())
            .execute("GET /repos/acme/widget", move || async move {
                *calls.lock().unwrap() += 1;
                Err(ApiError::status(422, "Validation Failed"))
            })
            .await;

        assert_eq!(result, Err(ApiError::status(422, "Validation Failed")));
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(sleeper.calls().is_empty());
    }

    #[tokio::test]
    async fn undecodable_response_is_not_retried() {
        let sleeper = RecordingSleeper::new();
        let calls = &Mutex::new(0);

        let result: Result<(), _> = retrier(sleeper.clone())
            .execute("GET /repos/acme/widget", move || async move {
                *calls.lock().unwrap() += 1;
                Err(ApiError::Decode("expected u64".to_string()))
            })
            .await;

        assert_eq!(result, Err(ApiError::Decode("expected u64".to_string())));
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(sleeper.calls().is_empty());
    }

    #[tokio::test]
    async fn exhausting_attempts_returns_last_failure() {
        let sleeper = RecordingSleeper::new();
        let calls = &Mutex::new(0u32);

        let result: Result<(), _> = retrier(sleeper.clone())
            .execute("GET /repos/acme/widget", move || async move {
                let mut calls = calls.lock().unwrap();
                *calls += 1;
                Err(ApiError::status(502, format!("attempt {}", *calls)))
            })
            .await;

        assert_eq!(result, Err(ApiError::status(502, "attempt 5")));
        assert_eq!(*calls.lock().unwrap(), 5);
        assert_eq!(sleeper.calls().len(), 4);
    }
}
