//! Bounded retry with a fixed delay.
//!
//! The operation runs at most `max_attempts` times. Between attempts the task
//! sleeps on the tokio timer; it never spins.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, delay: Duration::from_millis(500) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. } | RetryOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryOutcome::Succeeded { value, .. } => Ok(value),
            RetryOutcome::Exhausted { error, .. } => Err(error),
        }
    }
}

/// Run `op` until it succeeds or the policy is used up.
///
/// A policy with `max_attempts == 0` still runs the operation once.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return RetryOutcome::Succeeded { value, attempts: attempt },
            Err(error) if attempt >= max => {
                tracing::warn!(attempts = attempt, "retries exhausted: {error}");
                return RetryOutcome::Exhausted { error, attempts: attempt };
            }
            Err(error) => {
                tracing::warn!(
                    attempt,
                    max_attempts = max,
                    "operation failed, retrying in {:?}: {error}",
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy { max_attempts, delay: Duration::from_secs(2) }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_all_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let started = tokio::time::Instant::now();

        let outcome: RetryOutcome<(), String> = retry(policy(3), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err("index.lock exists".to_string())
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome, RetryOutcome::Exhausted { error: "index.lock exists".into(), attempts: 3 });
        // two sleeps between three attempts
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let outcome = retry(policy(5), || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 1 {
                    Err("busy")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(outcome, RetryOutcome::Succeeded { value: 42, attempts: 2 });
        assert_eq!(outcome.into_result(), Ok(42));
    }

    #[tokio::test]
    async fn test_zero_attempts_runs_once() {
        let outcome: RetryOutcome<u8, &str> = retry(policy(0), || async { Err("nope") }).await;
        assert_eq!(outcome.attempts(), 1);
    }
}
