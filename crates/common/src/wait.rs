use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fixed-interval polling bound: at most `max_attempts` probes, `interval` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval: Duration::from_secs(1),
        }
    }
}

impl WaitPolicy {
    /// Longest time the wait can spend sleeping between probes.
    pub fn max_sleep(&self) -> Duration {
        self.interval
            .saturating_mul(self.max_attempts.saturating_sub(1))
    }

    /// Hard bound on the whole wait, time spent in each check included:
    /// `max_attempts * interval`.
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

/// Result of a single successful probe round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome<T> {
    Ready(T),
    /// Resource reachable or not, but not usable yet; try again.
    NotReady(String),
}

#[derive(Error, Debug)]
pub enum WaitError {
    #[error("{resource} not ready after {attempts} attempts")]
    Exhausted { resource: String, attempts: u32 },

    #[error("{resource} probe failed on attempt {attempt}: {source}")]
    Fatal {
        resource: String,
        attempt: u32,
        #[source]
        source: BoxError,
    },
}

/// Probe a resource until it reports ready, the attempt bound or time budget
/// is exhausted, or the probe returns a fatal error.
///
/// `probe` receives the 1-based attempt number. `Ok(NotReady)` is transient and
/// schedules another attempt after `policy.interval`; `Err` aborts the wait
/// immediately. No sleep follows the final attempt. An attempt still running
/// when `policy.budget()` runs out is abandoned, and the wait ends there.
pub async fn wait_until_ready<F, Fut, T, E>(
    mut probe: F,
    policy: WaitPolicy,
    resource_name: &str,
) -> Result<T, WaitError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<ProbeOutcome<T>, E>>,
    E: Into<BoxError>,
{
    let deadline = Instant::now() + policy.budget();
    let mut attempts_made = 0;

    for attempt in 1..=policy.max_attempts {
        attempts_made = attempt;

        let outcome = match tokio::time::timeout_at(deadline, probe(attempt)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::debug!(attempt, "{} attempt cut off by wait budget", resource_name);
                break;
            }
        };

        match outcome {
            Ok(ProbeOutcome::Ready(value)) => {
                tracing::info!(attempt, "{} ready", resource_name);
                return Ok(value);
            }
            Ok(ProbeOutcome::NotReady(reason)) => {
                tracing::debug!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    "Waiting for {} ({})",
                    resource_name,
                    reason
                );
            }
            Err(e) => {
                let source = e.into();
                tracing::error!(attempt, error = %source, "{} probe failed", resource_name);
                return Err(WaitError::Fatal {
                    resource: resource_name.to_string(),
                    attempt,
                    source,
                });
            }
        }

        if attempt < policy.max_attempts {
            let next = (Instant::now() + policy.interval).min(deadline);
            tokio::time::sleep_until(next).await;
            if Instant::now() >= deadline {
                break;
            }
        }
    }

    tracing::warn!(
        attempts = attempts_made,
        budget_ms = policy.budget().as_millis() as u64,
        "{} not ready, giving up",
        resource_name
    );

    Err(WaitError::Exhausted {
        resource: resource_name.to_string(),
        attempts: attempts_made,
    })
}
