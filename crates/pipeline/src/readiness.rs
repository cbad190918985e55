use crate::errors::PipelineError;
use common::wait::BoxError;
use common::{ProbeOutcome, WaitError, WaitPolicy, wait_until_ready};
use reqwest::{Client, Url};
use std::future::Future;
use std::time::Duration;

/// One readiness check against a target.
///
/// `Ok(NotReady)` is transient; `Err` means probing can never succeed and
/// stops the wait.
pub trait Probe {
    fn probe(&self) -> impl Future<Output = Result<ProbeOutcome<()>, BoxError>> + Send;

    /// Human-readable target, used in logs and errors.
    fn target(&self) -> &str;
}

pub struct HttpProbe {
    client: Client,
    url: Url,
}

impl HttpProbe {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

impl Probe for HttpProbe {
    async fn probe(&self) -> Result<ProbeOutcome<()>, BoxError> {
        let result = self.client.get(self.url.clone()).send().await;
        classify(result).map_err(Into::into)
    }

    fn target(&self) -> &str {
        self.url.as_str()
    }
}

/// Sort a GET result into ready, not-ready-yet, or fatal.
///
/// Refused connections and timeouts mean the server is not up yet, and so
/// does a non-2xx answer from a server that is still warming up. DNS failures
/// surface as connect errors: a container's hostname may not resolve before
/// it starts.
pub fn classify(
    result: Result<reqwest::Response, reqwest::Error>,
) -> Result<ProbeOutcome<()>, reqwest::Error> {
    match result {
        Ok(response) if response.status().is_success() => Ok(ProbeOutcome::Ready(())),
        Ok(response) => Ok(ProbeOutcome::NotReady(format!(
            "status {}",
            response.status()
        ))),
        Err(e) if e.is_connect() || e.is_timeout() => Ok(ProbeOutcome::NotReady(e.to_string())),
        Err(e) => Err(e),
    }
}

pub struct ReadinessPoller<P> {
    probe: P,
    policy: WaitPolicy,
}

impl<P: Probe> ReadinessPoller<P> {
    pub fn new(probe: P, policy: WaitPolicy) -> Self {
        Self { probe, policy }
    }

    /// Probe until ready. Fails with `ServiceNotReady` once every attempt has
    /// come back not ready or the policy's time budget runs out, or
    /// `ProbeFailed` on the first fatal probe error.
    pub async fn wait(&self) -> Result<(), PipelineError> {
        let probe = &self.probe;
        let target = probe.target();

        tracing::info!(
            url = target,
            max_attempts = self.policy.max_attempts,
            interval_ms = self.policy.interval.as_millis() as u64,
            "Waiting for inference service"
        );

        wait_until_ready(move |_attempt| probe.probe(), self.policy, target)
            .await
            .map_err(|e| match e {
                WaitError::Exhausted { attempts, .. } => PipelineError::ServiceNotReady {
                    url: target.to_string(),
                    attempts,
                },
                WaitError::Fatal { source, .. } => PipelineError::ProbeFailed {
                    url: target.to_string(),
                    source,
                },
            })
    }
}
