use common::WaitPolicy;
use common::config::{env_opt, env_or, env_parse};
use reqwest::Url;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub use common::Environment;

pub const DEFAULT_TRAIN_COMMAND: &str = "docker compose run --rm train";
pub const DEFAULT_READY_URL: &str = "http://localhost:8000/docs";
pub const DEFAULT_PREDICT_URL: &str = "http://localhost:8000/predict";
pub const DEFAULT_SAMPLE_IMAGE: &str = "datasets/coco128/images/train2017/000000000283.jpg";

/// External program run to train the model, as program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl TrainingCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Split a command line on whitespace. No shell quoting is interpreted.
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("PIPELINE_TRAIN_COMMAND must not be empty"))?;

        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl fmt::Display for TrainingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub environment: Environment,
    pub train_command: TrainingCommand,
    pub ready_url: Url,
    pub predict_url: Url,
    pub sample_image: PathBuf,
    pub wait_policy: WaitPolicy,
    pub probe_timeout: Duration,
    pub otel_endpoint: Option<String>,
}

impl PipelineConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let max_attempts: u32 = env_parse("PIPELINE_READY_ATTEMPTS", 20);
        if max_attempts == 0 {
            anyhow::bail!("PIPELINE_READY_ATTEMPTS must be at least 1");
        }

        Ok(Self {
            environment: Environment::from_env(),
            train_command: TrainingCommand::parse(&env_or(
                "PIPELINE_TRAIN_COMMAND",
                DEFAULT_TRAIN_COMMAND,
            ))?,
            ready_url: parse_http_url(
                "PIPELINE_READY_URL",
                &env_or("PIPELINE_READY_URL", DEFAULT_READY_URL),
            )?,
            predict_url: parse_http_url(
                "PIPELINE_PREDICT_URL",
                &env_or("PIPELINE_PREDICT_URL", DEFAULT_PREDICT_URL),
            )?,
            sample_image: PathBuf::from(env_or("PIPELINE_SAMPLE_IMAGE", DEFAULT_SAMPLE_IMAGE)),
            wait_policy: WaitPolicy {
                max_attempts,
                interval: Duration::from_millis(env_parse("PIPELINE_READY_INTERVAL_MS", 1000)),
            },
            probe_timeout: Duration::from_millis(env_parse("PIPELINE_PROBE_TIMEOUT_MS", 2000)),
            otel_endpoint: env_opt("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }
}

/// Malformed or non-HTTP URLs are configuration errors, never probe failures.
fn parse_http_url(key: &str, raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw).map_err(|e| anyhow::anyhow!("{} is not a valid URL ({}): {}", key, raw, e))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => anyhow::bail!("{} must use http or https, got '{}'", key, other),
    }
}
