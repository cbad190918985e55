use common::wait::BoxError;
use schema::SchemaError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Training failed ({}): {stderr}", exit_label(.code))]
    TrainingFailed { code: Option<i32>, stderr: String },

    #[error("Failed to run training command '{command}': {source}")]
    TrainingSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Service at {url} not ready after {attempts} attempts")]
    ServiceNotReady { url: String, attempts: u32 },

    #[error("Readiness probe against {url} failed: {source}")]
    ProbeFailed {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("Sample input not found: {}", path.display())]
    MissingFixture { path: PathBuf },

    #[error("Failed to read sample input {}: {source}", path.display())]
    FixtureRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Inference request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Inference response is malformed: {0}")]
    InvalidPrediction(#[from] SchemaError),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}
