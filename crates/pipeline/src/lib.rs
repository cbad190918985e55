pub mod client;
pub mod config;
pub mod errors;
pub mod flow;
pub mod readiness;
pub mod training;

pub use client::{InferenceClient, Invoker};
pub use config::{PipelineConfig, TrainingCommand};
pub use errors::PipelineError;
pub use flow::{HttpPipeline, Pipeline};
pub use readiness::{HttpProbe, Probe, ReadinessPoller};
pub use training::{CommandTrainer, Trainer};
