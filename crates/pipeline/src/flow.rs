use crate::{
    client::{InferenceClient, Invoker},
    config::PipelineConfig,
    errors::PipelineError,
    readiness::{HttpProbe, Probe, ReadinessPoller},
    training::{CommandTrainer, Trainer},
};
use schema::Prediction;
use tracing::Instrument;

/// Train, wait for the service, then run one test inference.
///
/// Steps run strictly in order and the first failure aborts the rest.
pub struct Pipeline<T, P, I> {
    trainer: T,
    poller: ReadinessPoller<P>,
    invoker: I,
}

pub type HttpPipeline = Pipeline<CommandTrainer, HttpProbe, InferenceClient>;

impl HttpPipeline {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let trainer = CommandTrainer::new(config.train_command.clone());
        let probe = HttpProbe::new(config.ready_url.clone(), config.probe_timeout)?;
        let invoker = InferenceClient::new(config.predict_url.clone(), config.sample_image.clone())?;

        Ok(Pipeline::new(
            trainer,
            ReadinessPoller::new(probe, config.wait_policy),
            invoker,
        ))
    }
}

impl<T: Trainer, P: Probe, I: Invoker> Pipeline<T, P, I> {
    pub fn new(trainer: T, poller: ReadinessPoller<P>, invoker: I) -> Self {
        Self {
            trainer,
            poller,
            invoker,
        }
    }

    pub async fn run(&self) -> Result<Prediction, PipelineError> {
        tracing::info!("Step 1/3: training");
        self.trainer
            .train()
            .instrument(tracing::info_span!("train"))
            .await?;

        tracing::info!("Step 2/3: waiting for inference service");
        self.poller
            .wait()
            .instrument(tracing::info_span!("wait_ready"))
            .await?;

        tracing::info!("Step 3/3: test inference");
        let prediction = self
            .invoker
            .invoke()
            .instrument(tracing::info_span!("invoke"))
            .await?;

        tracing::info!(detections = prediction.len(), "Pipeline completed");
        Ok(prediction)
    }
}
