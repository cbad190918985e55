use common::init_observability;
use inference::{AppState, DetectionModel, InferenceConfig, InferenceService};
use std::sync::Arc;

#[cfg(feature = "ort-backend")]
use inference::backend::ort::OrtBackend as Backend;

#[cfg(not(feature = "ort-backend"))]
compile_error!("The 'ort-backend' feature must be enabled to build the inference binary");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = InferenceConfig::from_env()?;

    let _telemetry = init_observability(
        "inference",
        config.environment,
        config.otel_endpoint.as_deref(),
    )?;

    tracing::info!(
        config = ?config,
        "Loaded configuration"
    );

    // Model load failure is fatal: the service never starts without weights
    let model = DetectionModel::<Backend>::load(&config)?;
    tracing::info!(classes = model.labels().len(), "Model loaded successfully");

    let state = AppState::new(Arc::new(model), config.max_upload_bytes)?;
    InferenceService::new(config, state).run().await
}
