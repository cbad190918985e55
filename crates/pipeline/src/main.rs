use common::init_observability;
use pipeline::{HttpPipeline, PipelineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PipelineConfig::from_env()?;

    let _telemetry = init_observability(
        "pipeline",
        config.environment,
        config.otel_endpoint.as_deref(),
    )?;

    tracing::info!(
        config = ?config,
        "Loaded configuration"
    );

    let prediction = HttpPipeline::from_config(&config)?.run().await?;

    println!("Inference result: {}", serde_json::to_string(&prediction)?);
    Ok(())
}
