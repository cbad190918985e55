use common::config::{env_opt, env_or, env_parse};

pub use common::Environment;

pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub environment: Environment,
    pub model_path: String,
    pub bind_addr: String,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub max_upload_bytes: usize,
    pub otel_endpoint: Option<String>,
}

impl InferenceConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            environment: Environment::from_env(),
            model_path: env_or("MODEL_PATH", "weights/best.onnx"),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8000"),
            input_size: env_parse("INPUT_SIZE", DEFAULT_INPUT_SIZE),
            confidence_threshold: env_parse("CONFIDENCE_THRESHOLD", 0.25),
            iou_threshold: env_parse("IOU_THRESHOLD", 0.7),
            max_detections: env_parse("MAX_DETECTIONS", 300),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            otel_endpoint: env_opt("OTEL_EXPORTER_OTLP_ENDPOINT"),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.input_size == 0 || self.input_size % 32 != 0 {
            anyhow::bail!(
                "INPUT_SIZE must be a positive multiple of 32, got {}",
                self.input_size
            );
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            anyhow::bail!(
                "CONFIDENCE_THRESHOLD must be within [0, 1], got {}",
                self.confidence_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            anyhow::bail!(
                "IOU_THRESHOLD must be within [0, 1], got {}",
                self.iou_threshold
            );
        }
        if self.max_detections == 0 {
            anyhow::bail!("MAX_DETECTIONS must be at least 1");
        }
        Ok(())
    }

    /// Create default configuration for testing
    #[cfg(test)]
    pub fn test_default() -> Self {
        Self {
            environment: Environment::Development,
            model_path: "weights/best.onnx".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            otel_endpoint: None,
        }
    }
}
