use crate::{
    backend::InferenceBackend,
    config::InferenceConfig,
    labels::LabelMap,
    processing::{post::PostProcessor, pre::PreProcessor},
};
use image::DynamicImage;
use schema::Prediction;
use std::sync::Mutex;

/// Anything that can turn a decoded image into a prediction.
///
/// Handlers hold this behind `Arc<dyn Detector>` so tests can swap in a fake.
pub trait Detector: Send + Sync {
    fn predict(&self, image: &DynamicImage) -> anyhow::Result<Prediction>;
}

/// Letterbox, run the backend, decode the head and attach labels.
pub struct DetectionModel<B: InferenceBackend> {
    backend: Mutex<B>,
    preprocessor: PreProcessor,
    postprocessor: PostProcessor,
    labels: LabelMap,
}

impl<B: InferenceBackend> DetectionModel<B> {
    pub fn new(backend: B, config: &InferenceConfig) -> Self {
        let labels = match backend.class_names() {
            Some(names) if !names.is_empty() => LabelMap::new(names),
            _ => LabelMap::coco(),
        };

        Self {
            backend: Mutex::new(backend),
            preprocessor: PreProcessor::new(config.input_size),
            postprocessor: PostProcessor::new(
                config.confidence_threshold,
                config.iou_threshold,
                config.max_detections,
            ),
            labels,
        }
    }

    /// Load the backend from `config.model_path`.
    pub fn load(config: &InferenceConfig) -> anyhow::Result<Self> {
        tracing::info!(model_path = %config.model_path, "Loading inference model");
        let backend = B::load_model(&config.model_path)?;
        Ok(Self::new(backend, config))
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }
}

impl<B: InferenceBackend> Detector for DetectionModel<B> {
    fn predict(&self, image: &DynamicImage) -> anyhow::Result<Prediction> {
        let (input, transform) = self.preprocessor.preprocess(image)?;

        let output = {
            let _s = common::span_debug!("model_inference");
            let mut backend = self
                .backend
                .lock()
                .map_err(|_| anyhow::anyhow!("Inference backend lock poisoned"))?;
            backend.infer(&input)?
        };

        let detections = self
            .postprocessor
            .parse_detections(&output.predictions.view(), &transform)?;

        Ok(Prediction::from_detections(&detections, |id| {
            self.labels.name(id)
        }))
    }
}
