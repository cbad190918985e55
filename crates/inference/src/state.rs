use crate::{
    metrics::PredictMetrics,
    model::Detector,
    routes::{ApiDocs, route_table},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<dyn Detector>,
    pub max_upload_bytes: usize,
    pub metrics: PredictMetrics,
    /// Rendered by `/docs`, built once from the route table.
    pub docs: Arc<ApiDocs>,
}

impl AppState {
    pub fn new(detector: Arc<dyn Detector>, max_upload_bytes: usize) -> anyhow::Result<Self> {
        Ok(Self {
            detector,
            max_upload_bytes,
            metrics: PredictMetrics::new("inference"),
            docs: Arc::new(ApiDocs::from_routes(&route_table()?)),
        })
    }
}
