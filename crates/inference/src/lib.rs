pub mod backend;
pub mod config;
pub mod errors;
pub mod labels;
pub mod metrics;
pub mod model;
pub mod processing;
pub mod routes;
pub mod service;
pub mod state;

// Re-export commonly used types for convenience
pub use backend::{InferenceBackend, InferenceOutput};
pub use config::InferenceConfig;
pub use errors::ApiError;
pub use model::{DetectionModel, Detector};
pub use routes::build_router;
pub use service::InferenceService;
pub use state::AppState;
