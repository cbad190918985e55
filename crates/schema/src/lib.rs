pub mod errors;
pub mod prediction;

pub use errors::SchemaError;
pub use prediction::{BoundingBox, Detection, HealthStatus, Prediction};
