pub mod config;
pub mod logging;
pub mod telemetry;
#[cfg(feature = "async")]
pub mod wait;

pub use config::Environment;
pub use logging::{init_observability, setup_logging};
pub use telemetry::TelemetryGuard;
#[cfg(feature = "async")]
pub use wait::{ProbeOutcome, WaitError, WaitPolicy, wait_until_ready};
