use crate::config::Environment;
use crate::telemetry::TelemetryGuard;
use tracing::Subscriber;
use tracing_subscriber::{Layer, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt};

/// Initialize tracing subscriber with pretty formatting for development
/// and JSON formatting for production.
///
/// Uses RUST_LOG environment variable for filtering (defaults to "info" if not set).
///
/// Also adds an OpenTelemetry layer that exports traces if a global tracer provider
/// has been initialized (e.g. via common::telemetry::TelemetryGuard).
pub fn setup_logging(environment: Environment) {
    let otel_layer = tracing_opentelemetry::layer();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(otel_layer)
        .with(fmt_layer(environment))
        .init();
}

/// Set up logging for a binary, exporting to an OTLP collector when `otel_endpoint` is set.
///
/// The returned guard must be held for the lifetime of the process so buffered
/// spans and metrics are flushed on exit.
pub fn init_observability(
    service_name: &str,
    environment: Environment,
    otel_endpoint: Option<&str>,
) -> anyhow::Result<Option<TelemetryGuard>> {
    match otel_endpoint {
        Some(endpoint) => Ok(Some(TelemetryGuard::init(
            service_name,
            endpoint,
            environment,
        )?)),
        None => {
            setup_logging(environment);
            Ok(None)
        }
    }
}

pub(crate) fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

pub(crate) fn fmt_layer<S>(environment: Environment) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match environment {
        Environment::Production => tracing_subscriber::fmt::layer()
            .json()
            .with_level(true)
            .boxed(),
        Environment::Development => tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(true)
            .boxed(),
    }
}
