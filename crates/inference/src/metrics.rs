use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::time::Duration;

/// Prediction metrics, recorded through the global meter provider.
///
/// Without an OTLP endpoint the global provider is a no-op, so recording is free.
#[derive(Clone)]
pub struct PredictMetrics {
    duration: Histogram<f64>,
    requests: Counter<u64>,
    detections: Counter<u64>,
}

impl PredictMetrics {
    pub fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
        ];
        let duration = meter
            .f64_histogram("predict_duration_seconds")
            .with_description("Time to serve POST /predict (decode + preprocess + infer + postprocess)")
            .with_unit("s")
            .with_boundaries(latency_buckets.to_vec())
            .build();
        let requests = meter
            .u64_counter("predict_requests_total")
            .with_description("Total prediction requests, by outcome")
            .build();
        let detections = meter
            .u64_counter("predict_detections_total")
            .with_description("Total detections returned")
            .build();

        Self {
            duration,
            requests,
            detections,
        }
    }

    pub fn record_success(&self, elapsed: Duration, detections: usize) {
        self.duration.record(elapsed.as_secs_f64(), &[]);
        self.requests.add(1, &[KeyValue::new("outcome", "ok")]);
        self.detections.add(detections as u64, &[]);
    }

    pub fn record_failure(&self, status: u16) {
        self.requests.add(
            1,
            &[
                KeyValue::new("outcome", "error"),
                KeyValue::new("status", i64::from(status)),
            ],
        );
    }
}
