//! Prediction metrics and structured event logging
//!
//! Prometheus series live in the default registry and are registered once
//! per process. `PredictorMetrics` is a cheap handle onto them.

use crate::schema::ModelVariant;
use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter_vec, GaugeVec, HistogramVec,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Latency buckets in seconds; in-process inference is sub-millisecond
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
];

static GLOBAL_METRICS: OnceLock<PredictorMetricsInner> = OnceLock::new();

struct PredictorMetricsInner {
    prediction_latency_seconds: HistogramVec,
    predictions_total: IntCounterVec,
    prediction_errors_total: IntCounterVec,
    defaulted_features_total: IntCounterVec,
    model_info: GaugeVec,
}

impl PredictorMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram_vec!(
                "flight_predictor_prediction_latency_seconds",
                "Time spent materializing, transforming and scoring one request",
                &["variant"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "flight_predictor_predictions_total",
                "Successful predictions served",
                &["variant"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "flight_predictor_prediction_errors_total",
                "Failed prediction requests by error code",
                &["variant", "code"]
            )
            .expect("Failed to register prediction_errors_total"),

            defaulted_features_total: register_int_counter_vec!(
                "flight_predictor_defaulted_features_total",
                "Schema features absent from requests and zero-filled",
                &["variant"]
            )
            .expect("Failed to register defaulted_features_total"),

            model_info: register_gauge_vec!(
                "flight_predictor_model_info",
                "Loaded model per variant (value is always 1)",
                &["variant", "version", "family"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Handle to the process-wide prediction metrics
#[derive(Clone)]
pub struct PredictorMetrics {
    _private: (),
}

impl Default for PredictorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PredictorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PredictorMetricsInner {
        GLOBAL_METRICS.get_or_init(PredictorMetricsInner::new)
    }

    /// Record a successful prediction
    pub fn observe_prediction(&self, variant: ModelVariant, duration_secs: f64, defaulted: usize) {
        let label = [variant.as_str()];
        let inner = self.inner();
        inner
            .prediction_latency_seconds
            .with_label_values(&label)
            .observe(duration_secs);
        inner.predictions_total.with_label_values(&label).inc();
        inner
            .defaulted_features_total
            .with_label_values(&label)
            .inc_by(defaulted as u64);
    }

    pub fn inc_prediction_error(&self, variant: ModelVariant, code: &str) {
        self.inner()
            .prediction_errors_total
            .with_label_values(&[variant.as_str(), code])
            .inc();
    }

    pub fn predictions_total(&self, variant: ModelVariant) -> u64 {
        self.inner()
            .predictions_total
            .with_label_values(&[variant.as_str()])
            .get()
    }

    /// Publish which model serves a variant. Models are loaded once at
    /// startup, so each variant has a single series.
    pub fn set_model_info(&self, variant: ModelVariant, version: &str, family: &str) {
        self.inner()
            .model_info
            .with_label_values(&[variant.as_str(), version, family])
            .set(1.0);
    }
}

/// Structured logger for server lifecycle and request events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn log_startup(&self, version: &str, bind_address: &str) {
        info!(
            event = "server_started",
            instance = %self.instance,
            server_version = %version,
            bind_address = %bind_address,
            "Flight prediction server started"
        );
    }

    pub fn log_artifact_loaded(&self, variant: ModelVariant, model_version: &str, model_family: &str) {
        info!(
            event = "artifact_loaded",
            instance = %self.instance,
            variant = %variant,
            model_version = %model_version,
            model_family = %model_family,
            "Model pipeline ready"
        );
    }

    pub fn log_prediction(
        &self,
        variant: ModelVariant,
        model_version: &str,
        latency_secs: f64,
        defaulted_features: usize,
        unknown_attributes: usize,
    ) {
        info!(
            event = "prediction_served",
            instance = %self.instance,
            variant = %variant,
            model_version = %model_version,
            latency_secs = latency_secs,
            defaulted_features = defaulted_features,
            unknown_attributes = unknown_attributes,
            "Served prediction"
        );
    }

    pub fn log_prediction_failure(&self, variant: ModelVariant, code: &str, error: &str) {
        warn!(
            event = "prediction_failed",
            instance = %self.instance,
            variant = %variant,
            code = %code,
            error = %error,
            "Prediction request failed"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Flight prediction server shutting down"
        );
    }
}
