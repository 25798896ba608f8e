//! HTTP API: prediction endpoints, schemas, health checks and metrics

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use flight_lib::{
    health::{components, HealthRegistry},
    observability::{PredictorMetrics, StructuredLogger},
    ModelVariant, PipelineError, PredictionRequest, PredictionResponse, ServingContext,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub const WELCOME_MESSAGE: &str = "Welcome to the Flight Prediction API!";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub context: Arc<ServingContext>,
    pub health_registry: HealthRegistry,
    pub metrics: PredictorMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        context: Arc<ServingContext>,
        health_registry: HealthRegistry,
        metrics: PredictorMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            context,
            health_registry,
            metrics,
            logger,
        }
    }
}

/// JSON failure body: `{"error": ..., "code": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_request",
            message: message.into(),
        }
    }

    fn unknown_variant(name: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "unknown_variant",
            message: format!("unknown model variant '{}', expected price or delay", name),
        }
    }

    fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code,
            message: message.into(),
        }
    }
}

impl From<&PipelineError> for ApiError {
    fn from(err: &PipelineError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.message, "code": self.code });
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictParams {
    /// Attach the zero-fill report to the response
    #[serde(default)]
    pub strict: bool,
}

async fn root() -> impl IntoResponse {
    Json(json!({ "message": WELCOME_MESSAGE }))
}

async fn predict_price(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PredictParams>, QueryRejection>,
    body: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    predict(&state, ModelVariant::Price, params, body).await
}

async fn predict_delay(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PredictParams>, QueryRejection>,
    body: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    predict(&state, ModelVariant::Delay, params, body).await
}

async fn predict(
    state: &AppState,
    variant: ModelVariant,
    params: Result<Query<PredictParams>, QueryRejection>,
    body: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let extracted = params
        .map_err(|e| e.body_text())
        .and_then(|Query(params)| body.map(|Json(request)| (params, request)).map_err(|e| e.body_text()));
    let (params, request) = match extracted {
        Ok(parts) => parts,
        Err(message) => {
            let err = ApiError::invalid_request(message);
            state.metrics.inc_prediction_error(variant, err.code);
            state
                .logger
                .log_prediction_failure(variant, err.code, &err.message);
            return Err(err);
        }
    };

    let component = components::for_variant(variant);
    let started = Instant::now();
    match state.context.predict(variant, &request) {
        Ok(prediction) => {
            let elapsed = started.elapsed().as_secs_f64();
            let report = &prediction.report;
            state
                .metrics
                .observe_prediction(variant, elapsed, report.defaulted_features.len());
            state.logger.log_prediction(
                variant,
                model_version(&state.context, variant),
                elapsed,
                report.defaulted_features.len(),
                report.unknown_attributes.len(),
            );
            state.health_registry.record_success(component).await;
            Ok(Json(PredictionResponse::from_prediction(prediction, params.strict)))
        }
        Err(err) => {
            state.metrics.inc_prediction_error(variant, err.code());
            state
                .logger
                .log_prediction_failure(variant, err.code(), &err.to_string());
            if matches!(err, PipelineError::Prediction { .. }) {
                state
                    .health_registry
                    .record_failure(component, err.to_string())
                    .await;
            }
            Err(ApiError::from(&err))
        }
    }
}

fn model_version(context: &ServingContext, variant: ModelVariant) -> &str {
    match variant {
        ModelVariant::Price => context.price().model_version(),
        ModelVariant::Delay => context.delay().model_version(),
    }
}

async fn schema(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let variant: ModelVariant = name.parse().map_err(|_| ApiError::unknown_variant(&name))?;
    Ok(Json(state.context.model_info(variant)))
}

/// 200 while operational (healthy or degraded), 503 otherwise
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = if health.status.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

/// Prometheus text exposition
async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ApiError::internal("metrics_error", e.to_string()))?;

    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    ))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/predict_price", post(predict_price))
        .route("/predict_price/", post(predict_price))
        .route("/predict_delay", post(predict_delay))
        .route("/predict_delay/", post(predict_delay))
        .route("/schema/:variant", get(schema))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
