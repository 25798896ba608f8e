//! Error types for artifact loading and request handling

use crate::schema::ModelVariant;
use std::path::PathBuf;
use thiserror::Error;

/// Startup errors raised while loading trained artifacts.
///
/// Any of these aborts startup: the server never binds its listener with a
/// partially loaded context.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read artifact {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {} is not a valid model document", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("checksum mismatch for {}: manifest {expected}, file {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("checksum verification required but {} is not listed in the manifest", path.display())]
    Unverified { path: PathBuf },

    #[error("artifact {} was trained for the {found} model, expected {expected}", path.display())]
    VariantMismatch {
        path: PathBuf,
        expected: ModelVariant,
        found: ModelVariant,
    },

    #[error("{variant} artifact feature names disagree with the schema registry: {detail}")]
    SchemaDrift { variant: ModelVariant, detail: String },

    #[error("invalid {variant} transform: {detail}")]
    InvalidTransform { variant: ModelVariant, detail: String },

    #[error("invalid {variant} model: {detail}")]
    InvalidModel { variant: ModelVariant, detail: String },

    #[error("failed to load ONNX model {}: {message}", path.display())]
    Onnx { path: PathBuf, message: String },

    #[error("{variant} model failed warm-up inference: {source}")]
    WarmUp {
        variant: ModelVariant,
        #[source]
        source: PipelineError,
    },
}

/// Request-scoped failures. None of these affect other in-flight requests.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{variant} {stage} has not been fitted")]
    TransformNotFitted {
        variant: ModelVariant,
        stage: &'static str,
    },

    #[error("{stage} expects {expected} features, got {actual}")]
    WidthMismatch {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{variant} prediction failed: {message}")]
    Prediction {
        variant: ModelVariant,
        message: String,
    },
}

impl PipelineError {
    pub fn prediction(variant: ModelVariant, message: impl Into<String>) -> Self {
        PipelineError::Prediction {
            variant,
            message: message.into(),
        }
    }

    /// Stable code for error bodies and metric labels
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "invalid_request",
            PipelineError::TransformNotFitted { .. } | PipelineError::WidthMismatch { .. } => {
                "transform_error"
            }
            PipelineError::Prediction { .. } => "prediction_error",
        }
    }

    /// Whether the caller sent something the pipeline cannot accept
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::InvalidRequest(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PipelineError::InvalidRequest("x".into()).code(), "invalid_request");
        assert_eq!(
            PipelineError::WidthMismatch {
                stage: "scaler",
                expected: 17,
                actual: 13
            }
            .code(),
            "transform_error"
        );
        assert_eq!(
            PipelineError::prediction(ModelVariant::Delay, "boom").code(),
            "prediction_error"
        );
    }

    #[test]
    fn test_error_messages() {
        let err = PipelineError::TransformNotFitted {
            variant: ModelVariant::Price,
            stage: "scaler",
        };
        assert_eq!(err.to_string(), "price scaler has not been fitted");
        assert!(!err.is_client_error());

        let err = ArtifactError::Missing {
            path: PathBuf::from("ml_models/price_model.json"),
        };
        assert_eq!(err.to_string(), "artifact not found: ml_models/price_model.json");
    }
}
