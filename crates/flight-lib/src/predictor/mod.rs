//! Prediction pipeline: materialize, transform, infer, format

mod features;
mod inference;
mod output;
mod pipeline;
mod transform;

pub use features::{materialize, materialize_request, Materialized, DEFAULT_FEATURE_VALUE};
pub use inference::{DecisionTree, LinearRegression, OnnxPredictor, RandomForestClassifier, TreeSpec};
pub use output::{OutputFormatter, DELAYED_CLASS, PRICE_DECIMALS};
pub use pipeline::VariantPipeline;
pub use transform::{
    FittedScaler, PolynomialExpansion, PolynomialSpec, ScalerParams, TransformState,
};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Raw model output before formatting
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawOutput {
    /// Continuous regression output
    Value(f64),
    /// Class label from a classifier
    Class(i64),
}

/// Concrete model family behind a predictor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    LinearRegression,
    RandomForestClassifier,
    Onnx,
}

impl ModelFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::LinearRegression => "linear_regression",
            ModelFamily::RandomForestClassifier => "random_forest_classifier",
            ModelFamily::Onnx => "onnx",
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for trained model implementations
pub trait Predictor: Send + Sync {
    /// Run inference on a transformed vector
    fn predict(&self, input: &[f64]) -> Result<RawOutput>;

    /// Model family, for logs and metrics
    fn family(&self) -> ModelFamily;

    /// Number of inputs the model was fitted on
    fn input_width(&self) -> usize;
}
