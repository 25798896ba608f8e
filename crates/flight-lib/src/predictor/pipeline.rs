//! Per-variant serving pipeline
//!
//! request -> materialize -> transform -> model -> format

use super::features::{materialize_request, Materialized};
use super::output::OutputFormatter;
use super::transform::TransformState;
use super::{ModelFamily, Predictor};
use crate::error::PipelineError;
use crate::models::{FeatureVector, Prediction, PredictionRequest, PredictionResult};
use crate::schema::{FeatureSchema, ModelVariant, Variant};
use tracing::debug;

/// Frozen transform and model for one variant, shared by all requests
pub struct VariantPipeline<V: Variant> {
    transform: TransformState<V>,
    model: Box<dyn Predictor>,
    formatter: OutputFormatter,
    model_version: String,
}

impl<V: Variant> VariantPipeline<V> {
    pub fn new(
        transform: TransformState<V>,
        model: Box<dyn Predictor>,
        model_version: impl Into<String>,
    ) -> Result<Self, String> {
        if model.input_width() != transform.output_width() {
            return Err(format!(
                "model expects {} inputs but the transform produces {}",
                model.input_width(),
                transform.output_width()
            ));
        }
        Ok(Self {
            transform,
            model,
            formatter: OutputFormatter::new(),
            model_version: model_version.into(),
        })
    }

    pub fn variant(&self) -> ModelVariant {
        V::KIND
    }

    pub fn schema(&self) -> &'static FeatureSchema {
        V::schema()
    }

    pub fn model_family(&self) -> ModelFamily {
        self.model.family()
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn transform_state(&self) -> &TransformState<V> {
        &self.transform
    }

    /// Run a request through every stage
    pub fn run(&self, request: &PredictionRequest) -> Result<Prediction, PipelineError> {
        let Materialized { vector, report } = materialize_request::<V>(request)?;
        if !report.defaulted_features.is_empty() {
            debug!(
                variant = %V::KIND,
                defaulted = report.defaulted_features.len(),
                "Zero-filled features missing from request"
            );
        }
        let result = self.predict_vector(&vector)?;
        Ok(Prediction { result, report })
    }

    /// Transform, infer and format an already materialized vector
    pub fn predict_vector(&self, vector: &FeatureVector<V>) -> Result<PredictionResult, PipelineError> {
        let input = self.transform.transform(vector)?;
        let raw = self
            .model
            .predict(input.values())
            .map_err(|e| PipelineError::prediction(V::KIND, format!("{:#}", e)))?;
        self.formatter.format(V::KIND, raw)
    }

    /// One inference on an all-zero vector, to surface broken artifacts
    /// before traffic arrives
    pub fn warm_up(&self) -> Result<PredictionResult, PipelineError> {
        let zeros = FeatureVector::<V>::from_positional(vec![0.0; V::schema().len()])?;
        self.predict_vector(&zeros)
    }
}

impl<V: Variant> std::fmt::Debug for VariantPipeline<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantPipeline")
            .field("variant", &V::KIND)
            .field("model_family", &self.model.family())
            .field("model_version", &self.model_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DelayLabel, RequestAttributes};
    use crate::predictor::{
        LinearRegression, PolynomialSpec, RandomForestClassifier, RawOutput, ScalerParams, TreeSpec,
    };
    use crate::schema::{Delay, Price};

    struct FailingModel;

    impl Predictor for FailingModel {
        fn predict(&self, _input: &[f64]) -> anyhow::Result<RawOutput> {
            anyhow::bail!("tensor shape rejected")
        }

        fn family(&self) -> ModelFamily {
            ModelFamily::Onnx
        }

        fn input_width(&self) -> usize {
            13
        }
    }

    fn price_pipeline() -> VariantPipeline<Price> {
        let transform = TransformState::<Price>::from_params(
            Some(&ScalerParams {
                center: Some(vec![0.0; 17]),
                scale: Some(vec![1.0; 17]),
            }),
            Some(&PolynomialSpec {
                degree: 2,
                include_bias: false,
                interaction_only: false,
                powers: None,
            }),
        )
        .unwrap();
        // price = 100 + 0.5 * time
        let mut coef = vec![0.0; 170];
        coef[0] = 0.5;
        let model = LinearRegression::new(coef, 100.0).unwrap();
        VariantPipeline::new(transform, Box::new(model), "test").unwrap()
    }

    fn delay_pipeline() -> VariantPipeline<Delay> {
        // delayed when aircraft_qf402 (index 5) is set
        let tree = TreeSpec {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![5, -2, -2],
            threshold: vec![0.5, -2.0, -2.0],
            value: vec![vec![1.0, 1.0], vec![1.0, 0.0], vec![0.0, 1.0]],
        };
        let model = RandomForestClassifier::new(vec![0, 1], &[tree], 13).unwrap();
        let transform = TransformState::<Delay>::from_params(None, None).unwrap();
        VariantPipeline::new(transform, Box::new(model), "test").unwrap()
    }

    #[test]
    fn test_price_pipeline_end_to_end() {
        let request = PredictionRequest::named(
            RequestAttributes::new()
                .with("time", 480.0)
                .with("day_of_week", 2.0)
                .with("scheduled_minutes", 480.0)
                .with("airline_quantas", 1.0),
        );
        let prediction = price_pipeline().run(&request).unwrap();
        assert_eq!(
            prediction.result,
            PredictionResult::Price {
                predicted_price: 340.0
            }
        );
        assert_eq!(prediction.report.defaulted_features.len(), 13);
    }

    #[test]
    fn test_delay_pipeline_end_to_end() {
        let pipeline = delay_pipeline();
        let delayed = RequestAttributes::new()
            .with("day_of_week", 4.0)
            .with("aircraft_qf402", 1.0)
            .with("time_period_morning", 1.0);
        assert_eq!(
            pipeline.run(&PredictionRequest::named(delayed)).unwrap().result,
            PredictionResult::Delay {
                delay_prediction: DelayLabel::Delayed
            }
        );

        let on_time = RequestAttributes::new().with("day_of_week", 4.0);
        assert_eq!(
            pipeline.run(&PredictionRequest::named(on_time)).unwrap().result,
            PredictionResult::Delay {
                delay_prediction: DelayLabel::OnTime
            }
        );
    }

    #[test]
    fn test_model_width_must_match_transform() {
        let transform = TransformState::<Delay>::from_params(None, None).unwrap();
        let model = LinearRegression::new(vec![1.0; 4], 0.0).unwrap();
        assert!(VariantPipeline::new(transform, Box::new(model), "bad").is_err());
    }

    #[test]
    fn test_model_failure_is_request_error() {
        let transform = TransformState::<Delay>::from_params(None, None).unwrap();
        let pipeline = VariantPipeline::new(transform, Box::new(FailingModel), "x").unwrap();
        let err = pipeline.warm_up().unwrap_err();
        assert_eq!(err.code(), "prediction_error");
        assert!(err.to_string().contains("tensor shape rejected"));
    }

    #[test]
    fn test_warm_up_runs() {
        assert!(price_pipeline().warm_up().is_ok());
        assert!(delay_pipeline().warm_up().is_ok());
    }
}
