//! Core data models for the prediction service

use crate::error::PipelineError;
use crate::schema::{ModelVariant, Variant};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;

/// Named numeric attributes as supplied by a caller.
///
/// May omit any schema feature and may carry keys no schema knows about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestAttributes(HashMap<String, f64>);

impl RequestAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for RequestAttributes {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<HashMap<String, f64>> for RequestAttributes {
    fn from(map: HashMap<String, f64>) -> Self {
        Self(map)
    }
}

/// Body of a prediction request.
///
/// Accepts a flat attribute object, or an `input_data` wrapper holding either
/// an attribute object or a dense positional array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionRequest {
    Wrapped(WrappedInput),
    Flat(RequestAttributes),
}

/// The `input_data` wrapper. Sibling keys would otherwise be dropped without
/// ever reaching the materialize report, so a wrapper carrying them is
/// rejected as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WrappedInput {
    pub input_data: InputData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputData {
    Positional(Vec<f64>),
    Named(RequestAttributes),
}

impl PredictionRequest {
    pub fn named(attributes: RequestAttributes) -> Self {
        PredictionRequest::Flat(attributes)
    }

    pub fn positional(values: Vec<f64>) -> Self {
        PredictionRequest::Wrapped(WrappedInput {
            input_data: InputData::Positional(values),
        })
    }

    pub fn wrapped(attributes: RequestAttributes) -> Self {
        PredictionRequest::Wrapped(WrappedInput {
            input_data: InputData::Named(attributes),
        })
    }

    /// Reject values no model can consume. JSON cannot carry NaN or
    /// infinities, but programmatic callers can.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let bad = match self {
            PredictionRequest::Flat(attrs)
            | PredictionRequest::Wrapped(WrappedInput {
                input_data: InputData::Named(attrs),
            }) => attrs
                .iter()
                .find(|(_, v)| !v.is_finite())
                .map(|(k, _)| k.to_string()),
            PredictionRequest::Wrapped(WrappedInput {
                input_data: InputData::Positional(values),
            }) => values
                .iter()
                .position(|v| !v.is_finite())
                .map(|i| format!("input_data[{}]", i)),
        };
        match bad {
            Some(name) => Err(PipelineError::InvalidRequest(format!(
                "value for '{}' is not a finite number",
                name
            ))),
            None => Ok(()),
        }
    }
}

impl From<RequestAttributes> for PredictionRequest {
    fn from(attributes: RequestAttributes) -> Self {
        PredictionRequest::named(attributes)
    }
}

/// Dense feature vector positionally aligned to the schema of `V`
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector<V: Variant> {
    values: Vec<f64>,
    _variant: PhantomData<V>,
}

impl<V: Variant> FeatureVector<V> {
    /// Wrap already-ordered values. Width must match the schema.
    pub fn from_positional(values: Vec<f64>) -> Result<Self, PipelineError> {
        let expected = V::schema().len();
        if values.len() != expected {
            return Err(PipelineError::InvalidRequest(format!(
                "{} input_data must have {} values, got {}",
                V::KIND,
                expected,
                values.len()
            )));
        }
        Ok(Self::new_unchecked(values))
    }

    pub(crate) fn new_unchecked(values: Vec<f64>) -> Self {
        Self {
            values,
            _variant: PhantomData,
        }
    }

    pub fn variant(&self) -> ModelVariant {
        V::KIND
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a named schema feature
    pub fn get(&self, name: &str) -> Option<f64> {
        V::schema().position(name).map(|i| self.values[i])
    }
}

/// Transformed vector ready for the model of `V`.
///
/// Only the transform pipeline produces these, so a model never sees an
/// unscaled or unexpanded vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput<V: Variant> {
    values: Vec<f64>,
    _variant: PhantomData<V>,
}

impl<V: Variant> ModelInput<V> {
    pub(crate) fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            _variant: PhantomData,
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Which features were zero-filled and which attributes were ignored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializeReport {
    pub defaulted_features: Vec<String>,
    pub unknown_attributes: Vec<String>,
}

impl MaterializeReport {
    pub fn is_clean(&self) -> bool {
        self.defaulted_features.is_empty() && self.unknown_attributes.is_empty()
    }
}

/// Human-readable delay outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayLabel {
    #[serde(rename = "Delayed")]
    Delayed,
    #[serde(rename = "On time")]
    OnTime,
}

impl DelayLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DelayLabel::Delayed => "Delayed",
            DelayLabel::OnTime => "On time",
        }
    }
}

impl std::fmt::Display for DelayLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionResult {
    Price { predicted_price: f64 },
    Delay { delay_prediction: DelayLabel },
}

impl PredictionResult {
    pub fn variant(&self) -> ModelVariant {
        match self {
            PredictionResult::Price { .. } => ModelVariant::Price,
            PredictionResult::Delay { .. } => ModelVariant::Delay,
        }
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub result: PredictionResult,
    pub report: MaterializeReport,
}

/// Response body returned by the prediction endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(flatten)]
    pub result: PredictionResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<MaterializeReport>,
}

impl PredictionResponse {
    pub fn from_prediction(prediction: Prediction, strict: bool) -> Self {
        Self {
            result: prediction.result,
            diagnostics: strict.then_some(prediction.report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Delay, Price};

    #[test]
    fn test_flat_request_parses() {
        let req: PredictionRequest =
            serde_json::from_str(r#"{"time": 480, "day_of_week": 2}"#).unwrap();
        match req {
            PredictionRequest::Flat(attrs) => {
                assert_eq!(attrs.get("time"), Some(480.0));
                assert_eq!(attrs.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_wrapped_requests_parse() {
        let req: PredictionRequest =
            serde_json::from_str(r#"{"input_data": {"day_of_week": 4}}"#).unwrap();
        assert_eq!(
            req,
            PredictionRequest::wrapped(RequestAttributes::new().with("day_of_week", 4.0))
        );

        let req: PredictionRequest =
            serde_json::from_str(r#"{"input_data": [1, 2.5, 3]}"#).unwrap();
        assert_eq!(req, PredictionRequest::positional(vec![1.0, 2.5, 3.0]));
    }

    #[test]
    fn test_wrapper_with_sibling_keys_rejected() {
        let body = r#"{"input_data": {"time": 100}, "day_of_week": 2, "airline_quantas": 1}"#;
        assert!(serde_json::from_str::<PredictionRequest>(body).is_err());

        let body = r#"{"input_data": [1, 2], "time": 100}"#;
        assert!(serde_json::from_str::<PredictionRequest>(body).is_err());
    }

    #[test]
    fn test_non_numeric_attribute_rejected() {
        assert!(serde_json::from_str::<PredictionRequest>(r#"{"time": "eight"}"#).is_err());
        assert!(serde_json::from_str::<PredictionRequest>(r#"{"airline_quantas": true}"#).is_err());
        assert!(serde_json::from_str::<PredictionRequest>(r#"[1, 2]"#).is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        let req = PredictionRequest::named(RequestAttributes::new().with("time", f64::NAN));
        assert!(req.validate().is_err());

        let req = PredictionRequest::positional(vec![1.0, f64::INFINITY]);
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("input_data[1]"));

        let req = PredictionRequest::named(RequestAttributes::new().with("time", 480.0));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_positional_width_checked() {
        assert!(FeatureVector::<Delay>::from_positional(vec![0.0; 13]).is_ok());
        let err = FeatureVector::<Price>::from_positional(vec![0.0; 13]).unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn test_response_serialization() {
        let response = PredictionResponse {
            result: PredictionResult::Price {
                predicted_price: 123.45,
            },
            diagnostics: None,
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({"predicted_price": 123.45})
        );

        let response = PredictionResponse {
            result: PredictionResult::Delay {
                delay_prediction: DelayLabel::OnTime,
            },
            diagnostics: Some(MaterializeReport {
                defaulted_features: vec!["day_of_week".into()],
                unknown_attributes: vec![],
            }),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["delay_prediction"], "On time");
        assert_eq!(json["diagnostics"]["defaulted_features"][0], "day_of_week");

        let back: PredictionResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, response);
    }
}
