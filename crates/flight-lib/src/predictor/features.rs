//! Input materialization
//!
//! Turns a sparse set of named attributes into the dense, schema-ordered
//! vector the transform and model were fitted on. Absent features are
//! zero-filled and unknown attributes are ignored; both are recorded in the
//! returned report so the silent defaults stay observable.

use crate::error::PipelineError;
use crate::models::{
    FeatureVector, InputData, MaterializeReport, PredictionRequest, RequestAttributes, WrappedInput,
};
use crate::schema::Variant;
use tracing::debug;

/// Value substituted for schema features the request does not mention
pub const DEFAULT_FEATURE_VALUE: f64 = 0.0;

/// A materialized vector together with its zero-fill report
#[derive(Debug, Clone, PartialEq)]
pub struct Materialized<V: Variant> {
    pub vector: FeatureVector<V>,
    pub report: MaterializeReport,
}

/// Build the schema-ordered vector for `V` from named attributes.
///
/// The output always has exactly `V::schema().len()` entries.
pub fn materialize<V: Variant>(attributes: &RequestAttributes) -> Materialized<V> {
    let schema = V::schema();
    let mut values = Vec::with_capacity(schema.len());
    let mut defaulted = Vec::new();

    for name in schema.iter() {
        match attributes.get(name) {
            Some(value) => values.push(value),
            None => {
                values.push(DEFAULT_FEATURE_VALUE);
                defaulted.push(name.to_string());
            }
        }
    }

    let mut unknown: Vec<String> = attributes
        .keys()
        .filter(|k| !schema.contains(k))
        .map(str::to_string)
        .collect();
    unknown.sort();

    if !unknown.is_empty() {
        debug!(
            variant = %V::KIND,
            unknown = ?unknown,
            "Ignoring attributes not present in schema"
        );
    }

    Materialized {
        vector: FeatureVector::new_unchecked(values),
        report: MaterializeReport {
            defaulted_features: defaulted,
            unknown_attributes: unknown,
        },
    }
}

/// Materialize any accepted request shape.
///
/// Positional input is taken as already ordered and must match the schema
/// width exactly; it never reports defaults.
pub fn materialize_request<V: Variant>(
    request: &PredictionRequest,
) -> Result<Materialized<V>, PipelineError> {
    request.validate()?;
    match request {
        PredictionRequest::Flat(attributes)
        | PredictionRequest::Wrapped(WrappedInput {
            input_data: InputData::Named(attributes),
        }) => Ok(materialize::<V>(attributes)),
        PredictionRequest::Wrapped(WrappedInput {
            input_data: InputData::Positional(values),
        }) => Ok(Materialized {
            vector: FeatureVector::from_positional(values.clone())?,
            report: MaterializeReport::default(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Delay, Price};

    fn delay_attrs() -> RequestAttributes {
        RequestAttributes::new()
            .with("day_of_week", 4.0)
            .with("aircraft_qf402", 1.0)
            .with("time_period_morning", 1.0)
    }

    #[test]
    fn test_values_land_in_schema_order() {
        let m = materialize::<Delay>(&delay_attrs());
        assert_eq!(m.vector.len(), 13);
        assert_eq!(m.vector.values()[0], 4.0);
        assert_eq!(m.vector.get("aircraft_qf402"), Some(1.0));
        assert_eq!(m.vector.get("time_period_morning"), Some(1.0));
        assert_eq!(m.vector.get("time_period_evening"), Some(0.0));
        assert_eq!(m.vector.values().iter().filter(|v| **v != 0.0).count(), 3);
    }

    #[test]
    fn test_missing_features_reported() {
        let m = materialize::<Delay>(&delay_attrs());
        assert_eq!(m.report.defaulted_features.len(), 10);
        assert!(m.report.defaulted_features.contains(&"aircraft_jq503".to_string()));
        assert!(!m.report.defaulted_features.contains(&"day_of_week".to_string()));
        assert!(m.report.unknown_attributes.is_empty());
    }

    #[test]
    fn test_unknown_keys_ignored_and_reported() {
        let attrs = delay_attrs()
            .with("airline_quantas", 1.0)
            .with("aircraft_qf4O2", 1.0);
        let m = materialize::<Delay>(&attrs);
        assert_eq!(m.vector, materialize::<Delay>(&delay_attrs()).vector);
        assert_eq!(
            m.report.unknown_attributes,
            vec!["aircraft_qf4O2".to_string(), "airline_quantas".to_string()]
        );
    }

    #[test]
    fn test_empty_attributes_all_zero() {
        let m = materialize::<Price>(&RequestAttributes::new());
        assert_eq!(m.vector.len(), 17);
        assert!(m.vector.values().iter().all(|v| *v == 0.0));
        assert_eq!(m.report.defaulted_features.len(), 17);
    }

    #[test]
    fn test_positional_request() {
        let values: Vec<f64> = (0..13).map(f64::from).collect();
        let m = materialize_request::<Delay>(&PredictionRequest::positional(values.clone())).unwrap();
        assert_eq!(m.vector.values(), values.as_slice());
        assert!(m.report.is_clean());

        let err = materialize_request::<Price>(&PredictionRequest::positional(values)).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_wrapped_named_request_matches_flat() {
        let flat = materialize_request::<Delay>(&PredictionRequest::named(delay_attrs())).unwrap();
        let wrapped = materialize_request::<Delay>(&PredictionRequest::wrapped(delay_attrs())).unwrap();
        assert_eq!(flat, wrapped);
    }
}
