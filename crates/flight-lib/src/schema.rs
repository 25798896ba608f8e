//! Feature schema registry
//!
//! Holds the ordered feature names each model was fitted on. The order is the
//! positional contract shared by the materializer, the transform and the model:
//! passthrough numeric columns first, then the one-hot blocks in training
//! column order with the first (baseline) category of each block dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Feature columns of the price model, in fit order
pub const PRICE_FEATURES: &[&str] = &[
    "time",
    "day_of_week",
    "scheduled_minutes",
    "airline_quantas",
    "airline_virgin_australia",
    "aircraft_jq503",
    "aircraft_jq507",
    "aircraft_jq515",
    "aircraft_qf400",
    "aircraft_qf402",
    "aircraft_qf408",
    "aircraft_qf416",
    "aircraft_va813",
    "aircraft_va819",
    "aircraft_va833",
    "time_period_evening",
    "time_period_morning",
];

/// Feature columns of the delay model, in fit order
pub const DELAY_FEATURES: &[&str] = &[
    "day_of_week",
    "aircraft_jq503",
    "aircraft_jq507",
    "aircraft_jq515",
    "aircraft_qf400",
    "aircraft_qf402",
    "aircraft_qf408",
    "aircraft_qf416",
    "aircraft_va813",
    "aircraft_va819",
    "aircraft_va833",
    "time_period_evening",
    "time_period_morning",
];

static PRICE_SCHEMA: FeatureSchema = FeatureSchema {
    variant: ModelVariant::Price,
    names: PRICE_FEATURES,
};

static DELAY_SCHEMA: FeatureSchema = FeatureSchema {
    variant: ModelVariant::Delay,
    names: DELAY_FEATURES,
};

/// The two served models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    Price,
    Delay,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 2] = [ModelVariant::Price, ModelVariant::Delay];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Price => "price",
            ModelVariant::Delay => "delay",
        }
    }

    pub fn schema(&self) -> &'static FeatureSchema {
        schema_for(*self)
    }

    /// Whether the fitted scaler must be present for this variant
    pub fn requires_scaling(&self) -> bool {
        matches!(self, ModelVariant::Price)
    }

    /// Whether this variant runs the polynomial expansion after scaling
    pub fn uses_polynomial_expansion(&self) -> bool {
        matches!(self, ModelVariant::Price)
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "price" => Ok(ModelVariant::Price),
            "delay" => Ok(ModelVariant::Delay),
            other => Err(format!("unknown model variant '{}'", other)),
        }
    }
}

/// Immutable ordered feature names for one model variant
#[derive(Debug, PartialEq, Eq)]
pub struct FeatureSchema {
    variant: ModelVariant,
    names: &'static [&'static str],
}

impl FeatureSchema {
    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn names(&self) -> &'static [&'static str] {
        self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| *n == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.names.iter().copied()
    }

    /// Compare against the feature names recorded in a training artifact.
    ///
    /// Returns a description of the first disagreement, if any.
    pub fn diff(&self, fitted: &[String]) -> Option<String> {
        if fitted.len() != self.names.len() {
            return Some(format!(
                "artifact has {} features, registry has {}",
                fitted.len(),
                self.names.len()
            ));
        }
        self.names
            .iter()
            .zip(fitted)
            .enumerate()
            .find(|(_, (expected, actual))| **expected != actual.as_str())
            .map(|(i, (expected, actual))| {
                format!("position {}: expected '{}', artifact has '{}'", i, expected, actual)
            })
    }
}

/// Registry lookup
pub fn schema_for(variant: ModelVariant) -> &'static FeatureSchema {
    match variant {
        ModelVariant::Price => &PRICE_SCHEMA,
        ModelVariant::Delay => &DELAY_SCHEMA,
    }
}

/// Compile-time tag tying vectors and pipelines to one model variant
pub trait Variant: fmt::Debug + Clone + Copy + Send + Sync + 'static {
    const KIND: ModelVariant;

    fn schema() -> &'static FeatureSchema {
        schema_for(Self::KIND)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Price;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delay;

impl Variant for Price {
    const KIND: ModelVariant = ModelVariant::Price;
}

impl Variant for Delay {
    const KIND: ModelVariant = ModelVariant::Delay;
}
