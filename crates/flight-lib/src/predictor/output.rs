//! Prediction output formatting
//!
//! Maps raw model outputs to the user-facing result shape.

use super::RawOutput;
use crate::error::PipelineError;
use crate::models::{DelayLabel, PredictionResult};
use crate::schema::ModelVariant;

/// Decimal places kept on predicted prices
pub const PRICE_DECIMALS: i32 = 2;

/// Classifier label meaning "delayed by 15 minutes or more"
pub const DELAYED_CLASS: i64 = 1;

/// Formats raw model outputs into a PredictionResult
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter;

impl OutputFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format(&self, variant: ModelVariant, raw: RawOutput) -> Result<PredictionResult, PipelineError> {
        match variant {
            ModelVariant::Price => self.format_price(raw),
            ModelVariant::Delay => self.format_delay(raw),
        }
    }

    /// Round to cents. No clamping: a negative regression output is returned as is.
    pub fn format_price(&self, raw: RawOutput) -> Result<PredictionResult, PipelineError> {
        let value = match raw {
            RawOutput::Value(v) => v,
            RawOutput::Class(c) => {
                return Err(PipelineError::prediction(
                    ModelVariant::Price,
                    format!("expected a continuous output, model returned class {}", c),
                ))
            }
        };
        if !value.is_finite() {
            return Err(PipelineError::prediction(
                ModelVariant::Price,
                format!("model returned non-finite value {}", value),
            ));
        }
        Ok(PredictionResult::Price {
            predicted_price: round_to(value, PRICE_DECIMALS),
        })
    }

    pub fn format_delay(&self, raw: RawOutput) -> Result<PredictionResult, PipelineError> {
        let class = match raw {
            RawOutput::Class(c) => c,
            // Some ONNX exports emit labels as floats
            RawOutput::Value(v) if v.is_finite() && v.fract() == 0.0 => v as i64,
            RawOutput::Value(v) => {
                return Err(PipelineError::prediction(
                    ModelVariant::Delay,
                    format!("expected a class label, model returned {}", v),
                ))
            }
        };
        let label = if class == DELAYED_CLASS {
            DelayLabel::Delayed
        } else {
            DelayLabel::OnTime
        };
        Ok(PredictionResult::Delay {
            delay_prediction: label,
        })
    }
}

/// Values too large to scale without overflow carry no fractional digits
/// and are returned unchanged.
fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}
