//! Frozen feature transforms
//!
//! Scaling and polynomial expansion parameters are statistics of the training
//! set. They are loaded once from the artifact and applied unchanged to every
//! request; nothing here refits.

use crate::error::PipelineError;
use crate::models::{FeatureVector, ModelInput};
use crate::schema::Variant;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Serialized scaler statistics (scikit-learn `center_` / `scale_`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    #[serde(default)]
    pub center: Option<Vec<f64>>,
    #[serde(default)]
    pub scale: Option<Vec<f64>>,
}

/// Serialized polynomial expansion (scikit-learn `PolynomialFeatures`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialSpec {
    pub degree: u32,
    #[serde(default)]
    pub include_bias: bool,
    #[serde(default)]
    pub interaction_only: bool,
    /// Exponent matrix (`powers_`), one row per output term. Generated in
    /// scikit-learn order when absent.
    #[serde(default)]
    pub powers: Option<Vec<Vec<u32>>>,
}

/// Fitted center/scale normalization
#[derive(Debug, Clone, PartialEq)]
pub struct FittedScaler {
    center: Option<Vec<f64>>,
    scale: Option<Vec<f64>>,
    width: usize,
}

impl FittedScaler {
    pub fn from_params(params: &ScalerParams, width: usize) -> Result<Self, String> {
        if params.center.is_none() && params.scale.is_none() {
            return Err("scaler has neither center nor scale".to_string());
        }
        for (name, stats) in [("center", &params.center), ("scale", &params.scale)] {
            if let Some(stats) = stats {
                if stats.len() != width {
                    return Err(format!(
                        "scaler {} has {} entries, schema has {}",
                        name,
                        stats.len(),
                        width
                    ));
                }
                if stats.iter().any(|v| !v.is_finite()) {
                    return Err(format!("scaler {} contains non-finite values", name));
                }
            }
        }
        // Constant training columns have a zero scale; leave them unscaled.
        let scale = params
            .scale
            .as_ref()
            .map(|s| s.iter().map(|v| if *v == 0.0 { 1.0 } else { *v }).collect());
        Ok(Self {
            center: params.center.clone(),
            scale,
            width,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn apply(&self, values: &[f64]) -> Result<Vec<f64>, PipelineError> {
        if values.len() != self.width {
            return Err(PipelineError::WidthMismatch {
                stage: "scaler",
                expected: self.width,
                actual: values.len(),
            });
        }
        Ok(values
            .iter()
            .enumerate()
            .map(|(i, x)| {
                let centered = match &self.center {
                    Some(center) => x - center[i],
                    None => *x,
                };
                match &self.scale {
                    Some(scale) => centered / scale[i],
                    None => centered,
                }
            })
            .collect())
    }
}

/// Fitted polynomial expansion with a fixed term order
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialExpansion {
    n_input: usize,
    degree: u32,
    /// Sparse exponents per output term: (feature index, power)
    terms: Vec<Vec<(usize, u32)>>,
}

impl PolynomialExpansion {
    /// Generate terms in scikit-learn order: optional bias, then each degree
    /// ascending, combinations in lexicographic order.
    pub fn fit(n_input: usize, degree: u32, include_bias: bool, interaction_only: bool) -> Self {
        let mut combos = Vec::new();
        let start = if include_bias { 0 } else { 1 };
        for d in start..=degree as usize {
            let mut current = Vec::with_capacity(d);
            push_combinations(n_input, d, 0, !interaction_only, &mut current, &mut combos);
        }
        let terms = combos
            .into_iter()
            .map(|combo| {
                let mut term: Vec<(usize, u32)> = Vec::new();
                for i in combo {
                    match term.last_mut() {
                        Some((last, power)) if *last == i => *power += 1,
                        _ => term.push((i, 1)),
                    }
                }
                term
            })
            .collect();
        Self {
            n_input,
            degree,
            terms,
        }
    }

    pub fn from_spec(spec: &PolynomialSpec, n_input: usize) -> Result<Self, String> {
        if spec.degree == 0 {
            return Err("polynomial degree must be at least 1".to_string());
        }
        let Some(powers) = &spec.powers else {
            return Ok(Self::fit(n_input, spec.degree, spec.include_bias, spec.interaction_only));
        };
        if powers.is_empty() {
            return Err("polynomial powers matrix is empty".to_string());
        }
        let mut terms = Vec::with_capacity(powers.len());
        for (row_idx, row) in powers.iter().enumerate() {
            if row.len() != n_input {
                return Err(format!(
                    "powers row {} has {} columns, schema has {}",
                    row_idx,
                    row.len(),
                    n_input
                ));
            }
            let total: u32 = row.iter().sum();
            if total > spec.degree {
                return Err(format!(
                    "powers row {} has degree {}, fitted degree is {}",
                    row_idx, total, spec.degree
                ));
            }
            if spec.interaction_only && row.iter().any(|p| *p > 1) {
                return Err(format!("powers row {} repeats a feature in interaction-only mode", row_idx));
            }
            terms.push(
                row.iter()
                    .enumerate()
                    .filter(|(_, p)| **p > 0)
                    .map(|(i, p)| (i, *p))
                    .collect(),
            );
        }
        Ok(Self {
            n_input,
            degree: spec.degree,
            terms,
        })
    }

    pub fn degree(&self) -> u32 {
        self.degree
    }

    pub fn input_width(&self) -> usize {
        self.n_input
    }

    pub fn output_width(&self) -> usize {
        self.terms.len()
    }

    pub fn apply(&self, values: &[f64]) -> Result<Vec<f64>, PipelineError> {
        if values.len() != self.n_input {
            return Err(PipelineError::WidthMismatch {
                stage: "polynomial expansion",
                expected: self.n_input,
                actual: values.len(),
            });
        }
        Ok(self
            .terms
            .iter()
            .map(|term| term.iter().map(|&(i, p)| values[i].powi(p as i32)).product())
            .collect())
    }
}

fn push_combinations(
    n: usize,
    k: usize,
    start: usize,
    with_replacement: bool,
    current: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    if current.len() == k {
        out.push(current.clone());
        return;
    }
    for i in start..n {
        current.push(i);
        let next = if with_replacement { i } else { i + 1 };
        push_combinations(n, k, next, with_replacement, current, out);
        current.pop();
    }
}

/// Frozen transform parameters for one model variant
#[derive(Debug, Clone, PartialEq)]
pub struct TransformState<V: Variant> {
    scaler: Option<FittedScaler>,
    expansion: Option<PolynomialExpansion>,
    _variant: PhantomData<V>,
}

impl<V: Variant> TransformState<V> {
    /// Build from artifact parameters, enforcing what `V` requires
    pub fn from_params(
        scaler: Option<&ScalerParams>,
        polynomial: Option<&PolynomialSpec>,
    ) -> Result<Self, String> {
        let width = V::schema().len();
        let scaler = scaler
            .map(|params| FittedScaler::from_params(params, width))
            .transpose()?;
        let expansion = polynomial
            .map(|spec| PolynomialExpansion::from_spec(spec, width))
            .transpose()?;

        if V::KIND.requires_scaling() && scaler.is_none() {
            return Err("artifact carries no fitted scaler".to_string());
        }
        match (V::KIND.uses_polynomial_expansion(), &expansion) {
            (true, None) => return Err("artifact carries no fitted polynomial expansion".to_string()),
            (false, Some(_)) => {
                return Err(format!("{} model does not use a polynomial expansion", V::KIND))
            }
            _ => {}
        }

        Ok(Self {
            scaler,
            expansion,
            _variant: PhantomData,
        })
    }

    /// A state with nothing fitted. Transforming with it fails for variants
    /// that require fitted stages.
    pub fn unfitted() -> Self {
        Self {
            scaler: None,
            expansion: None,
            _variant: PhantomData,
        }
    }

    pub fn scaler(&self) -> Option<&FittedScaler> {
        self.scaler.as_ref()
    }

    pub fn expansion(&self) -> Option<&PolynomialExpansion> {
        self.expansion.as_ref()
    }

    /// Width of the vectors handed to the model
    pub fn output_width(&self) -> usize {
        self.expansion
            .as_ref()
            .map(PolynomialExpansion::output_width)
            .unwrap_or_else(|| V::schema().len())
    }

    /// Apply the frozen transforms. Pure: same input, same output.
    pub fn transform(&self, vector: &FeatureVector<V>) -> Result<ModelInput<V>, PipelineError> {
        let scaled = match &self.scaler {
            Some(scaler) => scaler.apply(vector.values())?,
            None if V::KIND.requires_scaling() => {
                return Err(PipelineError::TransformNotFitted {
                    variant: V::KIND,
                    stage: "scaler",
                })
            }
            None => vector.values().to_vec(),
        };

        let expanded = match &self.expansion {
            Some(expansion) => expansion.apply(&scaled)?,
            None if V::KIND.uses_polynomial_expansion() => {
                return Err(PipelineError::TransformNotFitted {
                    variant: V::KIND,
                    stage: "polynomial expansion",
                })
            }
            None => scaled,
        };

        Ok(ModelInput::new(expanded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Delay, Price};

    fn spec(degree: u32) -> PolynomialSpec {
        PolynomialSpec {
            degree,
            include_bias: false,
            interaction_only: false,
            powers: None,
        }
    }

    #[test]
    fn test_expansion_term_order() {
        let poly = PolynomialExpansion::fit(2, 2, false, false);
        assert_eq!(poly.output_width(), 5);
        // [a, b, a^2, ab, b^2]
        assert_eq!(poly.apply(&[2.0, 3.0]).unwrap(), vec![2.0, 3.0, 4.0, 6.0, 9.0]);

        let poly = PolynomialExpansion::fit(2, 2, true, false);
        assert_eq!(poly.apply(&[2.0, 3.0]).unwrap(), vec![1.0, 2.0, 3.0, 4.0, 6.0, 9.0]);
    }

    #[test]
    fn test_interaction_only_expansion() {
        let poly = PolynomialExpansion::fit(3, 2, false, true);
        // [a, b, c, ab, ac, bc]
        assert_eq!(
            poly.apply(&[2.0, 3.0, 5.0]).unwrap(),
            vec![2.0, 3.0, 5.0, 6.0, 10.0, 15.0]
        );
    }

    #[test]
    fn test_degree_two_width_for_price_schema() {
        let poly = PolynomialExpansion::fit(17, 2, false, false);
        assert_eq!(poly.output_width(), 17 + 17 * 18 / 2);
    }

    #[test]
    fn test_explicit_powers_take_precedence() {
        let spec = PolynomialSpec {
            degree: 2,
            include_bias: false,
            interaction_only: false,
            powers: Some(vec![vec![0, 2], vec![1, 1], vec![1, 0]]),
        };
        let poly = PolynomialExpansion::from_spec(&spec, 2).unwrap();
        assert_eq!(poly.apply(&[2.0, 3.0]).unwrap(), vec![9.0, 6.0, 2.0]);
    }

    #[test]
    fn test_invalid_powers_rejected() {
        let mut bad = spec(2);
        bad.powers = Some(vec![vec![3, 0]]);
        assert!(PolynomialExpansion::from_spec(&bad, 2).unwrap_err().contains("degree 3"));

        bad.powers = Some(vec![vec![1]]);
        assert!(PolynomialExpansion::from_spec(&bad, 2).is_err());

        assert!(PolynomialExpansion::from_spec(&spec(0), 2).is_err());
    }

    #[test]
    fn test_scaler_applies_center_and_scale() {
        let scaler = FittedScaler::from_params(
            &ScalerParams {
                center: Some(vec![10.0, 0.0, 5.0]),
                scale: Some(vec![2.0, 0.0, 1.0]),
            },
            3,
        )
        .unwrap();
        // zero scale is treated as 1
        assert_eq!(scaler.apply(&[14.0, 3.0, 5.0]).unwrap(), vec![2.0, 3.0, 0.0]);

        let err = scaler.apply(&[1.0]).unwrap_err();
        assert_eq!(
            err,
            PipelineError::WidthMismatch {
                stage: "scaler",
                expected: 3,
                actual: 1
            }
        );
    }

    #[test]
    fn test_scaler_without_centering() {
        let scaler = FittedScaler::from_params(
            &ScalerParams {
                center: None,
                scale: Some(vec![4.0]),
            },
            1,
        )
        .unwrap();
        assert_eq!(scaler.apply(&[2.0]).unwrap(), vec![0.5]);

        let empty = ScalerParams {
            center: None,
            scale: None,
        };
        assert!(FittedScaler::from_params(&empty, 1).is_err());
    }

    #[test]
    fn test_price_state_requires_fitted_stages() {
        let scaler = ScalerParams {
            center: Some(vec![0.0; 17]),
            scale: Some(vec![1.0; 17]),
        };
        assert!(TransformState::<Price>::from_params(Some(&scaler), None).is_err());
        assert!(TransformState::<Price>::from_params(None, Some(&spec(2))).is_err());

        let state = TransformState::<Price>::from_params(Some(&scaler), Some(&spec(2))).unwrap();
        assert_eq!(state.output_width(), 170);
    }

    #[test]
    fn test_delay_state_rejects_expansion() {
        assert!(TransformState::<Delay>::from_params(None, Some(&spec(2))).is_err());
        let state = TransformState::<Delay>::from_params(None, None).unwrap();
        assert_eq!(state.output_width(), 13);
    }

    #[test]
    fn test_unfitted_price_transform_fails() {
        let state = TransformState::<Price>::unfitted();
        let vector = FeatureVector::<Price>::from_positional(vec![0.0; 17]).unwrap();
        assert_eq!(
            state.transform(&vector).unwrap_err(),
            PipelineError::TransformNotFitted {
                variant: crate::schema::ModelVariant::Price,
                stage: "scaler"
            }
        );
    }

    #[test]
    fn test_delay_passthrough_without_scaler() {
        let state = TransformState::<Delay>::from_params(None, None).unwrap();
        let values: Vec<f64> = (0..13).map(f64::from).collect();
        let vector = FeatureVector::<Delay>::from_positional(values.clone()).unwrap();
        assert_eq!(state.transform(&vector).unwrap().values(), values.as_slice());
    }

    #[test]
    fn test_transform_is_deterministic() {
        let scaler = ScalerParams {
            center: Some((0..17).map(f64::from).collect()),
            scale: Some(vec![3.0; 17]),
        };
        let state = TransformState::<Price>::from_params(Some(&scaler), Some(&spec(2))).unwrap();
        let vector =
            FeatureVector::<Price>::from_positional((0..17).map(|i| i as f64 * 1.5).collect()).unwrap();
        let first = state.transform(&vector).unwrap();
        let second = state.transform(&vector).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 170);
    }
}
