//! Model inference
//!
//! Native evaluation of the two scikit-learn model families the training
//! scripts produce, plus ONNX graphs executed with tract.

use super::{ModelFamily, Predictor, RawOutput};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tract_onnx::prelude::*;

/// Ordinary least squares regression: `intercept + coef . x`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegression {
    coef: Vec<f64>,
    intercept: f64,
}

impl LinearRegression {
    pub fn new(coef: Vec<f64>, intercept: f64) -> Result<Self, String> {
        if coef.is_empty() {
            return Err("linear regression has no coefficients".to_string());
        }
        if !intercept.is_finite() || coef.iter().any(|c| !c.is_finite()) {
            return Err("linear regression has non-finite parameters".to_string());
        }
        Ok(Self { coef, intercept })
    }
}

impl Predictor for LinearRegression {
    fn predict(&self, input: &[f64]) -> Result<RawOutput> {
        if input.len() != self.coef.len() {
            bail!(
                "linear regression expects {} inputs, got {}",
                self.coef.len(),
                input.len()
            );
        }
        let dot: f64 = self.coef.iter().zip(input).map(|(c, x)| c * x).sum();
        Ok(RawOutput::Value(self.intercept + dot))
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::LinearRegression
    }

    fn input_width(&self) -> usize {
        self.coef.len()
    }
}

/// Serialized decision tree, in scikit-learn `tree_` array layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSpec {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class counts or fractions
    pub value: Vec<Vec<f64>>,
}

/// scikit-learn marks leaves with -1 children
const TREE_LEAF: i64 = -1;

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        proba: Vec<f64>,
    },
}

/// Validated classification tree
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    pub fn from_spec(spec: &TreeSpec, n_features: usize, n_classes: usize) -> Result<Self, String> {
        let n = spec.children_left.len();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        if [
            spec.children_right.len(),
            spec.feature.len(),
            spec.threshold.len(),
            spec.value.len(),
        ]
        .iter()
        .any(|len| *len != n)
        {
            return Err("tree arrays have inconsistent lengths".to_string());
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (left, right) = (spec.children_left[i], spec.children_right[i]);
            if left == TREE_LEAF && right == TREE_LEAF {
                let counts = &spec.value[i];
                if counts.len() != n_classes {
                    return Err(format!(
                        "leaf {} has {} class values, forest has {} classes",
                        i,
                        counts.len(),
                        n_classes
                    ));
                }
                let total: f64 = counts.iter().sum();
                if !total.is_finite() || total <= 0.0 || counts.iter().any(|c| *c < 0.0) {
                    return Err(format!("leaf {} has an invalid class distribution", i));
                }
                nodes.push(Node::Leaf {
                    proba: counts.iter().map(|c| c / total).collect(),
                });
                continue;
            }

            // Children always follow their parent, so traversal terminates.
            let in_range = |child: i64| child > i as i64 && (child as usize) < n;
            if !in_range(left) || !in_range(right) {
                return Err(format!("node {} has out-of-order children", i));
            }
            let feature = spec.feature[i];
            if feature < 0 || feature as usize >= n_features {
                return Err(format!(
                    "node {} splits on feature {}, model has {} features",
                    i, feature, n_features
                ));
            }
            if spec.threshold[i].is_nan() {
                return Err(format!("node {} has a NaN threshold", i));
            }
            nodes.push(Node::Split {
                feature: feature as usize,
                threshold: spec.threshold[i],
                left: left as usize,
                right: right as usize,
            });
        }
        Ok(Self { nodes })
    }

    /// Class distribution of the leaf `x` falls into
    pub fn predict_proba(&self, x: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { proba } => return proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Bagged ensemble of classification trees
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForestClassifier {
    classes: Vec<i64>,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForestClassifier {
    pub fn new(classes: Vec<i64>, trees: &[TreeSpec], n_features: usize) -> Result<Self, String> {
        if classes.len() < 2 {
            return Err(format!("forest needs at least 2 classes, has {}", classes.len()));
        }
        if trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        let trees = trees
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                DecisionTree::from_spec(spec, n_features, classes.len())
                    .map_err(|e| format!("tree {}: {}", i, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            classes,
            trees,
            n_features,
        })
    }

    /// Mean class probabilities across trees
    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        let mut acc = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (a, p) in acc.iter_mut().zip(tree.predict_proba(x)) {
                *a += p;
            }
        }
        let n = self.trees.len() as f64;
        acc.iter_mut().for_each(|a| *a /= n);
        acc
    }
}

impl Predictor for RandomForestClassifier {
    fn predict(&self, input: &[f64]) -> Result<RawOutput> {
        if input.len() != self.n_features {
            bail!(
                "random forest expects {} inputs, got {}",
                self.n_features,
                input.len()
            );
        }
        let proba = self.predict_proba(input);
        // First maximum wins, matching numpy argmax.
        let mut best = 0;
        for (i, p) in proba.iter().enumerate().skip(1) {
            if *p > proba[best] {
                best = i;
            }
        }
        Ok(RawOutput::Class(self.classes[best]))
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::RandomForestClassifier
    }

    fn input_width(&self) -> usize {
        self.n_features
    }
}

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX-based predictor using tract for lightweight inference
pub struct OnnxPredictor {
    model: TractModel,
    input_width: usize,
}

impl OnnxPredictor {
    /// Create a new predictor from model bytes
    pub fn new(model_bytes: &[u8], input_width: usize) -> Result<Self> {
        let model = Self::load_model(model_bytes, input_width)?;
        Ok(Self { model, input_width })
    }

    /// Load and optimize an ONNX model from bytes
    fn load_model(model_bytes: &[u8], input_width: usize) -> Result<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, input_width]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(model)
    }

    fn input_to_tensor(&self, input: &[f64]) -> Result<Tensor> {
        let data: Vec<f32> = input.iter().map(|v| *v as f32).collect();
        let array = tract_ndarray::Array2::from_shape_vec((1, self.input_width), data)
            .context("Failed to shape model input")?;
        Ok(array.into())
    }

    /// Integer outputs are class labels, float outputs are regression values
    fn tensor_to_output(output: &Tensor) -> Result<RawOutput> {
        let raw = match output.datum_type() {
            DatumType::I64 => output
                .to_array_view::<i64>()?
                .iter()
                .next()
                .map(|v| RawOutput::Class(*v)),
            DatumType::I32 => output
                .to_array_view::<i32>()?
                .iter()
                .next()
                .map(|v| RawOutput::Class(*v as i64)),
            DatumType::F32 => output
                .to_array_view::<f32>()?
                .iter()
                .next()
                .map(|v| RawOutput::Value(*v as f64)),
            DatumType::F64 => output
                .to_array_view::<f64>()?
                .iter()
                .next()
                .map(|v| RawOutput::Value(*v)),
            other => bail!("Unsupported model output type {:?}", other),
        };
        raw.context("Model output is empty")
    }
}

impl Predictor for OnnxPredictor {
    fn predict(&self, input: &[f64]) -> Result<RawOutput> {
        if input.len() != self.input_width {
            bail!(
                "ONNX model expects {} inputs, got {}",
                self.input_width,
                input.len()
            );
        }
        let tensor = self.input_to_tensor(input)?;
        let result = self.model.run(tvec!(tensor.into()))?;
        let output = result.first().context("No output from model")?;
        Self::tensor_to_output(output)
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Onnx
    }

    fn input_width(&self) -> usize {
        self.input_width
    }
}
