//! Trained artifact loading
//!
//! Artifacts are JSON documents exported by the training pipeline. Each one
//! bundles the fitted transform parameters, the fitted model and the feature
//! names it was trained on. An optional `manifest.json` in the model directory
//! pins every file to a SHA256 checksum.

use crate::error::ArtifactError;
use crate::predictor::{
    LinearRegression, OnnxPredictor, PolynomialSpec, Predictor, RandomForestClassifier,
    ScalerParams, TransformState, TreeSpec, VariantPipeline,
};
use crate::schema::{ModelVariant, Variant};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Manifest file name inside the model directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Serialized trained model for one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub variant: ModelVariant,
    #[serde(default)]
    pub version: Option<String>,
    /// Column order the transform and model were fitted on
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub scaler: Option<ScalerParams>,
    #[serde(default)]
    pub polynomial: Option<PolynomialSpec>,
    pub model: ModelSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelSpec {
    LinearRegression {
        coef: Vec<f64>,
        intercept: f64,
    },
    RandomForestClassifier {
        classes: Vec<i64>,
        trees: Vec<TreeSpec>,
    },
    /// ONNX graph stored next to the artifact
    Onnx {
        path: PathBuf,
    },
}

/// File name -> hex SHA256
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub artifacts: BTreeMap<String, String>,
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Read-only view of a model directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    model_dir: PathBuf,
    manifest: Option<ArtifactManifest>,
    require_checksums: bool,
}

impl ArtifactStore {
    /// Open a model directory, reading its manifest if one exists
    pub fn open(model_dir: impl Into<PathBuf>, require_checksums: bool) -> Result<Self, ArtifactError> {
        let model_dir = model_dir.into();
        let manifest_path = model_dir.join(MANIFEST_FILE);

        let manifest = match fs::read(&manifest_path) {
            Ok(bytes) => {
                let manifest: ArtifactManifest =
                    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Corrupt {
                        path: manifest_path.clone(),
                        source,
                    })?;
                debug!(entries = manifest.artifacts.len(), "Loaded artifact manifest");
                Some(manifest)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if require_checksums {
                    return Err(ArtifactError::Missing { path: manifest_path });
                }
                warn!(
                    model_dir = %model_dir.display(),
                    "No artifact manifest found, skipping checksum verification"
                );
                None
            }
            Err(source) => {
                return Err(ArtifactError::Io {
                    path: manifest_path,
                    source,
                })
            }
        };

        Ok(Self {
            model_dir,
            manifest,
            require_checksums,
        })
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Read a file from the model directory and check it against the manifest.
    ///
    /// Returns the bytes and their checksum.
    pub fn read_verified(&self, relative: &Path) -> Result<(Vec<u8>, String), ArtifactError> {
        let path = self.model_dir.join(relative);
        let bytes = fs::read(&path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                ArtifactError::Missing { path: path.clone() }
            } else {
                ArtifactError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        let actual = compute_checksum(&bytes);

        let key = relative.to_string_lossy().replace('\\', "/");
        match self.manifest.as_ref().and_then(|m| m.artifacts.get(&key)) {
            Some(expected) if !expected.eq_ignore_ascii_case(&actual) => {
                return Err(ArtifactError::ChecksumMismatch {
                    path,
                    expected: expected.clone(),
                    actual,
                });
            }
            Some(_) => debug!(file = %key, checksum = %actual, "Artifact checksum validated"),
            None if self.require_checksums => return Err(ArtifactError::Unverified { path }),
            None => {}
        }

        Ok((bytes, actual))
    }

    /// Load, validate and warm up the pipeline for `V` from an artifact file
    pub fn load_pipeline<V: Variant>(&self, file_name: &str) -> Result<VariantPipeline<V>, ArtifactError> {
        let relative = Path::new(file_name);
        let path = self.model_dir.join(relative);
        let (bytes, checksum) = self.read_verified(relative)?;

        let artifact: ModelArtifact =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Corrupt {
                path: path.clone(),
                source,
            })?;

        if artifact.variant != V::KIND {
            return Err(ArtifactError::VariantMismatch {
                path,
                expected: V::KIND,
                found: artifact.variant,
            });
        }
        if let Some(detail) = V::schema().diff(&artifact.feature_names) {
            return Err(ArtifactError::SchemaDrift {
                variant: V::KIND,
                detail,
            });
        }

        let transform =
            TransformState::<V>::from_params(artifact.scaler.as_ref(), artifact.polynomial.as_ref())
                .map_err(|detail| ArtifactError::InvalidTransform {
                    variant: V::KIND,
                    detail,
                })?;

        let model = self.build_model::<V>(&artifact.model, transform.output_width())?;
        let family = model.family();
        let version = artifact
            .version
            .clone()
            .unwrap_or_else(|| format!("sha256:{}", &checksum[..12]));

        let pipeline = VariantPipeline::new(transform, model, version).map_err(|detail| {
            ArtifactError::InvalidModel {
                variant: V::KIND,
                detail,
            }
        })?;
        pipeline
            .warm_up()
            .map_err(|source| ArtifactError::WarmUp {
                variant: V::KIND,
                source,
            })?;

        info!(
            variant = %V::KIND,
            path = %path.display(),
            model_family = %family,
            model_version = %pipeline.model_version(),
            "Loaded model artifact"
        );
        Ok(pipeline)
    }

    fn build_model<V: Variant>(
        &self,
        spec: &ModelSpec,
        input_width: usize,
    ) -> Result<Box<dyn Predictor>, ArtifactError> {
        let invalid = |detail: String| ArtifactError::InvalidModel {
            variant: V::KIND,
            detail,
        };
        match spec {
            ModelSpec::LinearRegression { coef, intercept } => {
                let model = LinearRegression::new(coef.clone(), *intercept).map_err(invalid)?;
                Ok(Box::new(model))
            }
            ModelSpec::RandomForestClassifier { classes, trees } => {
                let model = RandomForestClassifier::new(classes.clone(), trees, input_width)
                    .map_err(invalid)?;
                Ok(Box::new(model))
            }
            ModelSpec::Onnx { path } => {
                let (bytes, _) = self.read_verified(path)?;
                let model = OnnxPredictor::new(&bytes, input_width).map_err(|e| ArtifactError::Onnx {
                    path: self.model_dir.join(path),
                    message: format!("{:#}", e),
                })?;
                Ok(Box::new(model))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Delay, DELAY_FEATURES};
    use tempfile::TempDir;

    fn delay_artifact() -> ModelArtifact {
        ModelArtifact {
            variant: ModelVariant::Delay,
            version: None,
            feature_names: DELAY_FEATURES.iter().map(|s| s.to_string()).collect(),
            scaler: None,
            polynomial: None,
            model: ModelSpec::RandomForestClassifier {
                classes: vec![0, 1],
                trees: vec![TreeSpec {
                    children_left: vec![-1],
                    children_right: vec![-1],
                    feature: vec![-2],
                    threshold: vec![-2.0],
                    value: vec![vec![3.0, 1.0]],
                }],
            },
        }
    }

    fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Vec<u8> {
        let bytes = serde_json::to_vec(value).unwrap();
        fs::write(dir.join(name), &bytes).unwrap();
        bytes
    }

    #[test]
    fn test_checksum_is_hex_sha256() {
        assert_eq!(
            compute_checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_artifact_json_shape() {
        let json = serde_json::to_value(delay_artifact()).unwrap();
        assert_eq!(json["variant"], "delay");
        assert_eq!(json["model"]["type"], "random_forest_classifier");

        let linear: ModelSpec =
            serde_json::from_str(r#"{"type": "linear_regression", "coef": [1.0], "intercept": 2.5}"#)
                .unwrap();
        assert_eq!(
            linear,
            ModelSpec::LinearRegression {
                coef: vec![1.0],
                intercept: 2.5
            }
        );
    }

    #[test]
    fn test_version_defaults_to_checksum_prefix() {
        let dir = TempDir::new().unwrap();
        let bytes = write_json(dir.path(), "delay_model.json", &delay_artifact());

        let store = ArtifactStore::open(dir.path(), false).unwrap();
        let pipeline = store.load_pipeline::<Delay>("delay_model.json").unwrap();
        assert_eq!(
            pipeline.model_version(),
            format!("sha256:{}", &compute_checksum(&bytes)[..12])
        );
    }

    #[test]
    fn test_manifest_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        write_json(dir.path(), "delay_model.json", &delay_artifact());
        let mut manifest = ArtifactManifest::default();
        manifest
            .artifacts
            .insert("delay_model.json".to_string(), compute_checksum(b"something else"));
        write_json(dir.path(), MANIFEST_FILE, &manifest);

        let store = ArtifactStore::open(dir.path(), false).unwrap();
        let err = store.load_pipeline::<Delay>("delay_model.json").unwrap_err();
        assert!(matches!(err, ArtifactError::ChecksumMismatch { .. }), "{:?}", err);
    }

    #[test]
    fn test_required_checksums_need_manifest_entry() {
        let dir = TempDir::new().unwrap();
        write_json(dir.path(), "delay_model.json", &delay_artifact());
        assert!(matches!(
            ArtifactStore::open(dir.path(), true).unwrap_err(),
            ArtifactError::Missing { .. }
        ));

        write_json(dir.path(), MANIFEST_FILE, &ArtifactManifest::default());
        let store = ArtifactStore::open(dir.path(), true).unwrap();
        assert!(matches!(
            store.load_pipeline::<Delay>("delay_model.json").unwrap_err(),
            ArtifactError::Unverified { .. }
        ));
    }

    #[test]
    fn test_matching_manifest_accepted() {
        let dir = TempDir::new().unwrap();
        let bytes = write_json(dir.path(), "delay_model.json", &delay_artifact());
        let mut manifest = ArtifactManifest::default();
        manifest
            .artifacts
            .insert("delay_model.json".to_string(), compute_checksum(&bytes).to_uppercase());
        write_json(dir.path(), MANIFEST_FILE, &manifest);

        let store = ArtifactStore::open(dir.path(), true).unwrap();
        assert!(store.load_pipeline::<Delay>("delay_model.json").is_ok());
    }

    fn onnx_artifact(model_file: &str) -> ModelArtifact {
        ModelArtifact {
            model: ModelSpec::Onnx {
                path: PathBuf::from(model_file),
            },
            ..delay_artifact()
        }
    }

    fn manifest_with(entries: &[(&str, String)]) -> ArtifactManifest {
        ArtifactManifest {
            artifacts: entries
                .iter()
                .map(|(name, sum)| (name.to_string(), sum.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_onnx_model_file_must_exist() {
        let dir = TempDir::new().unwrap();
        write_json(dir.path(), "delay_model.json", &onnx_artifact("delay_model.onnx"));

        let store = ArtifactStore::open(dir.path(), false).unwrap();
        match store.load_pipeline::<Delay>("delay_model.json").unwrap_err() {
            ArtifactError::Missing { path } => assert!(path.ends_with("delay_model.onnx")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_onnx_model_file_checked_against_manifest() {
        let dir = TempDir::new().unwrap();
        let artifact = write_json(dir.path(), "delay_model.json", &onnx_artifact("delay_model.onnx"));
        fs::write(dir.path().join("delay_model.onnx"), b"tampered graph").unwrap();
        write_json(
            dir.path(),
            MANIFEST_FILE,
            &manifest_with(&[
                ("delay_model.json", compute_checksum(&artifact)),
                ("delay_model.onnx", compute_checksum(b"original graph")),
            ]),
        );

        let store = ArtifactStore::open(dir.path(), false).unwrap();
        match store.load_pipeline::<Delay>("delay_model.json").unwrap_err() {
            ArtifactError::ChecksumMismatch { path, .. } => {
                assert!(path.ends_with("delay_model.onnx"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_verified_onnx_file_must_parse() {
        let dir = TempDir::new().unwrap();
        let artifact = write_json(dir.path(), "delay_model.json", &onnx_artifact("delay_model.onnx"));
        fs::write(dir.path().join("delay_model.onnx"), b"not a graph").unwrap();
        write_json(
            dir.path(),
            MANIFEST_FILE,
            &manifest_with(&[
                ("delay_model.json", compute_checksum(&artifact)),
                ("delay_model.onnx", compute_checksum(b"not a graph")),
            ]),
        );

        let store = ArtifactStore::open(dir.path(), true).unwrap();
        assert!(matches!(
            store.load_pipeline::<Delay>("delay_model.json").unwrap_err(),
            ArtifactError::Onnx { .. }
        ));
    }
}
