//! Process-wide serving context
//!
//! Built once at startup from the model directory and shared read-only by
//! every request. There is no interior mutability: concurrent requests only
//! ever read the frozen transforms and models.

use crate::artifact::ArtifactStore;
use crate::error::{ArtifactError, PipelineError};
use crate::models::{Prediction, PredictionRequest};
use crate::predictor::{ModelFamily, VariantPipeline};
use crate::schema::{Delay, ModelVariant, Price};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where to find the trained artifacts
#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    pub model_dir: PathBuf,
    pub price_artifact: String,
    pub delay_artifact: String,
    /// Require a manifest entry for every loaded file
    pub require_checksums: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("ml_models"),
            price_artifact: "price_model.json".to_string(),
            delay_artifact: "delay_model.json".to_string(),
            require_checksums: false,
        }
    }
}

/// Description of a loaded model, as exposed by the schema endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub variant: ModelVariant,
    pub model_version: String,
    pub model_family: ModelFamily,
    pub features: Vec<String>,
}

/// Schemas, frozen transforms and models for both endpoints
#[derive(Debug)]
pub struct ServingContext {
    price: VariantPipeline<Price>,
    delay: VariantPipeline<Delay>,
}

impl ServingContext {
    pub fn new(price: VariantPipeline<Price>, delay: VariantPipeline<Delay>) -> Self {
        Self { price, delay }
    }

    /// Load both artifacts. Either failing aborts the whole load.
    pub fn load(config: &ArtifactConfig) -> Result<Self, ArtifactError> {
        let store = ArtifactStore::open(&config.model_dir, config.require_checksums)?;
        let price = store.load_pipeline::<Price>(&config.price_artifact)?;
        let delay = store.load_pipeline::<Delay>(&config.delay_artifact)?;
        Ok(Self::new(price, delay))
    }

    pub fn predict_price(&self, request: &PredictionRequest) -> Result<Prediction, PipelineError> {
        self.price.run(request)
    }

    pub fn predict_delay(&self, request: &PredictionRequest) -> Result<Prediction, PipelineError> {
        self.delay.run(request)
    }

    pub fn predict(
        &self,
        variant: ModelVariant,
        request: &PredictionRequest,
    ) -> Result<Prediction, PipelineError> {
        match variant {
            ModelVariant::Price => self.predict_price(request),
            ModelVariant::Delay => self.predict_delay(request),
        }
    }

    pub fn price(&self) -> &VariantPipeline<Price> {
        &self.price
    }

    pub fn delay(&self) -> &VariantPipeline<Delay> {
        &self.delay
    }

    pub fn model_info(&self, variant: ModelVariant) -> ModelInfo {
        let (version, family) = match variant {
            ModelVariant::Price => (self.price.model_version(), self.price.model_family()),
            ModelVariant::Delay => (self.delay.model_version(), self.delay.model_family()),
        };
        ModelInfo {
            variant,
            model_version: version.to_string(),
            model_family: family,
            features: variant.schema().iter().map(str::to_string).collect(),
        }
    }
}
