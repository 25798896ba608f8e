//! Flight price and delay prediction library
//!
//! This crate provides the serving core shared by the HTTP server and the CLI:
//! - Fixed feature schemas for the price and delay models
//! - Request materialization against a schema
//! - Frozen preprocessing and model inference
//! - Artifact loading, health checks and observability

pub mod artifact;
pub mod context;
pub mod error;
pub mod health;
pub mod itinerary;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod schema;

pub use artifact::{ArtifactManifest, ArtifactStore, ModelArtifact, ModelSpec};
pub use context::{ArtifactConfig, ModelInfo, ServingContext};
pub use error::{ArtifactError, PipelineError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use itinerary::{Itinerary, ItineraryError, TimePeriod};
pub use models::*;
pub use observability::{PredictorMetrics, StructuredLogger};
pub use schema::{Delay, FeatureSchema, ModelVariant, Price, Variant};
