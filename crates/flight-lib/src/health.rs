//! Health checks for the prediction server
//!
//! Each loaded model is a component. The server is live as soon as it
//! answers HTTP and ready once both pipelines are loaded and none of them
//! has been marked unhealthy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Serving, but something looks off (e.g. repeated inference failures)
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentStatus::Healthy => "healthy",
            ComponentStatus::Degraded => "degraded",
            ComponentStatus::Unhealthy => "unhealthy",
        }
    }

    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Body of `GET /healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status wins
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;
        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }
        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Body of `GET /readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub mod components {
    use crate::schema::ModelVariant;

    pub const PRICE_MODEL: &str = "price_model";
    pub const DELAY_MODEL: &str = "delay_model";

    pub fn for_variant(variant: ModelVariant) -> &'static str {
        match variant {
            ModelVariant::Price => PRICE_MODEL,
            ModelVariant::Delay => DELAY_MODEL,
        }
    }
}

/// Consecutive runtime failures after which a model is reported unhealthy
pub const UNHEALTHY_AFTER_FAILURES: u32 = 5;

/// Shared component health table
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    failures: Arc<RwLock<HashMap<String, u32>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn register(&self, name: &str) {
        self.failures.write().await.remove(name);
        self.update(name, ComponentHealth::healthy()).await;
    }

    async fn update(&self, name: &str, health: ComponentHealth) {
        self.components.write().await.insert(name.to_string(), health);
    }

    /// Count a runtime failure of `name`.
    ///
    /// The component is degraded at first and turns unhealthy once
    /// [`UNHEALTHY_AFTER_FAILURES`] failures happen without a success in between.
    pub async fn record_failure(&self, name: &str, message: impl Into<String>) -> ComponentStatus {
        let count = {
            let mut failures = self.failures.write().await;
            let count = failures.entry(name.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        let message = message.into();
        if count >= UNHEALTHY_AFTER_FAILURES {
            let message = format!("{} consecutive failures, last: {}", count, message);
            self.update(name, ComponentHealth::unhealthy(message)).await;
            ComponentStatus::Unhealthy
        } else {
            self.update(name, ComponentHealth::degraded(message)).await;
            ComponentStatus::Degraded
        }
    }

    /// Clear the failure streak of `name`, restoring it to healthy
    pub async fn record_success(&self, name: &str) {
        if self.failures.write().await.remove(name).is_some() {
            self.update(name, ComponentHealth::healthy()).await;
        }
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        let reason = if !ready {
            Some("Models not loaded yet".to_string())
        } else if health.status == ComponentStatus::Unhealthy {
            Some("A model keeps failing at inference".to_string())
        } else {
            None
        };
        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}
