//! Server configuration

use anyhow::{Context, Result};
use flight_lib::ArtifactConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "FLIGHT_CONFIG";

/// Prefix for environment overrides, e.g. `FLIGHT_API_PORT`
pub const ENV_PREFIX: &str = "FLIGHT";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub api_port: u16,
    /// Directory holding the trained artifacts
    pub model_dir: PathBuf,
    pub price_artifact: String,
    pub delay_artifact: String,
    pub require_checksums: bool,
    /// Name attached to structured log events
    pub instance_name: String,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "flight-predictor".to_string())
}

impl ServerConfig {
    /// Defaults, then the file named by `FLIGHT_CONFIG`, then `FLIGHT_*`
    /// environment variables
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);
        Self::load_with(
            file.as_deref(),
            config::Environment::with_prefix(ENV_PREFIX).try_parsing(true),
        )
    }

    pub fn load_with(file: Option<&Path>, env: config::Environment) -> Result<Self> {
        let defaults = ArtifactConfig::default();
        let mut builder = config::Config::builder()
            .set_default("bind_address", "0.0.0.0")?
            .set_default("api_port", 8000)?
            .set_default("model_dir", defaults.model_dir.to_string_lossy().to_string())?
            .set_default("price_artifact", defaults.price_artifact)?
            .set_default("delay_artifact", defaults.delay_artifact)?
            .set_default("require_checksums", defaults.require_checksums)?
            .set_default("instance_name", default_instance_name())?;

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }

        builder
            .add_source(env)
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("invalid server configuration")
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.api_port)
    }

    pub fn artifact_config(&self) -> ArtifactConfig {
        ArtifactConfig {
            model_dir: self.model_dir.clone(),
            price_artifact: self.price_artifact.clone(),
            delay_artifact: self.delay_artifact.clone(),
            require_checksums: self.require_checksums,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // A prefix nothing sets, so the host environment cannot leak in
    fn isolated_env() -> config::Environment {
        config::Environment::with_prefix("FLIGHT_CONFIG_TEST_UNSET")
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::load_with(None, isolated_env()).unwrap();
        assert_eq!(config.listen_address(), "0.0.0.0:8000");
        assert_eq!(config.model_dir, PathBuf::from("ml_models"));
        assert_eq!(config.price_artifact, "price_model.json");
        assert_eq!(config.delay_artifact, "delay_model.json");
        assert!(!config.require_checksums);
        assert!(!config.instance_name.is_empty());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.toml");
        fs::write(
            &path,
            "api_port = 9100\nmodel_dir = \"/srv/models\"\nrequire_checksums = true\n",
        )
        .unwrap();

        let config = ServerConfig::load_with(Some(&path), isolated_env()).unwrap();
        assert_eq!(config.api_port, 9100);
        assert!(config.require_checksums);

        let artifacts = config.artifact_config();
        assert_eq!(artifacts.model_dir, PathBuf::from("/srv/models"));
        assert_eq!(artifacts.price_artifact, "price_model.json");
    }

    #[test]
    fn test_invalid_port_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.toml");
        fs::write(&path, "api_port = \"not-a-port\"\n").unwrap();

        assert!(ServerConfig::load_with(Some(&path), isolated_env()).is_err());
    }

    #[test]
    fn test_missing_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(ServerConfig::load_with(Some(&path), isolated_env()).is_err());
    }
}
