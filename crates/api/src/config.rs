use anyhow::Context;
use ingest::DatasetPreset;
use scoring::{DataSources, PipelineConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_ENV: &str = "FRAUDNET_CONFIG";
pub const PRESET_ENV: &str = "FRAUDNET_PRESET";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
    pub data: DataSources,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; empty or `*` allows any.
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
    /// Filter used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cors: CorsConfig::default(),
            logging: LoggingConfig::default(),
            data: DataSources::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: "info,tower_http=debug".to_string(),
        }
    }
}

impl AppConfig {
    /// Synthetic corpus of the given size, everything else default.
    pub fn for_preset(preset: DatasetPreset) -> Self {
        let mut config = Self::default();
        config.data.preset = preset;
        if preset == DatasetPreset::StressTest {
            // dense stress graphs produce many more maximal cliques
            config.pipeline.clique.max_cliques = 1_000_000;
            config.logging.json = true;
        }
        config
    }

    /// Read the file named by `FRAUDNET_CONFIG`. Without one, use the preset
    /// named by `FRAUDNET_PRESET` (e.g. `stress_test`), or the defaults.
    pub async fn load() -> anyhow::Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_file(Path::new(&path)).await;
        }
        match std::env::var(PRESET_ENV) {
            Ok(name) => {
                let preset: DatasetPreset = serde_json::from_value(serde_json::Value::String(name.clone()))
                    .with_context(|| format!("unknown dataset preset '{}'", name))?;
                Ok(Self::for_preset(preset))
            }
            Err(_) => Ok(Self::default()),
        }
    }

    pub async fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        config.pipeline.validate()?;
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(
            &path,
            r#"{"server": {"host": "127.0.0.1", "port": 8080}, "data": {"preset": "production"}}"#,
        )
        .await
        .unwrap();

        let config = AppConfig::from_file(&path).await.unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.data.preset, DatasetPreset::Production);
        assert_eq!(config.pipeline.clique.k, 3);
        assert!(!config.logging.json);
    }

    #[tokio::test]
    async fn test_partial_sections_keep_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(
            &path,
            r#"{"server": {"port": 8080}, "logging": {"json": true}, "pipeline": {"clique": {"k": 4}}}"#,
        )
        .await
        .unwrap();

        let config = AppConfig::from_file(&path).await.unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.logging.json);
        assert_eq!(config.logging.filter, LoggingConfig::default().filter);
        assert_eq!(config.pipeline.clique.k, 4);
        assert_eq!(config.pipeline.clique.max_cliques, 100_000);
    }

    #[tokio::test]
    async fn test_invalid_pipeline_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{"pipeline": {"clique": {"k": 1, "max_cliques": 10}}}"#)
            .await
            .unwrap();

        assert!(AppConfig::from_file(&path).await.is_err());
    }

    #[test]
    fn test_stress_preset() {
        let config = AppConfig::for_preset(DatasetPreset::StressTest);
        assert_eq!(config.data.preset, DatasetPreset::StressTest);
        assert!(config.pipeline.clique.max_cliques > PipelineConfig::default().clique.max_cliques);
    }
}
