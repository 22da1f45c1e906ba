use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, ShrinkError};

/// Top-level configuration for the shrink dashboard.
///
/// Loaded from `~/.shrink/config.toml` by default. Each section corresponds
/// to one crate of the workspace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShrinkConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

impl ShrinkConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ShrinkConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ShrinkError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// API server port.
    pub port: u16,
    /// Data directory for the warehouse database and knowledge documents.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: "~/.shrink/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Warehouse connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// SQLite file name, relative to `general.data_dir` unless absolute.
    pub path: String,
    /// Row cap applied to transactional queries when the caller gives none.
    pub default_row_limit: u32,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            path: "warehouse.db".to_string(),
            default_row_limit: 500,
        }
    }
}

/// Session cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live for reference lists (stores, departments, sample row).
    pub reference_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            reference_ttl_secs: 3600,
        }
    }
}

/// Conversational assistant settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Whether the assistant accepts messages at all.
    pub enabled: bool,
    /// Maximum accepted message length in characters.
    pub max_message_length: usize,
    /// Minutes of inactivity after which a session is dropped.
    pub session_timeout_minutes: u32,
    /// Number of prior messages forwarded to the model as history.
    pub context_turns: usize,
    /// Router confidence above which a report recommendation is answered.
    pub report_confidence_threshold: f32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_message_length: 2000,
            session_timeout_minutes: 30,
            context_turns: 6,
            report_confidence_threshold: 0.5,
        }
    }
}

/// Remote language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Generate endpoint URL. When unset the assistant answers from the
    /// knowledge base alone.
    pub endpoint: Option<String>,
    /// Model identifier sent with each request.
    pub model_name: String,
    /// Environment variable holding the bearer token, if any.
    pub api_key_env: String,
    /// Per-attempt request deadline.
    pub timeout_secs: u64,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    /// Retries beyond the initial attempt.
    pub max_retries: u32,
    /// Fixed wait before retrying after a quota failure.
    pub quota_backoff_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model_name: "gemini-2.0-flash-001".to_string(),
            api_key_env: "SHRINK_MODEL_TOKEN".to_string(),
            timeout_secs: 60,
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
            max_retries: 2,
            quota_backoff_ms: 2000,
        }
    }
}

/// Knowledge base settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Directory scanned recursively for markdown documents.
    pub doc_directory: String,
    /// Chunk size in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Maximum hits returned per search.
    pub max_results: usize,
    /// Minimum relevance (0.0 to 1.0) for a hit to be returned.
    pub min_relevance: f32,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            doc_directory: "Shrink_Documentation".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            max_results: 3,
            min_relevance: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ShrinkConfig::default();
        assert_eq!(config.general.port, 8080);
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.cache.reference_ttl_secs, 3600);
        assert_eq!(config.model.max_retries, 2);
        assert_eq!(config.model.top_k, 40);
        assert!(config.model.endpoint.is_none());
        assert_eq!(config.knowledge.chunk_size, 1000);
        assert_eq!(config.knowledge.chunk_overlap, 200);
        assert_eq!(config.knowledge.max_results, 3);
        assert_eq!(config.chat.report_confidence_threshold, 0.5);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
port = 9000
data_dir = "/srv/shrink"
log_level = "debug"

[cache]
reference_ttl_secs = 60

[model]
endpoint = "http://localhost:8081/v1/generate"
max_retries = 4
quota_backoff_ms = 10

[knowledge]
doc_directory = "/srv/docs"
min_relevance = 0.25
"#;
        let file = create_temp_config(content);
        let config = ShrinkConfig::load(file.path()).unwrap();
        assert_eq!(config.general.port, 9000);
        assert_eq!(config.general.data_dir, "/srv/shrink");
        assert_eq!(config.cache.reference_ttl_secs, 60);
        assert_eq!(
            config.model.endpoint.as_deref(),
            Some("http://localhost:8081/v1/generate")
        );
        assert_eq!(config.model.max_retries, 4);
        assert_eq!(config.model.quota_backoff_ms, 10);
        // Unset fields keep their defaults.
        assert_eq!(config.model.temperature, 0.7);
        assert_eq!(config.knowledge.min_relevance, 0.25);
        assert_eq!(config.knowledge.chunk_size, 1000);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[general]\nlog_level = \"warn\"\n");
        let config = ShrinkConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.port, 8080);
        assert_eq!(config.warehouse.path, "warehouse.db");
        assert!(config.chat.enabled);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ShrinkConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.shrink/data");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("[general\nport = ");
        let result = ShrinkConfig::load(file.path());
        assert!(matches!(result, Err(ShrinkError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ShrinkConfig::default();
        config.model.endpoint = Some("http://model.local/generate".to_string());
        config.save(&path).unwrap();

        let reloaded = ShrinkConfig::load(&path).unwrap();
        assert_eq!(reloaded.model.endpoint, config.model.endpoint);
        assert_eq!(reloaded.general.port, config.general.port);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let config: ShrinkConfig = toml::from_str("").unwrap();
        assert_eq!(config.chat.max_message_length, 2000);
        assert_eq!(config.chat.session_timeout_minutes, 30);
        assert_eq!(config.warehouse.default_row_limit, 500);
    }
}
