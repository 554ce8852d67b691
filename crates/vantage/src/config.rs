//! Orchestrator configuration.
//!
//! Loaded from a JSON file (or built directly by the host), validated
//! before use. API keys are declared as secret sources and resolved at
//! adapter construction, never stored in plain fields.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::secrets::{resolve_secret, SecretError};

/// Default emotion provider API base.
const DEFAULT_EMOTION_BASE_URL: &str = "https://api.hume.ai";

/// Default content provider API base.
const DEFAULT_CONTENT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

fn default_emotion_endpoint() -> ProviderEndpoint {
    ProviderEndpoint {
        base_url: DEFAULT_EMOTION_BASE_URL.to_string(),
        api_key: SecretSource {
            value: None,
            file: None,
            env_var: Some("VANTAGE_EMOTION_API_KEY".to_string()),
        },
    }
}

fn default_content_endpoint() -> ProviderEndpoint {
    ProviderEndpoint {
        base_url: DEFAULT_CONTENT_BASE_URL.to_string(),
        api_key: SecretSource {
            value: None,
            file: None,
            env_var: Some("VANTAGE_CONTENT_API_KEY".to_string()),
        },
    }
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_poll_timeout_secs() -> u64 {
    480
}

fn default_max_retries() -> u32 {
    3
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".vantage").join("data"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Where an API key comes from, resolved in priority order:
/// direct value, file contents, environment variable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSource {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub env_var: Option<String>,
}

impl SecretSource {
    pub fn resolve(&self) -> Result<secrecy::SecretString, SecretError> {
        resolve_secret(
            self.value.as_deref(),
            self.file.as_deref().and_then(|p| p.to_str()),
            self.env_var.as_deref(),
        )
    }
}

/// One provider's API endpoint and credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEndpoint {
    pub base_url: String,
    #[serde(default)]
    pub api_key: SecretSource,
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorConfig {
    /// Base directory for local persistence (database, results files).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Fixed polling cadence for in-flight jobs.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Overall bound on a poll loop before the job fails with a timeout.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// Upload retry budget per job.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_emotion_endpoint")]
    pub emotion: ProviderEndpoint,

    #[serde(default = "default_content_endpoint")]
    pub content: ProviderEndpoint,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
            max_retries: default_max_retries(),
            emotion: default_emotion_endpoint(),
            content: default_content_endpoint(),
        }
    }
}

impl OrchestratorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    /// Directory canonical results files are written to.
    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join("results")
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<OrchestratorConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<OrchestratorConfig, ConfigError> {
    let config: OrchestratorConfig = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &OrchestratorConfig) -> Result<(), ConfigError> {
    if !(5..=30).contains(&config.poll_interval_secs) {
        return Err(ConfigError::Validation {
            message: format!(
                "pollIntervalSecs must be between 5 and 30, got {}",
                config.poll_interval_secs
            ),
        });
    }

    if !(300..=600).contains(&config.poll_timeout_secs) {
        return Err(ConfigError::Validation {
            message: format!(
                "pollTimeoutSecs must be between 300 and 600, got {}",
                config.poll_timeout_secs
            ),
        });
    }

    if config.max_retries == 0 {
        return Err(ConfigError::Validation {
            message: "maxRetries must be at least 1".to_string(),
        });
    }

    for (name, endpoint) in [("emotion", &config.emotion), ("content", &config.content)] {
        if endpoint.base_url.is_empty() {
            return Err(ConfigError::Validation {
                message: format!("{}.baseUrl must not be empty", name),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = OrchestratorConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.poll_timeout(), Duration::from_secs(480));
        assert_eq!(config.max_retries, 3);
        assert!(config.results_dir().ends_with("results"));
    }

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str("{}").unwrap();
        assert_eq!(config.emotion.base_url, DEFAULT_EMOTION_BASE_URL);
        assert_eq!(config.content.base_url, DEFAULT_CONTENT_BASE_URL);
    }

    #[test]
    fn test_load_full_config() {
        let config = load_config_from_str(
            r#"{
                "dataDir": "/var/lib/vantage",
                "pollIntervalSecs": 5,
                "pollTimeoutSecs": 600,
                "maxRetries": 2,
                "emotion": {
                    "baseUrl": "https://emotion.test",
                    "apiKey": { "value": "k1" }
                },
                "content": {
                    "baseUrl": "https://content.test",
                    "apiKey": { "envVar": "CONTENT_KEY" }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/vantage"));
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.emotion.base_url, "https://emotion.test");
        assert_eq!(config.content.api_key.env_var.as_deref(), Some("CONTENT_KEY"));
    }

    #[test]
    fn test_interval_out_of_range_rejected() {
        let err = load_config_from_str(r#"{"pollIntervalSecs": 1}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));

        let err = load_config_from_str(r#"{"pollIntervalSecs": 60}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_timeout_out_of_range_rejected() {
        let err = load_config_from_str(r#"{"pollTimeoutSecs": 60}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_zero_retries_rejected() {
        let err = load_config_from_str(r#"{"maxRetries": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_secret_source_direct_value() {
        use secrecy::ExposeSecret;
        let source = SecretSource {
            value: Some("direct-key".to_string()),
            file: None,
            env_var: None,
        };
        assert_eq!(source.resolve().unwrap().expose_secret(), "direct-key");
    }
}
