//! Unified secret resolution from multiple sources.
//!
//! Provider API keys can come from several sources depending on the
//! deployment, resolved in priority order:
//!
//! 1. **Direct value** - For quick local testing (e.g., `apiKey: "sk-..."`)
//! 2. **File reference** - For Docker secrets pattern (e.g., `apiKeyFile: /run/secrets/key`)
//! 3. **Env var reference** - For production (e.g., `apiKeyEnvVar: EMOTION_API_KEY`)

use secrecy::SecretString;
use std::fs;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// Result type for secret resolution.
pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from multiple sources in priority order:
/// 1. Direct value (if provided and non-empty)
/// 2. File contents (if path provided)
/// 3. Environment variable (if name provided)
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct {
        if !value.is_empty() {
            return Ok(SecretString::from(value.to_string()));
        }
    }

    if let Some(path) = file_path {
        if !path.is_empty() {
            let content = fs::read_to_string(path).map_err(|e| SecretError::FileReadError {
                path: path.to_string(),
                source: e,
            })?;
            return Ok(SecretString::from(content.trim_end().to_string()));
        }
    }

    if let Some(name) = env_var {
        if !name.is_empty() {
            return match std::env::var(name) {
                Ok(value) => Ok(SecretString::from(value)),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }
    }

    Err(SecretError::NoSourceProvided)
}
