//! Configuration management for reqvector.
//!
//! Settings come from an optional TOML file, then environment variables
//! (including a `.env` file loaded at startup), then CLI flags. Everything is
//! resolved once in the CLI layer and passed down explicitly.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::llm::LlmConfig;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "reqvector.toml";

/// Configuration faults. All of them abort before any work is done.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API key not set: set DEEPSEEK_API_KEY (environment or .env) or pass --api-key")]
    MissingApiKey,

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid setting: {0}")]
    Invalid(String),

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(String),
}

/// Annotation run defaults that can live in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotateSettings {
    /// Rows per API call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between batches, in seconds
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,
}

fn default_batch_size() -> usize {
    10
}

fn default_delay_secs() -> f64 {
    0.5
}

impl Default for AnnotateSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            delay_secs: default_delay_secs(),
        }
    }
}

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub annotate: AnnotateSettings,
}

impl Settings {
    /// Load settings from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists,
    /// or defaults. Environment overrides are applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)?
                } else {
                    Self::default()
                }
            }
        };

        Ok(Self {
            llm: settings.llm.with_env_overrides(),
            ..settings
        })
    }

    /// Parse a TOML config file without applying any overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.annotate.batch_size, 10);
        assert_eq!(settings.annotate.delay_secs, 0.5);
    }

    #[test]
    fn test_partial_toml() {
        let settings = Settings::from_toml(
            r#"
            [llm]
            model = "deepseek-reasoner"
            timeout_secs = 120

            [annotate]
            batch_size = 5
            "#,
        )
        .unwrap();
        assert_eq!(settings.llm.model, "deepseek-reasoner");
        assert_eq!(settings.llm.timeout_secs, Some(120));
        assert_eq!(settings.llm.max_tokens, 4000);
        assert_eq!(settings.annotate.batch_size, 5);
        assert_eq!(settings.annotate.delay_secs, 0.5);
    }

    #[test]
    fn test_from_file_errors() {
        let missing = Settings::from_file(Path::new("/nonexistent/reqvector.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[annotate]\nbatch_size = \"ten\"").unwrap();
        let invalid = Settings::from_file(file.path());
        assert!(matches!(invalid, Err(ConfigError::Parse { .. })));
    }
}
