mod defaults;
mod types;

pub use defaults::default_config_path;
pub use types::*;

use crate::error::ConfigError;
use defaults::*;
use std::path::Path;

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            copies: default_copies(),
            launch_delay_ms: default_launch_delay_ms(),
            output_dir: None,
            retry: RetryConfig::default(),
            service: ServiceConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from `path`, falling back to defaults when the file is
    /// absent and `required` is false
    pub fn load_or_default(path: &Path, required: bool) -> Result<Self, ConfigError> {
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.copies == 0 {
            return Err(ConfigError::InvalidValue {
                field: "copies",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.retry.backoff_max_ms < self.retry.backoff_base_ms {
            return Err(ConfigError::InvalidValue {
                field: "retry.backoff_max_ms",
                reason: format!(
                    "must be >= retry.backoff_base_ms ({})",
                    self.retry.backoff_base_ms
                ),
            });
        }
        if self.service.timeout_sec == 0 {
            return Err(ConfigError::InvalidValue {
                field: "service.timeout_sec",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// API key, trimmed; required before any request is sent
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.service
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }
}
