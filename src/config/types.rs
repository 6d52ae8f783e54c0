use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::defaults::*;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct Config {
    /// Maximum number of generation requests in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Number of image variants generated per slide
    #[serde(default = "default_copies")]
    pub copies: u32,

    /// Pause between consecutive job launches, to soften burst rate limits
    #[serde(default = "default_launch_delay_ms")]
    pub launch_delay_ms: u64,

    /// Output directory; a timestamped directory is used when unset
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// HTTP(S) or SOCKS5 proxy URL
    #[serde(default)]
    pub proxy: Option<String>,

    /// Per-attempt request timeout
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            proxy: None,
            timeout_sec: default_timeout_sec(),
        }
    }
}
