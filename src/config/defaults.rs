use std::path::PathBuf;

pub fn default_config_path() -> PathBuf {
    PathBuf::from("slidegen.yaml")
}

pub fn default_concurrency() -> usize {
    36
}

pub fn default_copies() -> u32 {
    1
}

pub fn default_launch_delay_ms() -> u64 {
    0
}

pub fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

pub fn default_model() -> String {
    "google/gemini-3.1-flash-image-preview".to_string()
}

pub fn default_timeout_sec() -> u64 {
    120
}

pub fn default_max_attempts() -> u32 {
    3
}

pub fn default_backoff_base_ms() -> u64 {
    1000
}

pub fn default_backoff_max_ms() -> u64 {
    30_000
}
