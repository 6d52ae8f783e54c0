mod openrouter;
#[cfg(test)]
pub mod scripted;

pub use openrouter::OpenRouterClient;

use crate::error::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Everything needed to render one slide; identical for every variant and
/// every retry of that slide
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub slide_index: usize,
    pub system_prompt: String,
    pub user_prompt: String,
    /// Style reference image, shared by every request of a run
    pub reference_image: Option<Arc<[u8]>>,
    /// Background material (articles) sent ahead of the prompt
    pub context: Option<Arc<str>>,
}

/// A generated image payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    /// Mime type reported by the service, if any
    pub mime: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Connection,
    RateLimited,
    ServerError,
    MalformedResponse,
    Rejected,
    InvalidRequest,
    /// Abandoned by an external interrupt before finishing
    Cancelled,
    /// The job task itself died
    Panicked,
}

impl FailureKind {
    /// Map an HTTP error status onto a failure kind
    pub fn from_status(status: u16) -> Self {
        match status {
            408 => FailureKind::Timeout,
            429 => FailureKind::RateLimited,
            500..=599 => FailureKind::ServerError,
            _ => FailureKind::Rejected,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Connection => "connection",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::ServerError => "server_error",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::Rejected => "rejected",
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Panicked => "panicked",
        };
        write!(f, "{s}")
    }
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run one generation attempt for variant `variant` of the request's slide
    async fn generate(
        &self,
        request: &GenerationRequest,
        variant: u32,
    ) -> Result<Artifact, GenerationError>;
}
