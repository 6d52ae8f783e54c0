use crate::config::RetryConfig;
use crate::provider::{GenerationRequest, ImageGenerator};
use std::sync::Arc;
use tracing::{debug, warn};

use super::job::{GenerationJob, JobOutcome, JobResult};
use super::retry::{retry_with_backoff, ErrorClass};

/// Drive one job to a terminal result, retrying retryable failures
pub async fn execute_job(
    generator: Arc<dyn ImageGenerator>,
    request: Arc<GenerationRequest>,
    job: GenerationJob,
    retry: RetryConfig,
) -> JobResult {
    let start = std::time::Instant::now();
    debug!("Starting {} via {}", job, generator.name());
    let variant = job.variant;

    let retried = retry_with_backoff(
        &retry,
        |e| ErrorClass::of(e) == ErrorClass::Retryable,
        || {
            let generator = generator.clone();
            let request = request.clone();
            async move { generator.generate(&request, variant).await }
        },
    )
    .await;

    let outcome = match retried.result {
        Ok(artifact) => {
            debug!(
                "{} produced {} bytes after {} attempt(s)",
                job,
                artifact.bytes.len(),
                retried.attempts
            );
            JobOutcome::Succeeded(artifact)
        }
        Err(e) => {
            warn!("{} failed after {} attempt(s): {}", job, retried.attempts, e);
            JobOutcome::Failed {
                kind: e.kind,
                message: e.message,
            }
        }
    };

    JobResult {
        job,
        outcome,
        attempts: retried.attempts,
        duration: start.elapsed(),
    }
}
