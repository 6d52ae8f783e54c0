use crate::config::{Config, RetryConfig};
use crate::error::RunnerError;
use crate::provider::{FailureKind, ImageGenerator};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::AbortHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::executor::execute_job;
use super::job::{GenerationJob, JobOutcome, JobResult};
use super::plan::JobPlan;

/// Fixed scheduling parameters for one run
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub concurrency: usize,
    pub retry: RetryConfig,
    pub launch_delay: Duration,
}

impl SchedulerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            retry: config.retry.clone(),
            launch_delay: Duration::from_millis(config.launch_delay_ms),
        }
    }
}

/// Receives each job result as soon as the job finishes, in completion order
pub trait ResultSink {
    fn record(&mut self, result: &JobResult);
}

#[derive(Debug)]
pub struct RunReport {
    /// One result per planned job, ordered by (slide, variant)
    pub results: Vec<JobResult>,
    pub total_duration: Duration,
    pub cancelled: bool,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    generator: Arc<dyn ImageGenerator>,
    semaphore: Arc<Semaphore>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, generator: Arc<dyn ImageGenerator>) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
        Self {
            config,
            generator,
            semaphore,
        }
    }

    async fn next_permit(
        semaphore: Arc<Semaphore>,
        not_before: Instant,
    ) -> Result<OwnedSemaphorePermit, tokio::sync::AcquireError> {
        sleep_until(not_before).await;
        semaphore.acquire_owned().await
    }

    /// Execute every job in `plan`, forwarding each result to `sink` as it
    /// completes. Resolving `cancel` aborts in-flight jobs; jobs that never
    /// finished are reported as cancelled.
    pub async fn run<S, C>(
        &self,
        plan: &JobPlan,
        sink: &mut S,
        cancel: C,
    ) -> Result<RunReport, RunnerError>
    where
        S: ResultSink + ?Sized,
        C: Future<Output = ()>,
    {
        let start = std::time::Instant::now();
        let total = plan.len();

        info!(
            "Running {} generation job(s) via {} with concurrency {}",
            total,
            self.generator.name(),
            self.config.concurrency
        );

        let mut pending = plan.jobs().iter().copied();
        let mut next_job = pending.next();
        let mut next_launch_at = Instant::now();
        let mut in_flight = FuturesUnordered::new();
        let mut abort_handles: HashMap<GenerationJob, AbortHandle> = HashMap::new();
        let mut results: Vec<JobResult> = Vec::with_capacity(total);
        let mut cancelled = false;

        tokio::pin!(cancel);

        while next_job.is_some() || !in_flight.is_empty() {
            tokio::select! {
                biased;

                _ = &mut cancel => {
                    warn!("Run interrupted; abandoning {} in-flight job(s)", in_flight.len());
                    cancelled = true;
                    break;
                }

                Some((job, joined)) = in_flight.next(), if !in_flight.is_empty() => {
                    abort_handles.remove(&job);
                    let result = joined_result(job, joined);
                    self.finish(result, sink, &mut results, total);
                }

                permit = Self::next_permit(self.semaphore.clone(), next_launch_at), if next_job.is_some() => {
                    let permit = permit?;
                    let Some(job) = next_job.take() else { continue };
                    next_job = pending.next();
                    next_launch_at = Instant::now() + self.config.launch_delay;

                    let Some(request) = plan.request(job.slide_index) else {
                        let result = JobResult::failed(
                            job,
                            FailureKind::InvalidRequest,
                            "no request planned for slide",
                        );
                        self.finish(result, sink, &mut results, total);
                        continue;
                    };

                    debug!("Launching {}", job);
                    let generator = self.generator.clone();
                    let retry = self.config.retry.clone();
                    let handle = tokio::spawn(async move {
                        let _permit = permit; // hold until done
                        execute_job(generator, request, job, retry).await
                    });
                    abort_handles.insert(job, handle.abort_handle());
                    in_flight.push(async move { (job, handle.await) });
                }
            }
        }

        if cancelled {
            for handle in abort_handles.values() {
                handle.abort();
            }
            // Jobs that finished before the abort landed still count
            while let Some((job, joined)) = in_flight.next().await {
                let result = joined_result(job, joined);
                self.finish(result, sink, &mut results, total);
            }
            for job in next_job.into_iter().chain(pending) {
                self.finish(JobResult::cancelled(job), sink, &mut results, total);
            }
        }

        results.sort_by_key(|r| r.job);

        Ok(RunReport {
            results,
            total_duration: start.elapsed(),
            cancelled,
        })
    }

    fn finish<S>(
        &self,
        mut result: JobResult,
        sink: &mut S,
        results: &mut Vec<JobResult>,
        total: usize,
    ) where
        S: ResultSink + ?Sized,
    {
        sink.record(&result);
        result.release_payload();

        match &result.outcome {
            JobOutcome::Succeeded(_) => info!(
                "[{}/{}] {} done ({} attempt(s), {:.1}s)",
                results.len() + 1,
                total,
                result.job,
                result.attempts,
                result.duration.as_secs_f64()
            ),
            JobOutcome::Failed { kind, message } => warn!(
                "[{}/{}] {} failed ({}): {}",
                results.len() + 1,
                total,
                result.job,
                kind,
                message
            ),
        }

        results.push(result);
    }
}

fn joined_result(
    job: GenerationJob,
    joined: Result<JobResult, tokio::task::JoinError>,
) -> JobResult {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => JobResult::cancelled(job),
        Err(e) => {
            warn!("Task for {} panicked: {}", job, e);
            JobResult::failed(job, FailureKind::Panicked, e.to_string())
        }
    }
}
