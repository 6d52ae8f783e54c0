mod executor;
mod job;
mod orchestrator;
mod plan;
mod retry;

pub use job::{JobOutcome, JobResult};

#[cfg(test)]
pub use job::GenerationJob;
pub use orchestrator::{ResultSink, RunReport, Scheduler, SchedulerConfig};
pub use plan::JobPlan;
