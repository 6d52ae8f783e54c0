use crate::output::ArtifactKey;
use crate::provider::{Artifact, FailureKind};
use crate::selection::Selection;
use std::fmt;
use std::time::Duration;

/// The unit of concurrent work: one variant of one slide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenerationJob {
    pub slide_index: usize,
    pub variant: u32,
}

impl GenerationJob {
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey {
            slide: self.slide_index,
            variant: self.variant,
        }
    }
}

impl fmt::Display for GenerationJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slide {} variant {}", self.slide_index, self.variant)
    }
}

/// Slide-major, variant-minor expansion of a selection
pub fn expand_jobs(selection: &Selection, copies: u32) -> Vec<GenerationJob> {
    selection
        .iter()
        .flat_map(|slide_index| {
            (1..=copies).map(move |variant| GenerationJob {
                slide_index,
                variant,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded(Artifact),
    Failed { kind: FailureKind, message: String },
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub job: GenerationJob,
    pub outcome: JobOutcome,
    pub attempts: u32,
    pub duration: Duration,
}

impl JobResult {
    pub fn failed(job: GenerationJob, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            job,
            outcome: JobOutcome::Failed {
                kind,
                message: message.into(),
            },
            attempts: 0,
            duration: Duration::ZERO,
        }
    }

    pub fn cancelled(job: GenerationJob) -> Self {
        Self::failed(job, FailureKind::Cancelled, "run interrupted before completion")
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Succeeded(_))
    }

    /// Drop the image bytes once they have been persisted
    pub fn release_payload(&mut self) {
        if let JobOutcome::Succeeded(artifact) = &mut self.outcome {
            artifact.bytes = Vec::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::parse_selection;

    #[test]
    fn test_expand_slide_major() {
        let selection = parse_selection("3,1", 3).unwrap();
        let jobs = expand_jobs(&selection, 2);
        let pairs: Vec<(usize, u32)> = jobs.iter().map(|j| (j.slide_index, j.variant)).collect();
        assert_eq!(pairs, vec![(1, 1), (1, 2), (3, 1), (3, 2)]);
    }

    #[test]
    fn test_expand_count() {
        let selection = Selection::all(5);
        assert_eq!(expand_jobs(&selection, 3).len(), 15);
    }

    #[test]
    fn test_release_payload_keeps_outcome() {
        let mut result = JobResult {
            job: GenerationJob {
                slide_index: 1,
                variant: 1,
            },
            outcome: JobOutcome::Succeeded(Artifact {
                bytes: vec![1, 2, 3],
                mime: Some("image/png".to_string()),
            }),
            attempts: 1,
            duration: Duration::ZERO,
        };
        result.release_payload();
        assert!(result.is_success());
        match &result.outcome {
            JobOutcome::Succeeded(artifact) => assert!(artifact.bytes.is_empty()),
            JobOutcome::Failed { .. } => unreachable!(),
        }
    }
}
