use crate::provider::GenerationRequest;
use crate::selection::Selection;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::job::{expand_jobs, GenerationJob};

/// Jobs for one run plus the shared request of each selected slide
#[derive(Debug, Clone)]
pub struct JobPlan {
    jobs: Vec<GenerationJob>,
    requests: BTreeMap<usize, Arc<GenerationRequest>>,
}

impl JobPlan {
    /// `build_request` is called once per selected slide; its first error
    /// aborts planning
    pub fn new<F, E>(selection: &Selection, copies: u32, mut build_request: F) -> Result<Self, E>
    where
        F: FnMut(usize) -> Result<GenerationRequest, E>,
    {
        let mut requests = BTreeMap::new();
        for slide in selection.iter() {
            requests.insert(slide, Arc::new(build_request(slide)?));
        }

        Ok(Self {
            jobs: expand_jobs(selection, copies),
            requests,
        })
    }

    pub fn jobs(&self) -> &[GenerationJob] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn request(&self, slide_index: usize) -> Option<Arc<GenerationRequest>> {
        self.requests.get(&slide_index).cloned()
    }
}
