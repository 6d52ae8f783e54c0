//! Deterministic in-process generator for scheduler and pipeline tests

use super::{Artifact, FailureKind, GenerationRequest, ImageGenerator};
use crate::error::GenerationError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Succeed,
    /// Every call fails with a server error
    AlwaysRetryable,
    /// Every call is rejected
    Fatal,
    /// The first `n` calls for each variant fail with a server error
    FailFirst(u32),
}

pub struct ScriptedGenerator {
    /// Per slide, applying to every variant
    behaviors: HashMap<usize, Behavior>,
    /// Per (slide, variant); wins over the slide-wide entry
    variant_behaviors: HashMap<(usize, u32), Behavior>,
    delay: Duration,
    calls: Mutex<HashMap<(usize, u32), u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    tag: String,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
            variant_behaviors: HashMap::new(),
            delay: Duration::ZERO,
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            tag: "img".to_string(),
        }
    }

    pub fn with(mut self, slide: usize, behavior: Behavior) -> Self {
        self.behaviors.insert(slide, behavior);
        self
    }

    pub fn with_variant(mut self, slide: usize, variant: u32, behavior: Behavior) -> Self {
        self.variant_behaviors.insert((slide, variant), behavior);
        self
    }

    /// Base delay per call; varied per slide so completion order shuffles
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Prefix for generated payloads, to tell runs apart
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    /// Calls made for every variant of `slide`
    pub fn calls(&self, slide: usize) -> u32 {
        self.calls
            .lock()
            .map(|c| {
                c.iter()
                    .filter(|((s, _), _)| *s == slide)
                    .map(|(_, n)| *n)
                    .sum()
            })
            .unwrap_or(0)
    }

    pub fn variant_calls(&self, slide: usize, variant: u32) -> u32 {
        self.calls
            .lock()
            .map(|c| c.get(&(slide, variant)).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        variant: u32,
    ) -> Result<Artifact, GenerationError> {
        let slide = request.slide_index;
        let call = {
            let mut calls = self.calls.lock().map_err(|_| {
                GenerationError::new(FailureKind::InvalidRequest, "poisoned call counter")
            })?;
            let n = calls.entry((slide, variant)).or_insert(0);
            *n += 1;
            *n
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            let factor = (slide as u32 * 7) % 5 + 1;
            tokio::time::sleep(self.delay * factor).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let behavior = self
            .variant_behaviors
            .get(&(slide, variant))
            .or_else(|| self.behaviors.get(&slide))
            .copied()
            .unwrap_or(Behavior::Succeed);
        let server_error = || {
            GenerationError::new(
                FailureKind::ServerError,
                format!("slide {slide} variant {variant} call {call}"),
            )
        };
        match behavior {
            Behavior::AlwaysRetryable => Err(server_error()),
            Behavior::Fatal => Err(GenerationError::new(
                FailureKind::Rejected,
                "content policy violation",
            )),
            Behavior::FailFirst(n) if call <= n => Err(server_error()),
            Behavior::Succeed | Behavior::FailFirst(_) => Ok(Artifact {
                bytes: format!("{}-slide{}-v{}-call{}", self.tag, slide, variant, call)
                    .into_bytes(),
                mime: Some("image/png".to_string()),
            }),
        }
    }
}
