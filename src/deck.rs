//! One invocation end to end: outline → selection → jobs → artifacts → document

use crate::error::{AssemblyError, DeckError, SelectionError};
use crate::outline::{parse_outline, Outline};
use crate::output::{
    build_summary, write_summary, ArtifactStore, Assembled, Assembler, DocumentCombiner,
    RunSummary, SummaryContext,
};
use crate::prompt::PromptInputs;
use crate::runner::{JobPlan, Scheduler};
use crate::selection::Selection;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Where the visual style of every slide comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleSource {
    ReferenceImage,
    OutlineStyle,
    Adaptive,
}

impl fmt::Display for StyleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleSource::ReferenceImage => write!(f, "reference image"),
            StyleSource::OutlineStyle => write!(f, "outline style section"),
            StyleSource::Adaptive => write!(f, "adaptive default"),
        }
    }
}

/// Inputs for one deck run
#[derive(Debug, Clone, Default)]
pub struct DeckInput {
    pub outline_text: String,
    pub pages: Option<String>,
    /// Generate slide 1 only
    pub preview: bool,
    pub copies: u32,
    pub style_image: Option<Arc<[u8]>>,
    pub article_context: Option<Arc<str>>,
}

/// Parsed and planned deck, ready to generate
pub struct Deck {
    outline: Outline,
    selection: Selection,
    copies: u32,
    plan: JobPlan,
    style: StyleSource,
}

/// Everything a finished run produced
pub struct DeckRun {
    pub summary: RunSummary,
    pub assembly: Result<Assembled, AssemblyError>,
}

impl Deck {
    /// Parse and plan without side effects; every input error surfaces here
    pub fn prepare(input: DeckInput) -> Result<Self, DeckError> {
        let outline = parse_outline(&input.outline_text)?;
        let selection = if input.preview {
            Selection::resolve(Some("1"), outline.len())?
        } else {
            Selection::resolve(input.pages.as_deref(), outline.len())?
        };
        let copies = input.copies.max(1);

        let style = if input.style_image.is_some() {
            StyleSource::ReferenceImage
        } else if outline.global_style.is_some() {
            StyleSource::OutlineStyle
        } else {
            StyleSource::Adaptive
        };

        let prompts = PromptInputs::new(&outline, input.style_image, input.article_context);
        let plan = JobPlan::new(&selection, copies, |index| {
            let slide = outline
                .slide(index)
                .ok_or_else(|| SelectionError::InvalidSelection {
                    token: index.to_string(),
                    reason: format!("outline has only {} slide(s)", outline.len()),
                })?;
            Ok::<_, SelectionError>(prompts.request(&outline, slide))
        })?;

        Ok(Self {
            outline,
            selection,
            copies,
            plan,
            style,
        })
    }

    pub fn plan(&self) -> &JobPlan {
        &self.plan
    }

    #[cfg(test)]
    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    #[cfg(test)]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[cfg(test)]
    pub fn style(&self) -> StyleSource {
        self.style
    }

    /// Human-readable execution plan for `--dry-run`
    pub fn describe(&self) -> String {
        let mut out = format!(
            "Outline: {} slide(s)\nSelection: {} ({} slide(s))\nCopies: {}\nJobs: {}\nStyle: {}\n",
            self.outline.len(),
            self.selection,
            self.selection.len(),
            self.copies,
            self.plan.len(),
            self.style
        );
        out.push_str("\nSlides:\n");
        for slide in &self.outline.slides {
            let marker = if self.selection.contains(slide.index) {
                "*"
            } else {
                " "
            };
            out.push_str(&format!("  {} {:>3}. {}", marker, slide.index, slide.title));
            if let Some(hint) = &slide.visual_hint {
                out.push_str(&format!("  [visual: {}]", hint));
            }
            out.push('\n');
        }
        out
    }

    /// Run every planned job, persist results into `store` as they arrive and
    /// assemble the combined document. Assembly failures are part of the
    /// returned [`DeckRun`] so the summary is always available.
    pub async fn generate<S, C>(
        &self,
        scheduler: &Scheduler,
        store: S,
        combiner: &dyn DocumentCombiner,
        cancel: C,
    ) -> Result<DeckRun, DeckError>
    where
        S: ArtifactStore,
        C: Future<Output = ()>,
    {
        let mut assembler = Assembler::open(store, self.outline.len(), self.copies)?;
        let run_id = assembler.run_id();
        let output_dir = assembler.location().to_path_buf();
        info!("Run {} writing to {}", run_id, output_dir.display());

        let report = scheduler.run(&self.plan, &mut assembler, cancel).await?;
        let assembly = assembler.finish(combiner);

        let summary = build_summary(
            SummaryContext {
                run_id: run_id.to_string(),
                output_dir: &output_dir,
                selection: self.selection.to_string(),
                copies: self.copies,
            },
            &report,
            assembly.as_ref().map_err(|e| e.to_string()),
        );
        if let Err(e) = write_summary(&output_dir, &summary) {
            warn!("Failed to write run summary: {}", e);
        }

        Ok(DeckRun { summary, assembly })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::error::{OutlineError, SelectionError};
    use crate::output::{FsArtifactStore, RunStatus, MANIFEST_FILE};
    use crate::provider::scripted::{Behavior, ScriptedGenerator};
    use crate::runner::SchedulerConfig;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    const OUTLINE: &str = "\
# Quarterly review

## Design Standards
Palette: teal and white

## Slide 1: Welcome
Hello

## Slide 2: Results
- Up
- Right

## Slide 3: Next steps
[Visual: a road]
Keep going
";

    struct JoinCombiner;

    impl DocumentCombiner for JoinCombiner {
        fn file_name(&self) -> &str {
            "deck.bin"
        }

        fn combine(&self, pages: &[Vec<u8>]) -> Result<Vec<u8>, AssemblyError> {
            Ok(pages.join(&b'\n'))
        }
    }

    fn input(pages: Option<&str>, copies: u32) -> DeckInput {
        DeckInput {
            outline_text: OUTLINE.to_string(),
            pages: pages.map(str::to_string),
            copies,
            ..Default::default()
        }
    }

    fn scheduler(generator: ScriptedGenerator) -> Scheduler {
        let config = SchedulerConfig {
            concurrency: 4,
            retry: RetryConfig {
                max_attempts: 2,
                backoff_base_ms: 1,
                backoff_max_ms: 2,
            },
            launch_delay: Duration::ZERO,
        };
        Scheduler::new(config, Arc::new(generator))
    }

    fn document_lines(dir: &Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("deck.bin"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// `img-slide2-v1-call1` → `2.1`
    fn payload_key(line: &str) -> String {
        let rest = line.split("-slide").nth(1).unwrap();
        let mut parts = rest.split('-');
        let slide = parts.next().unwrap();
        let variant = parts.next().unwrap().trim_start_matches('v');
        format!("{slide}.{variant}")
    }

    async fn generate(deck: &Deck, generator: ScriptedGenerator, dir: &Path) -> DeckRun {
        deck.generate(
            &scheduler(generator),
            FsArtifactStore::new(dir),
            &JoinCombiner,
            std::future::pending(),
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_prepare_plans_every_selected_variant() {
        let deck = Deck::prepare(input(None, 2)).unwrap();
        assert_eq!(deck.outline().len(), 3);
        assert_eq!(deck.plan().len(), 6);
        assert_eq!(deck.style(), StyleSource::OutlineStyle);

        let request = deck.plan().request(3).unwrap();
        assert!(request.user_prompt.contains("Next steps"));
        assert!(request.user_prompt.contains("a road"));
        assert!(request.system_prompt.contains("teal and white"));
    }

    #[test]
    fn test_prepare_rejects_bad_input() {
        let err = Deck::prepare(input(Some("2-5"), 1)).err().unwrap();
        assert!(matches!(
            err,
            DeckError::Selection(SelectionError::InvalidSelection { .. })
        ));

        let empty = DeckInput {
            outline_text: "no headings here".to_string(),
            copies: 1,
            ..Default::default()
        };
        let err = Deck::prepare(empty).err().unwrap();
        assert!(matches!(err, DeckError::Outline(OutlineError::EmptyOutline)));
    }

    #[test]
    fn test_preview_selects_first_slide() {
        let deck = Deck::prepare(DeckInput {
            preview: true,
            ..input(Some("3"), 3)
        })
        .unwrap();
        assert_eq!(deck.selection().iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(deck.plan().len(), 3);
    }

    #[test]
    fn test_reference_image_wins_style() {
        let deck = Deck::prepare(DeckInput {
            style_image: Some(Arc::from(vec![0u8; 4])),
            ..input(None, 1)
        })
        .unwrap();
        assert_eq!(deck.style(), StyleSource::ReferenceImage);
        assert!(deck.describe().contains("Style: reference image"));
    }

    #[tokio::test]
    async fn test_full_run_produces_ordered_document() {
        let dir = TempDir::new().unwrap();
        let deck = Deck::prepare(input(None, 2)).unwrap();

        let run = generate(
            &deck,
            ScriptedGenerator::new().with_delay(Duration::from_millis(2)),
            dir.path(),
        )
        .await;

        assert_eq!(run.summary.status, RunStatus::FullSuccess);
        assert_eq!(run.summary.succeeded, 6);
        assert_eq!(run.assembly.unwrap().pages, 6);
        let lines = document_lines(dir.path());
        let slides: Vec<&str> = lines.iter().map(|l| &l[4..11]).collect();
        assert_eq!(
            slides,
            vec!["slide1-", "slide1-", "slide2-", "slide2-", "slide3-", "slide3-"]
        );
        assert!(dir.path().join("summary.json").is_file());
        assert!(dir.path().join(MANIFEST_FILE).is_file());
    }

    #[tokio::test]
    async fn test_failed_slide_gives_partial_success() {
        let dir = TempDir::new().unwrap();
        let deck = Deck::prepare(input(None, 2)).unwrap();

        let run = generate(
            &deck,
            ScriptedGenerator::new().with(2, Behavior::Fatal),
            dir.path(),
        )
        .await;

        assert_eq!(run.summary.status, RunStatus::PartialSuccess);
        assert_eq!(run.summary.failed.len(), 2);
        assert!(run.summary.failed.iter().all(|f| f.slide == 2));
        assert_eq!(document_lines(dir.path()).len(), 4);
    }

    #[tokio::test]
    async fn test_one_exhausted_variant_leaves_its_sibling_in_the_document() {
        let dir = TempDir::new().unwrap();
        let deck = Deck::prepare(input(None, 2)).unwrap();

        let run = generate(
            &deck,
            ScriptedGenerator::new()
                .with_variant(2, 1, Behavior::AlwaysRetryable)
                .with_delay(Duration::from_millis(2)),
            dir.path(),
        )
        .await;

        assert_eq!(run.summary.status, RunStatus::PartialSuccess);
        assert_eq!(run.summary.succeeded, 5);
        assert_eq!(run.summary.failed.len(), 1);
        let failed = &run.summary.failed[0];
        assert_eq!((failed.slide, failed.variant), (2, 1));
        assert_eq!(failed.attempts, 2);

        assert!(!dir.path().join("slide_p02_v01.png").exists());
        assert!(dir.path().join("slide_p02_v02.png").is_file());
        let order: Vec<String> = document_lines(dir.path())
            .iter()
            .map(|l| payload_key(l))
            .collect();
        assert_eq!(order, ["1.1", "1.2", "2.2", "3.1", "3.2"]);
    }

    #[tokio::test]
    async fn test_rerun_one_slide_keeps_others() {
        let dir = TempDir::new().unwrap();
        let full = Deck::prepare(input(None, 2)).unwrap();
        generate(&full, ScriptedGenerator::new().with_tag("old"), dir.path()).await;
        let before = std::fs::read(dir.path().join("slide_p01_v01.png")).unwrap();

        let only_third = Deck::prepare(input(Some("3"), 2)).unwrap();
        let run = generate(&only_third, ScriptedGenerator::new().with_tag("new"), dir.path()).await;

        assert_eq!(run.summary.total_jobs, 2);
        assert_eq!(run.assembly.unwrap().manifest_entries, 6);
        assert_eq!(
            std::fs::read(dir.path().join("slide_p01_v01.png")).unwrap(),
            before
        );
        let lines = document_lines(dir.path());
        assert_eq!(lines.len(), 6);
        assert!(lines[..4].iter().all(|l| l.starts_with("old-")));
        assert!(lines[4..].iter().all(|l| l.starts_with("new-slide3")));
    }

    #[tokio::test]
    async fn test_all_failed_is_total_failure() {
        let dir = TempDir::new().unwrap();
        let deck = Deck::prepare(input(Some("1"), 2)).unwrap();

        let run = generate(
            &deck,
            ScriptedGenerator::new().with(1, Behavior::AlwaysRetryable),
            dir.path(),
        )
        .await;

        assert_eq!(run.summary.status, RunStatus::TotalFailure);
        assert!(matches!(
            run.assembly,
            Err(AssemblyError::NoArtifactsProduced { failed: 2 })
        ));
        assert!(!dir.path().join("deck.bin").exists());
        assert!(dir.path().join(MANIFEST_FILE).is_file());
    }
}
