use crate::error::OutputError;
use crate::provider::FailureKind;
use crate::runner::{JobOutcome, RunReport};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::assembler::Assembled;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    FullSuccess,
    PartialSuccess,
    TotalFailure,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::FullSuccess => 0,
            RunStatus::PartialSuccess => 2,
            RunStatus::TotalFailure => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedJob {
    pub slide: usize,
    pub variant: u32,
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub timestamp: String,
    pub run_id: String,
    pub output_dir: PathBuf,
    pub status: RunStatus,
    pub selection: String,
    pub copies: u32,
    pub duration_sec: f64,
    pub total_jobs: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedJob>,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<PathBuf>,
    /// Pages in the document, counting artifacts kept from earlier runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_pages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts_on_disk: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Facts about the run that the report itself does not carry
pub struct SummaryContext<'a> {
    pub run_id: String,
    pub output_dir: &'a Path,
    pub selection: String,
    pub copies: u32,
}

pub fn build_summary(
    ctx: SummaryContext<'_>,
    report: &RunReport,
    assembly: Result<&Assembled, String>,
) -> RunSummary {
    let failed: Vec<FailedJob> = report
        .failures()
        .filter_map(|r| match &r.outcome {
            JobOutcome::Failed { kind, message } => Some(FailedJob {
                slide: r.job.slide_index,
                variant: r.job.variant,
                kind: *kind,
                message: message.clone(),
                attempts: r.attempts,
            }),
            JobOutcome::Succeeded(_) => None,
        })
        .collect();

    let succeeded = report.succeeded();
    let total_jobs = report.results.len();
    let (document, document_pages, artifacts_on_disk, error) = match assembly {
        Ok(assembled) => (
            Some(assembled.document.clone()),
            Some(assembled.pages),
            Some(assembled.manifest_entries),
            None,
        ),
        Err(e) => (None, None, None, Some(e)),
    };

    let status = if error.is_some() || succeeded == 0 {
        RunStatus::TotalFailure
    } else if succeeded == total_jobs {
        RunStatus::FullSuccess
    } else {
        RunStatus::PartialSuccess
    };

    RunSummary {
        timestamp: Utc::now().to_rfc3339(),
        run_id: ctx.run_id,
        output_dir: ctx.output_dir.to_path_buf(),
        status,
        selection: ctx.selection,
        copies: ctx.copies,
        duration_sec: report.total_duration.as_secs_f64(),
        total_jobs,
        succeeded,
        failed,
        cancelled: report.cancelled,
        document,
        document_pages,
        artifacts_on_disk,
        error,
    }
}

pub fn write_summary(output_dir: &Path, summary: &RunSummary) -> Result<(), OutputError> {
    fs::create_dir_all(output_dir).map_err(OutputError::CreateDir)?;

    let json = serde_json::to_string_pretty(summary)?;
    fs::write(output_dir.join("summary.json"), json).map_err(OutputError::WriteSummary)?;

    let md = build_summary_markdown(summary);
    fs::write(output_dir.join("summary.md"), md).map_err(OutputError::WriteSummary)?;

    Ok(())
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::FullSuccess => "✅ full success",
        RunStatus::PartialSuccess => "⚠️ partial success",
        RunStatus::TotalFailure => "❌ total failure",
    }
}

fn build_summary_markdown(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str("# slidegen Summary\n\n");
    md.push_str(&format!("**Generated:** {}\n", summary.timestamp));
    md.push_str(&format!("**Run:** {}\n", summary.run_id));
    md.push_str(&format!(
        "**Output Dir:** {}\n",
        summary.output_dir.display()
    ));
    md.push_str(&format!("**Duration:** {:.1}s\n", summary.duration_sec));
    md.push_str(&format!("**Status:** {}\n\n", status_label(summary.status)));

    md.push_str("## Jobs\n\n");
    md.push_str("| Slides | Copies | Succeeded | Failed |\n");
    md.push_str("|--------|--------|-----------|--------|\n");
    md.push_str(&format!(
        "| {} | {} | {}/{} | {} |\n\n",
        summary.selection,
        summary.copies,
        summary.succeeded,
        summary.total_jobs,
        summary.failed.len()
    ));

    if summary.cancelled {
        md.push_str("Run was interrupted before all jobs finished.\n\n");
    }

    if !summary.failed.is_empty() {
        md.push_str("## Failures\n\n");
        md.push_str("| Slide | Variant | Kind | Attempts | Message |\n");
        md.push_str("|-------|---------|------|----------|---------|\n");
        for f in &summary.failed {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                f.slide,
                f.variant,
                f.kind,
                f.attempts,
                f.message.replace('|', "\\|")
            ));
        }
        md.push('\n');
    }

    match (&summary.document, &summary.error) {
        (Some(doc), _) => {
            md.push_str(&format!("**Document:** {}\n", doc.display()));
            if let (Some(pages), Some(artifacts)) =
                (summary.document_pages, summary.artifacts_on_disk)
            {
                md.push_str(&format!(
                    "**Pages:** {} of {} artifact(s) in the directory\n",
                    pages, artifacts
                ));
            }
        }
        (None, Some(err)) => md.push_str(&format!("**Error:** {}\n", err)),
        (None, None) => {}
    }

    md
}

/// Short plain-text form for the terminal
pub fn render_summary_text(summary: &RunSummary) -> String {
    let mut out = format!(
        "{}: {}/{} image(s) generated in {:.1}s\n",
        status_label(summary.status),
        summary.succeeded,
        summary.total_jobs,
        summary.duration_sec
    );
    for f in &summary.failed {
        out.push_str(&format!(
            "  slide {} variant {}: {} after {} attempt(s): {}\n",
            f.slide, f.variant, f.kind, f.attempts, f.message
        ));
    }
    out.push_str(&format!("Output: {}\n", summary.output_dir.display()));
    if let Some(doc) = &summary.document {
        out.push_str(&format!("Document: {}", doc.display()));
        if let Some(pages) = summary.document_pages {
            out.push_str(&format!(" ({} page(s))", pages));
        }
        out.push('\n');
    }
    if let Some(err) = &summary.error {
        out.push_str(&format!("Error: {}\n", err));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Artifact;
    use crate::runner::{GenerationJob, JobResult};
    use std::time::Duration;
    use tempfile::TempDir;

    fn report(outcomes: &[bool]) -> RunReport {
        let results = outcomes
            .iter()
            .enumerate()
            .map(|(i, ok)| {
                let job = GenerationJob {
                    slide_index: i + 1,
                    variant: 1,
                };
                if *ok {
                    JobResult {
                        job,
                        outcome: JobOutcome::Succeeded(Artifact {
                            bytes: Vec::new(),
                            mime: None,
                        }),
                        attempts: 1,
                        duration: Duration::ZERO,
                    }
                } else {
                    JobResult::failed(job, FailureKind::Rejected, "blocked | by policy")
                }
            })
            .collect();
        RunReport {
            results,
            total_duration: Duration::from_secs(3),
            cancelled: false,
        }
    }

    fn ctx(dir: &Path) -> SummaryContext<'_> {
        SummaryContext {
            run_id: "run-1".to_string(),
            output_dir: dir,
            selection: "1-3".to_string(),
            copies: 1,
        }
    }

    fn assembled() -> Assembled {
        Assembled {
            document: PathBuf::from("out/slide_combined.pdf"),
            pages: 3,
            manifest_entries: 4,
        }
    }

    #[test]
    fn test_status_from_outcomes() {
        let dir = Path::new("out");
        let doc = assembled();

        let full = build_summary(ctx(dir), &report(&[true, true, true]), Ok(&doc));
        assert_eq!(full.status, RunStatus::FullSuccess);
        assert_eq!(full.status.exit_code(), 0);

        let partial = build_summary(ctx(dir), &report(&[true, false, true]), Ok(&doc));
        assert_eq!(partial.status, RunStatus::PartialSuccess);
        assert_eq!(partial.failed.len(), 1);
        assert_eq!(partial.failed[0].slide, 2);
        assert_eq!(partial.status.exit_code(), 2);

        let none = build_summary(
            ctx(dir),
            &report(&[false, false]),
            Err("No artifacts produced".to_string()),
        );
        assert_eq!(none.status, RunStatus::TotalFailure);
        assert!(none.document.is_none());
        assert_eq!(none.status.exit_code(), 1);
    }

    #[test]
    fn test_assembly_error_is_total_failure() {
        let summary = build_summary(
            ctx(Path::new("out")),
            &report(&[true, true]),
            Err("disk full".to_string()),
        );
        assert_eq!(summary.status, RunStatus::TotalFailure);
        assert_eq!(summary.error.as_deref(), Some("disk full"));
        assert_eq!(summary.document_pages, None);
    }

    #[test]
    fn test_write_summary_files() {
        let dir = TempDir::new().unwrap();
        let doc = assembled();
        let summary = build_summary(ctx(dir.path()), &report(&[true, false]), Ok(&doc));

        write_summary(dir.path(), &summary).unwrap();

        let json = fs::read_to_string(dir.path().join("summary.json")).unwrap();
        assert!(json.contains("\"status\": \"partial_success\""));
        assert!(json.contains("\"kind\": \"rejected\""));

        let md = fs::read_to_string(dir.path().join("summary.md")).unwrap();
        assert!(md.contains("# slidegen Summary"));
        assert!(md.contains("blocked \\| by policy"));
        assert!(md.contains("slide_combined.pdf"));
        assert!(md.contains("**Pages:** 3 of 4 artifact(s)"));
    }

    #[test]
    fn test_render_text_lists_failures() {
        let doc = assembled();
        let summary = build_summary(ctx(Path::new("out")), &report(&[false, true]), Ok(&doc));
        let text = render_summary_text(&summary);
        assert!(text.contains("1/2 image(s)"));
        assert!(text.contains("slide 1 variant 1: rejected"));
        assert!(text.contains("Document: out/slide_combined.pdf (3 page(s))"));
    }
}
