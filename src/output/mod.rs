mod assembler;
mod manifest;
mod pdf;
mod store;
mod summary;

pub use assembler::{Assembled, Assembler};
pub use manifest::ArtifactKey;
pub use pdf::{DocumentCombiner, PdfCombiner};
pub use store::{ArtifactStore, FsArtifactStore};

#[cfg(test)]
pub use store::MANIFEST_FILE;
pub use summary::{build_summary, render_summary_text, write_summary, RunStatus, RunSummary, SummaryContext};
