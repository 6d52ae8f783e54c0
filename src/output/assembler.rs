use crate::error::AssemblyError;
use crate::provider::Artifact;
use crate::runner::{JobOutcome, JobResult, ResultSink};
use chrono::Utc;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::manifest::{
    artifact_file_name, name_width, ArtifactKey, FailureRecord, ManifestEntry, OutputManifest,
};
use super::pdf::DocumentCombiner;
use super::store::{sha256_hex, ArtifactStore};

/// What a successful assembly left on disk
#[derive(Debug, Clone)]
pub struct Assembled {
    pub document: PathBuf,
    pub pages: usize,
    pub manifest_entries: usize,
}

/// Persists each job result as it arrives and builds the combined document
/// once the run is over
pub struct Assembler<S: ArtifactStore> {
    store: S,
    manifest: OutputManifest,
    width: usize,
    run_id: Uuid,
    generated: usize,
    failed: usize,
    persist_failures: Vec<(ArtifactKey, String)>,
}

impl<S: ArtifactStore> Assembler<S> {
    /// Load what earlier runs left in the store. Nothing is written until the
    /// first result is recorded.
    pub fn open(store: S, slide_count: usize, copies: u32) -> Result<Self, AssemblyError> {
        let mut existing = store.list_existing()?;
        if !existing.is_empty() {
            info!(
                "Found {} existing artifact(s) in {}",
                existing.len(),
                store.location().display()
            );
        }

        // One width for the whole directory, wide enough for every key on disk
        let width = existing
            .iter()
            .map(|e| name_width(e.slide, e.variant))
            .fold(name_width(slide_count, copies), usize::max);
        let renamed = rename_to_width(&store, &mut existing, width)?;

        let run_id = Uuid::new_v4();
        let manifest = OutputManifest::new(run_id, slide_count, existing);
        if renamed > 0 {
            info!("Renamed {} existing artifact(s) to {}-digit names", renamed, width);
            store.save_manifest(&manifest)?;
        }

        Ok(Self {
            manifest,
            store,
            width,
            run_id,
            generated: 0,
            failed: 0,
            persist_failures: Vec::new(),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn location(&self) -> &Path {
        self.store.location()
    }

    fn persist(&mut self, key: ArtifactKey, artifact: &Artifact) -> Result<(), AssemblyError> {
        let file = artifact_file_name(key, self.width, extension_for(artifact));
        let path = self.store.write(&file, &artifact.bytes)?;
        debug!("Wrote {}", path.display());

        let replaced = self.manifest.upsert(ManifestEntry {
            slide: key.slide,
            variant: key.variant,
            file: file.clone(),
            bytes: artifact.bytes.len() as u64,
            sha256: sha256_hex(&artifact.bytes),
            generated_at: Utc::now(),
            run_id: Some(self.run_id),
        });

        if let Some(old) = replaced.filter(|old| old.file != file) {
            if let Err(e) = self.store.remove(&old.file) {
                warn!("Failed to remove replaced artifact {}: {}", old.file, e);
            }
        }
        Ok(())
    }

    /// Save the final manifest and write the combined document covering every
    /// artifact on disk for the current outline, not just this run's
    pub fn finish(self, combiner: &dyn DocumentCombiner) -> Result<Assembled, AssemblyError> {
        self.store.save_manifest(&self.manifest)?;

        if self.generated == 0 {
            return Err(AssemblyError::NoArtifactsProduced {
                failed: self.failed,
            });
        }
        if !self.persist_failures.is_empty() {
            return Err(AssemblyError::Persist {
                failures: self.persist_failures,
            });
        }

        for stale in self.manifest.stale_entries() {
            warn!(
                "Leaving {} out of the document: outline has only {} slide(s)",
                stale.file, self.manifest.slide_count
            );
        }

        let entries = self.manifest.document_entries();
        let mut pages = Vec::with_capacity(entries.len());
        for entry in &entries {
            pages.push(self.store.read(&entry.file)?);
        }

        let bytes = combiner.combine(&pages)?;
        let document = self.store.write(combiner.file_name(), &bytes)?;
        info!(
            "Combined {} image(s) into {}",
            pages.len(),
            document.display()
        );

        Ok(Assembled {
            document,
            pages: pages.len(),
            manifest_entries: self.manifest.len(),
        })
    }
}

impl<S: ArtifactStore> ResultSink for Assembler<S> {
    fn record(&mut self, result: &JobResult) {
        let key = result.job.key();
        match &result.outcome {
            JobOutcome::Succeeded(artifact) => {
                self.generated += 1;
                if let Err(e) = self.persist(key, artifact) {
                    error!("Failed to persist {}: {}", key, e);
                    self.persist_failures.push((key, e.to_string()));
                    return;
                }
            }
            JobOutcome::Failed { kind, message } => {
                self.failed += 1;
                self.manifest.record_failure(FailureRecord {
                    slide: key.slide,
                    variant: key.variant,
                    kind: *kind,
                    message: message.clone(),
                    attempts: result.attempts,
                });
            }
        }

        if let Err(e) = self.store.save_manifest(&self.manifest) {
            warn!("Failed to update manifest: {}", e);
        }
    }
}

fn rename_to_width<S: ArtifactStore>(
    store: &S,
    entries: &mut [ManifestEntry],
    width: usize,
) -> Result<usize, AssemblyError> {
    let mut renamed = 0;
    for entry in entries.iter_mut() {
        let file = entry.file_name_at(width);
        if file != entry.file {
            store.rename(&entry.file, &file)?;
            debug!("Renamed {} to {}", entry.file, file);
            entry.file = file;
            renamed += 1;
        }
    }
    Ok(renamed)
}

/// File extension from the payload's magic bytes, falling back to its MIME type
fn extension_for(artifact: &Artifact) -> &'static str {
    match image::guess_format(&artifact.bytes) {
        Ok(ImageFormat::Jpeg) => "jpg",
        Ok(ImageFormat::WebP) => "webp",
        Ok(ImageFormat::Png) => "png",
        _ => match artifact.mime.as_deref() {
            Some("image/jpeg") | Some("image/jpg") => "jpg",
            Some("image/webp") => "webp",
            _ => "png",
        },
    }
}
