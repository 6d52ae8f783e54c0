use crate::error::AssemblyError;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::manifest::{parse_artifact_file_name, ManifestEntry, OutputManifest};

pub const MANIFEST_FILE: &str = "manifest.json";

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Persistence for one output directory
pub trait ArtifactStore {
    fn location(&self) -> &Path;

    /// Atomically create or replace `file_name`
    fn write(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf>;

    fn read(&self, file_name: &str) -> io::Result<Vec<u8>>;

    fn remove(&self, file_name: &str) -> io::Result<()>;

    /// Replaces `to` if it exists
    fn rename(&self, from: &str, to: &str) -> io::Result<PathBuf>;

    /// Artifacts already present from earlier runs
    fn list_existing(&self) -> Result<Vec<ManifestEntry>, AssemblyError>;

    fn save_manifest(&self, manifest: &OutputManifest) -> Result<(), AssemblyError>;
}

#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn load_manifest(&self) -> Option<OutputManifest> {
        let path = self.dir.join(MANIFEST_FILE);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!(
                    "Ignoring unreadable manifest {}: {}; rebuilding from directory",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    fn adopt(&self, file_name: &str) -> Option<ManifestEntry> {
        let key = parse_artifact_file_name(file_name)?;
        let path = self.dir.join(file_name);
        let bytes = fs::read(&path).ok()?;
        let generated_at = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        debug!("Adopting {} as {}", file_name, key);
        Some(ManifestEntry {
            slide: key.slide,
            variant: key.variant,
            file: file_name.to_string(),
            bytes: bytes.len() as u64,
            sha256: sha256_hex(&bytes),
            generated_at,
            run_id: None,
        })
    }
}

impl ArtifactStore for FsArtifactStore {
    fn location(&self) -> &Path {
        &self.dir
    }

    fn write(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let target = self.dir.join(file_name);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(target)
    }

    fn read(&self, file_name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.dir.join(file_name))
    }

    fn remove(&self, file_name: &str) -> io::Result<()> {
        match fs::remove_file(self.dir.join(file_name)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<PathBuf> {
        let target = self.dir.join(to);
        fs::rename(self.dir.join(from), &target)?;
        Ok(target)
    }

    fn list_existing(&self) -> Result<Vec<ManifestEntry>, AssemblyError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut found: Vec<ManifestEntry> = self
            .load_manifest()
            .map(|m| {
                m.entries()
                    .filter(|e| self.dir.join(&e.file).is_file())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let mut names: Vec<String> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();

        for name in names {
            let Some(key) = parse_artifact_file_name(&name) else {
                continue;
            };
            if found.iter().any(|e| e.key() == key) {
                continue;
            }
            if let Some(entry) = self.adopt(&name) {
                found.push(entry);
            }
        }

        found.sort_by_key(|e| e.key());
        Ok(found)
    }

    fn save_manifest(&self, manifest: &OutputManifest) -> Result<(), AssemblyError> {
        let json = serde_json::to_vec_pretty(manifest)?;
        self.write(MANIFEST_FILE, &json)?;
        Ok(())
    }
}
