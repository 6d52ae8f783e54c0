use crate::provider::FailureKind;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use uuid::Uuid;

pub const MANIFEST_VERSION: u32 = 1;

/// Manifest key; ordering is document order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub slide: usize,
    pub variant: u32,
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slide {} variant {}", self.slide, self.variant)
    }
}

/// Zero-pad width so that lexicographic file order equals numeric order
pub fn name_width(slide_count: usize, copies: u32) -> usize {
    let largest = slide_count.max(copies as usize);
    largest.to_string().len().max(2)
}

pub fn artifact_file_name(key: ArtifactKey, width: usize, extension: &str) -> String {
    format!(
        "slide_p{:0width$}_v{:0width$}.{}",
        key.slide,
        key.variant,
        extension,
        width = width
    )
}

fn artifact_name_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^slide_p(\d+)_v(\d+)\.(?:png|jpg|jpeg|webp)$").ok())
        .as_ref()
}

/// Inverse of [`artifact_file_name`], for adopting files already on disk
pub fn parse_artifact_file_name(name: &str) -> Option<ArtifactKey> {
    let caps = artifact_name_regex()?.captures(name)?;
    let slide: usize = caps.get(1)?.as_str().parse().ok()?;
    let variant: u32 = caps.get(2)?.as_str().parse().ok()?;
    (slide > 0 && variant > 0).then_some(ArtifactKey { slide, variant })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub slide: usize,
    pub variant: u32,
    pub file: String,
    pub bytes: u64,
    pub sha256: String,
    pub generated_at: DateTime<Utc>,
    /// Run that produced the file; absent for adopted files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
}

impl ManifestEntry {
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey {
            slide: self.slide,
            variant: self.variant,
        }
    }

    /// This entry's file name at `width`, keeping its extension
    pub fn file_name_at(&self, width: usize) -> String {
        let extension = Path::new(&self.file)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png");
        artifact_file_name(self.key(), width, extension)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub slide: usize,
    pub variant: u32,
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
}

impl FailureRecord {
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey {
            slide: self.slide,
            variant: self.variant,
        }
    }
}

/// Every artifact currently on disk for one output directory, plus the
/// failures of the most recent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputManifest {
    pub version: u32,
    pub run_id: Uuid,
    pub updated_at: DateTime<Utc>,
    pub slide_count: usize,
    #[serde(with = "entries_as_list")]
    entries: BTreeMap<ArtifactKey, ManifestEntry>,
    #[serde(default)]
    failures: Vec<FailureRecord>,
}

mod entries_as_list {
    use super::{ArtifactKey, ManifestEntry};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        entries: &BTreeMap<ArtifactKey, ManifestEntry>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(entries.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<ArtifactKey, ManifestEntry>, D::Error> {
        let list = Vec::<ManifestEntry>::deserialize(deserializer)?;
        Ok(list.into_iter().map(|e| (e.key(), e)).collect())
    }
}

impl OutputManifest {
    pub fn new(run_id: Uuid, slide_count: usize, existing: Vec<ManifestEntry>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            run_id,
            updated_at: Utc::now(),
            slide_count,
            entries: existing.into_iter().map(|e| (e.key(), e)).collect(),
            failures: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn get(&self, key: ArtifactKey) -> Option<&ManifestEntry> {
        self.entries.get(&key)
    }

    /// All entries in (slide, variant) order
    pub fn entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.values()
    }

    #[cfg(test)]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Insert or replace the entry at its key, returning the replaced one
    pub fn upsert(&mut self, entry: ManifestEntry) -> Option<ManifestEntry> {
        self.updated_at = Utc::now();
        self.failures.retain(|f| f.key() != entry.key());
        self.entries.insert(entry.key(), entry)
    }

    /// Record a failed job; any existing artifact at that key stays
    pub fn record_failure(&mut self, failure: FailureRecord) {
        self.updated_at = Utc::now();
        self.failures.retain(|f| f.key() != failure.key());
        self.failures.push(failure);
        self.failures.sort_by_key(|f| f.key());
    }

    /// Entries that belong in the combined document: slides `1..=slide_count`,
    /// ascending variant within each slide
    pub fn document_entries(&self) -> Vec<&ManifestEntry> {
        self.entries
            .values()
            .filter(|e| (1..=self.slide_count).contains(&e.slide))
            .collect()
    }

    /// Entries left over from a longer version of the outline
    pub fn stale_entries(&self) -> Vec<&ManifestEntry> {
        self.entries
            .values()
            .filter(|e| e.slide > self.slide_count)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(slide: usize, variant: u32) -> ManifestEntry {
        ManifestEntry {
            slide,
            variant,
            file: artifact_file_name(ArtifactKey { slide, variant }, 2, "png"),
            bytes: 3,
            sha256: "abc".to_string(),
            generated_at: Utc::now(),
            run_id: None,
        }
    }

    #[test]
    fn test_file_names_zero_padded() {
        let key = ArtifactKey {
            slide: 3,
            variant: 1,
        };
        assert_eq!(artifact_file_name(key, 2, "png"), "slide_p03_v01.png");
        assert_eq!(artifact_file_name(key, 3, "jpg"), "slide_p003_v001.jpg");
        assert_eq!(name_width(9, 2), 2);
        assert_eq!(name_width(120, 2), 3);
        assert_eq!(name_width(4, 1000), 4);
    }

    #[test]
    fn test_file_name_at_keeps_extension() {
        let mut jpg = entry(3, 1);
        jpg.file = "slide_p003_v001.jpg".to_string();
        assert_eq!(jpg.file_name_at(2), "slide_p03_v01.jpg");
        assert_eq!(entry(3, 1).file_name_at(3), "slide_p003_v001.png");
    }

    #[test]
    fn test_lexicographic_matches_numeric() {
        let width = name_width(12, 2);
        let mut names: Vec<String> = [(10, 1), (2, 2), (2, 1), (1, 2), (12, 1)]
            .into_iter()
            .map(|(slide, variant)| artifact_file_name(ArtifactKey { slide, variant }, width, "png"))
            .collect();
        names.sort();
        let keys: Vec<ArtifactKey> = names
            .iter()
            .filter_map(|n| parse_artifact_file_name(n))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_parse_artifact_names() {
        assert_eq!(
            parse_artifact_file_name("slide_p07_v02.webp"),
            Some(ArtifactKey {
                slide: 7,
                variant: 2
            })
        );
        assert_eq!(parse_artifact_file_name("slide_combined.pdf"), None);
        assert_eq!(parse_artifact_file_name("slide_p00_v01.png"), None);
        assert_eq!(parse_artifact_file_name("notes.png"), None);
    }

    #[test]
    fn test_manifest_json_roundtrip_keeps_order() {
        let mut manifest = OutputManifest::new(Uuid::new_v4(), 3, vec![entry(2, 1), entry(1, 2)]);
        manifest.upsert(entry(1, 1));
        let json = serde_json::to_string(&manifest).unwrap();
        let back: OutputManifest = serde_json::from_str(&json).unwrap();
        let keys: Vec<(usize, u32)> = back.entries().map(|e| (e.slide, e.variant)).collect();
        assert_eq!(keys, vec![(1, 1), (1, 2), (2, 1)]);
    }

    #[test]
    fn test_failure_leaves_entry_and_success_clears_failure() {
        let mut manifest = OutputManifest::new(Uuid::new_v4(), 2, vec![entry(1, 1)]);
        manifest.record_failure(FailureRecord {
            slide: 1,
            variant: 1,
            kind: FailureKind::Timeout,
            message: "slow".to_string(),
            attempts: 3,
        });
        assert!(manifest.get(ArtifactKey { slide: 1, variant: 1 }).is_some());
        assert_eq!(manifest.failures().len(), 1);

        manifest.upsert(entry(1, 1));
        assert!(manifest.failures().is_empty());
    }

    #[test]
    fn test_document_entries_exclude_stale_slides() {
        let manifest = OutputManifest::new(
            Uuid::new_v4(),
            2,
            vec![entry(3, 1), entry(2, 1), entry(1, 1)],
        );
        let doc: Vec<usize> = manifest.document_entries().iter().map(|e| e.slide).collect();
        assert_eq!(doc, vec![1, 2]);
        assert_eq!(manifest.stale_entries().len(), 1);
    }
}
