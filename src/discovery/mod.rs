//! Article discovery: `--article` paths and glob patterns → background text

mod pattern;

use pattern::{expand_pattern, is_glob};

use crate::error::DiscoveryError;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const SUPPORTED_ARTICLE_EXTENSIONS: &[&str] = &["md", "markdown"];

const ARTICLE_SEPARATOR: &str = "\n\n---\n\n";

fn check_article(path: &Path) -> Result<(), DiscoveryError> {
    if !path.is_file() {
        return Err(DiscoveryError::NotFound(path.to_path_buf()));
    }
    let supported = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            SUPPORTED_ARTICLE_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(e))
        })
        .unwrap_or(false);
    if !supported {
        return Err(DiscoveryError::UnsupportedFormat {
            path: path.to_path_buf(),
            supported: SUPPORTED_ARTICLE_EXTENSIONS
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(", "),
        });
    }
    Ok(())
}

fn is_supported(path: &Path) -> bool {
    check_article(path).is_ok()
}

/// Resolve every `--article` argument to a sorted, de-duplicated file list.
///
/// Literal paths must exist and carry a supported extension. Glob patterns
/// keep only supported files and must match at least one.
pub fn resolve_articles(patterns: &[String]) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut files = BTreeSet::new();

    for pattern in patterns {
        if is_glob(pattern) {
            let matched: Vec<PathBuf> = expand_pattern(pattern)?
                .into_iter()
                .filter(|p| is_supported(p))
                .collect();
            if matched.is_empty() {
                return Err(DiscoveryError::NoMatches(pattern.clone()));
            }
            debug!("Pattern '{}' matched {} article(s)", pattern, matched.len());
            files.extend(matched);
        } else {
            let path = PathBuf::from(pattern);
            check_article(&path)?;
            files.insert(path);
        }
    }

    Ok(files.into_iter().collect())
}

/// Read and join article texts; `None` when no articles were given
pub fn load_article_context(paths: &[PathBuf]) -> Result<Option<String>, DiscoveryError> {
    if paths.is_empty() {
        return Ok(None);
    }

    let mut texts = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(path)?;
        info!("Loaded article {} ({} chars)", path.display(), text.len());
        texts.push(text);
    }

    Ok(Some(texts.join(ARTICLE_SEPARATOR)))
}
