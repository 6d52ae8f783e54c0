use crate::error::DiscoveryError;
use globset::{GlobBuilder, GlobMatcher};
use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};

pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(&['*', '?', '[', '{'][..])
}

fn matcher(pattern: &str) -> Result<GlobMatcher, DiscoveryError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| DiscoveryError::GlobPattern {
            pattern: pattern.to_string(),
            source: e,
        })
}

/// Longest leading run of components without glob syntax
fn literal_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    for component in Path::new(pattern).components() {
        if is_glob(&component.as_os_str().to_string_lossy()) {
            break;
        }
        base.push(component);
    }
    // The last literal component is a file name when the whole pattern is literal
    if base.as_os_str().is_empty() || base == Path::new(pattern) {
        base.pop();
    }
    if base.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        base
    }
}

/// Walk depth needed to reach matches below `base`, unless `**` allows any
fn max_depth(pattern: &str, base: &Path) -> Option<usize> {
    if pattern.contains("**") {
        return None;
    }
    let count = |p: &Path| {
        p.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .count()
    };
    Some(count(Path::new(pattern)).saturating_sub(count(base)))
}

/// `./notes/*.md` and `notes/*.md` name the same files
fn normalize(pattern: &str) -> &str {
    let mut pattern = pattern;
    while let Some(rest) = pattern.strip_prefix("./") {
        pattern = rest.trim_start_matches('/');
    }
    pattern
}

/// Files matching one glob pattern, sorted
pub fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let pattern = normalize(pattern);
    let matcher = matcher(pattern)?;
    let base = literal_base(pattern);
    if !base.exists() {
        return Ok(Vec::new());
    }

    let walker = WalkBuilder::new(&base)
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .max_depth(max_depth(pattern, &base))
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }

        // `./a.md` has to match `a.md`
        let candidate = path.strip_prefix(".").unwrap_or(path);
        if matcher.is_match(candidate) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}
