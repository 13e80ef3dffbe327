//! Local directory scanning
//!
//! Walks a directory tree and turns every regular file into a [`FileRecord`]
//! whose path is relative to the scanned root, optionally placed under a
//! remote prefix. Paths always use forward slashes.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::path::{Component, Path};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::upload::FileRecord;

/// Scanner settings beyond the root and prefix
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Glob patterns (`*` wildcard) matched against root-relative paths and names
    pub exclude_patterns: Vec<String>,
    /// Descend into symlinked directories while walking
    pub follow_symlinks: bool,
}

impl ScanOptions {
    pub fn with_excludes(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            exclude_patterns: patterns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }
}

/// Read every regular file under `root` as UTF-8 text
pub fn scan_directory(root: &Path, remote_prefix: Option<&str>) -> Result<Vec<FileRecord>> {
    scan_directory_with(root, remote_prefix, &ScanOptions::default())
}

/// Same as [`scan_directory`] with explicit options
pub fn scan_directory_with(
    root: &Path,
    remote_prefix: Option<&str>,
    options: &ScanOptions,
) -> Result<Vec<FileRecord>> {
    if !root.is_dir() {
        return Err(anyhow!("Not a directory: {:?}", root));
    }

    let exclusions = compile_patterns(&options.exclude_patterns)?;
    let prefix = remote_prefix.map(normalize_prefix).unwrap_or_default();

    debug!(
        "Scanning {:?} (prefix: {:?}, {} exclusion pattern(s))",
        root,
        prefix,
        exclusions.len()
    );

    let walker = WalkDir::new(root)
        .follow_links(options.follow_symlinks)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry, root, &exclusions));

    let mut records = Vec::new();

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk directory: {:?}", root))?;

        // Symlinked files are read through the link even when links are not followed
        if !entry.path().is_file() {
            continue;
        }

        let relative = relative_path(root, entry.path())?;
        let content = std::fs::read_to_string(entry.path())
            .with_context(|| format!("Failed to read {:?} as UTF-8 text", entry.path()))?;

        let path = remote_path(&prefix, &relative);
        debug!("Scanned {} ({} bytes)", path, content.len());

        records.push(FileRecord::text(path, content));
    }

    info!("Found {} file(s) under {:?}", records.len(), root);
    Ok(records)
}

/// Strip surrounding separators and convert backslashes
pub fn normalize_prefix(prefix: &str) -> String {
    prefix
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a normalized prefix and a relative path
pub fn remote_path(prefix: &str, relative: &str) -> String {
    if prefix.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", prefix, relative)
    }
}

/// Path of `path` below `root`, joined with forward slashes
fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{:?} is not inside {:?}", path, root))?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(
                segment
                    .to_str()
                    .ok_or_else(|| anyhow!("Path is not valid UTF-8: {:?}", path))?,
            ),
            Component::CurDir => {}
            other => return Err(anyhow!("Unexpected path component {:?} in {:?}", other, path)),
        }
    }

    Ok(segments.join("/"))
}

/// Turn glob patterns into anchored regexes
fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            let pattern_regex = regex::escape(pattern.trim_matches('/')).replace(r"\*", ".*");
            Regex::new(&format!("^{}$", pattern_regex))
                .with_context(|| format!("Invalid exclude pattern: {}", pattern))
        })
        .collect()
}

fn is_excluded(entry: &DirEntry, root: &Path, exclusions: &[Regex]) -> bool {
    // Never exclude the root itself
    if entry.depth() == 0 || exclusions.is_empty() {
        return false;
    }

    let name = entry.file_name().to_string_lossy();
    let relative = relative_path(root, entry.path()).unwrap_or_default();

    let excluded = exclusions
        .iter()
        .any(|re| re.is_match(&name) || re.is_match(&relative));

    if excluded {
        debug!("Excluding {:?}", entry.path());
    }
    excluded
}
