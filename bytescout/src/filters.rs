//! Decides which directory entries become work items.
//!
//! Only plain files are scheduled. Anything else (directories, sockets,
//! dangling links, links to directories) is skipped without consuming a
//! worker slot. A failed metadata lookup is reported as `EntryKind::Error`
//! and the scan carries on with the next entry.

use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::ClassifyError;

/// Outcome of classifying one directory entry
#[derive(Debug)]
pub enum EntryKind {
    /// A regular file; carries the full path to scan
    Regular(PathBuf),
    /// Not schedulable (directory, special file or ignored by pattern)
    Skip(PathBuf),
    /// Metadata could not be read
    Error(ClassifyError),
}

impl EntryKind {
    pub fn is_regular(&self) -> bool {
        matches!(self, EntryKind::Regular(_))
    }
}

/// Joins the entry name onto the directory path
pub fn full_path(dir: &Path, entry: &Path) -> PathBuf {
    dir.join(entry)
}

/// Classifies `entry` relative to `dir`, following symlinks
pub fn classify(dir: &Path, entry: &Path) -> EntryKind {
    let path = full_path(dir, entry);
    match fs::metadata(&path) {
        Ok(metadata) if metadata.file_type().is_file() => EntryKind::Regular(path),
        Ok(_) => EntryKind::Skip(path),
        Err(source) => EntryKind::Error(ClassifyError { path, source }),
    }
}

/// Checks if an entry should be ignored based on glob ignore patterns.
///
/// Patterns are matched against the entry name relative to the scan root,
/// with `\` normalized to `/`. Bytes that are not valid UTF-8 only match
/// wildcards.
pub fn should_ignore(entry: &Path, ignore_patterns: &[Pattern]) -> bool {
    if ignore_patterns.is_empty() {
        return false;
    }
    let normalized = entry.to_string_lossy().replace('\\', "/");
    ignore_patterns.iter().any(|p| p.matches(&normalized))
}

/// Classifies entries against a fixed root, applying ignore patterns first
#[derive(Debug, Clone)]
pub struct FileClassifier {
    root: PathBuf,
    ignore_patterns: Vec<Pattern>,
}

impl FileClassifier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore_patterns: Vec::new(),
        }
    }

    /// Adds glob ignore patterns; invalid globs are rejected up front
    pub fn with_ignore_patterns(mut self, patterns: &[String]) -> Result<Self, glob::PatternError> {
        self.ignore_patterns = patterns
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn classify(&self, entry: &Path) -> EntryKind {
        if should_ignore(entry, &self.ignore_patterns) {
            return EntryKind::Skip(full_path(&self.root, entry));
        }
        classify(&self.root, entry)
    }
}
