//! Lazy enumeration of directory entries.
//!
//! Both modes yield paths relative to the root: the direct children in flat
//! mode, every non-directory entry in recursive mode. Names are passed on as
//! raw OS strings, so entries that are not valid UTF-8 still get scanned.

use ignore::{Walk, WalkBuilder};
use std::fs::ReadDir;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::errors::ScoutResult;

/// A finite, lazily produced sequence of entry paths under a root
pub struct DirectoryStream {
    root: PathBuf,
    inner: Inner,
}

enum Inner {
    Flat(ReadDir),
    Recursive(Walk),
}

impl DirectoryStream {
    /// Opens `root` for enumeration. Fails if the root cannot be read.
    pub fn open(root: impl Into<PathBuf>, recursive: bool) -> ScoutResult<Self> {
        let root = root.into();
        let inner = if recursive {
            // Walk fails lazily on a missing root, so check it eagerly like
            // the flat mode does.
            std::fs::read_dir(&root)?;
            let walker = WalkBuilder::new(&root)
                .standard_filters(false)
                .follow_links(false)
                .build();
            Inner::Recursive(walker)
        } else {
            Inner::Flat(std::fs::read_dir(&root)?)
        };
        Ok(Self { root, inner })
    }
}

fn relative_path(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

impl Iterator for DirectoryStream {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            match &mut self.inner {
                Inner::Flat(read_dir) => match read_dir.next()? {
                    Ok(entry) => return Some(PathBuf::from(entry.file_name())),
                    Err(e) => warn!("Failed to read entry in {}: {}", self.root.display(), e),
                },
                Inner::Recursive(walk) => match walk.next()? {
                    Ok(entry) => {
                        if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                            continue;
                        }
                        return Some(relative_path(&self.root, entry.path()));
                    }
                    Err(e) => warn!("Failed to walk {}: {}", self.root.display(), e),
                },
            }
        }
    }
}
