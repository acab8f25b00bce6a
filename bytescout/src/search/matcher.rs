use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::trace;

use crate::errors::ScanError;
use crate::metrics::ScanMetrics;
use crate::pattern::Pattern;

// Constants for file processing
const BUFFER_CAPACITY: usize = 65536;
pub(crate) const SMALL_FILE_THRESHOLD: u64 = 32 * 1024; // 32KB
pub(crate) const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

/// Counts every offset in `haystack` where `pattern` starts.
///
/// Overlapping occurrences are counted separately: `AA` occurs twice in
/// `AAA`.
pub fn count_in_slice(pattern: &[u8], haystack: &[u8]) -> u64 {
    if pattern.is_empty() || pattern.len() > haystack.len() {
        return 0;
    }
    haystack.windows(pattern.len()).filter(|w| *w == pattern).count() as u64
}

/// Counts overlapping occurrences of `pattern` in the file at `path`.
///
/// The whole file is read; a pattern longer than the file yields 0.
pub fn count_matches(pattern: &Pattern, path: &Path) -> Result<u64, ScanError> {
    ByteMatcher::new(pattern.clone()).scan(path)
}

/// Work performed by one execution unit.
///
/// The pool only knows about this trait, which keeps it independent of how a
/// file is actually scanned.
pub trait FileScanner: Send + Sync + 'static {
    fn scan(&self, path: &Path) -> Result<u64, ScanError>;
}

/// Scans files for a fixed byte pattern, picking a read strategy by size
#[derive(Debug, Clone)]
pub struct ByteMatcher {
    pattern: Pattern,
    metrics: ScanMetrics,
}

impl ByteMatcher {
    pub fn new(pattern: Pattern) -> Self {
        Self::with_metrics(pattern, ScanMetrics::new())
    }

    pub fn with_metrics(pattern: Pattern, metrics: ScanMetrics) -> Self {
        Self { pattern, metrics }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    fn open(&self, path: &Path) -> Result<File, ScanError> {
        File::open(path).map_err(|e| ScanError::unreadable(path, e))
    }

    fn process_small_file(&self, path: &Path) -> Result<u64, ScanError> {
        trace!("Using whole-file read for: {}", path.display());
        let bytes = std::fs::read(path).map_err(|e| ScanError::unreadable(path, e))?;
        self.metrics.record_bytes_scanned(bytes.len() as u64);
        Ok(count_in_slice(self.pattern.as_bytes(), &bytes))
    }

    /// Streams the file in fixed-size chunks. The last `len - 1` bytes of each
    /// chunk are carried into the next one so matches spanning a chunk
    /// boundary are still seen exactly once.
    fn process_file_buffered(&self, path: &Path) -> Result<u64, ScanError> {
        trace!("Using buffered read for: {}", path.display());
        let file = self.open(path)?;
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, file);

        let needle = self.pattern.as_bytes();
        let carry = needle.len() - 1;
        let mut window: Vec<u8> = Vec::with_capacity(BUFFER_CAPACITY + carry);
        let mut chunk = vec![0u8; BUFFER_CAPACITY];
        let mut count = 0u64;
        let mut scanned = 0u64;

        loop {
            let read = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ScanError::unreadable(path, e)),
            };
            scanned += read as u64;
            window.extend_from_slice(&chunk[..read]);
            count += count_in_slice(needle, &window);

            let keep = carry.min(window.len());
            window.drain(..window.len() - keep);
        }

        self.metrics.record_bytes_scanned(scanned);
        Ok(count)
    }

    fn process_mmap_file(&self, path: &Path) -> Result<u64, ScanError> {
        trace!("Using memory map for: {}", path.display());
        let file = self.open(path)?;
        // The file may change underneath us; counts are then best effort,
        // which matches reading it with any other strategy.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ScanError::unreadable(path, e))?;
        self.metrics.record_bytes_scanned(mmap.len() as u64);
        Ok(count_in_slice(self.pattern.as_bytes(), &mmap))
    }

    fn scan_by_size(&self, path: &Path) -> Result<u64, ScanError> {
        let metadata = path
            .metadata()
            .map_err(|e| ScanError::unreadable(path, e))?;
        let size = metadata.len();
        self.metrics.record_file_processing(size);

        if size < SMALL_FILE_THRESHOLD {
            self.process_small_file(path)
        } else if size >= LARGE_FILE_THRESHOLD {
            self.process_mmap_file(path)
        } else {
            self.process_file_buffered(path)
        }
    }
}

impl FileScanner for ByteMatcher {
    fn scan(&self, path: &Path) -> Result<u64, ScanError> {
        trace!("Scanning file: {}", path.display());
        let result = self.scan_by_size(path);
        if result.is_err() {
            self.metrics.record_unreadable();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn pattern(bytes: &[u8]) -> Pattern {
        Pattern::new(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_overlapping_matches() {
        assert_eq!(count_in_slice(b"AA", b"AAA"), 2);
        assert_eq!(count_in_slice(b"ABA", b"ABABABA"), 3);
        assert_eq!(count_in_slice(b"x", b"xxxxx"), 5);
    }

    #[test]
    fn test_no_match_and_short_input() {
        assert_eq!(count_in_slice(b"zz", b"abcdef"), 0);
        assert_eq!(count_in_slice(b"longer than input", b"short"), 0);
        assert_eq!(count_in_slice(b"a", b""), 0);
    }

    #[test]
    fn test_match_at_both_ends() {
        assert_eq!(count_in_slice(b"\x00\xFF", b"\x00\xFF\x10\x00\xFF"), 2);
    }

    #[test]
    fn test_count_matches_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aaa.bin");
        fs::write(&path, b"AAA").unwrap();

        assert_eq!(count_matches(&pattern(b"AA"), &path).unwrap(), 2);
        assert_eq!(count_matches(&pattern(b"AAAA"), &path).unwrap(), 0);
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.bin");

        let matcher = ByteMatcher::new(pattern(b"A"));
        let err = matcher.scan(&path).unwrap_err();
        assert!(matches!(err, ScanError::Unreadable { .. }));
        assert_eq!(matcher.metrics().get_stats().unreadable_files, 1);
    }

    #[test]
    fn test_chunk_boundary_handling() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("boundary.bin");

        // Medium sized file so the buffered strategy is used, with a match
        // straddling every chunk boundary.
        let needle = b"NEEDLE";
        let mut content = vec![b'.'; BUFFER_CAPACITY * 3];
        for boundary in 1..3 {
            let start = boundary * BUFFER_CAPACITY - 3;
            content[start..start + needle.len()].copy_from_slice(needle);
        }
        content.extend_from_slice(needle);
        fs::write(&path, &content).unwrap();
        assert!((content.len() as u64) >= SMALL_FILE_THRESHOLD);
        assert!((content.len() as u64) < LARGE_FILE_THRESHOLD);

        let matcher = ByteMatcher::new(pattern(needle));
        assert_eq!(matcher.scan(&path).unwrap(), 3);

        let stats = matcher.metrics().get_stats();
        assert_eq!(stats.buffered_files, 1);
        assert_eq!(stats.bytes_scanned, content.len() as u64);
    }

    #[test]
    fn test_strategies_agree() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("repeat.bin");

        let mut content = Vec::new();
        for i in 0..50_000u32 {
            content.extend_from_slice(&i.to_le_bytes());
            content.extend_from_slice(b"ABAB");
        }
        fs::write(&path, &content).unwrap();

        let matcher = ByteMatcher::new(pattern(b"ABA"));
        let expected = count_in_slice(b"ABA", &content);
        assert_eq!(matcher.process_small_file(&path).unwrap(), expected);
        assert_eq!(matcher.process_file_buffered(&path).unwrap(), expected);
        assert_eq!(matcher.process_mmap_file(&path).unwrap(), expected);
    }

    #[test]
    fn test_scan_is_deterministic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, b"\x01\x02\x01\x02\x01\x02").unwrap();

        let p = pattern(b"\x01\x02\x01");
        let first = count_matches(&p, &path).unwrap();
        for _ in 0..5 {
            assert_eq!(count_matches(&p, &path).unwrap(), first);
        }
        assert_eq!(first, 2);
    }
}
