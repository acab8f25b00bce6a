use anyhow::Result;
use bytescout::search::{ByteMatcher, Dispatcher, FileScanner, WorkerPool};
use bytescout::stream::DirectoryStream;
use bytescout::{filters::FileClassifier, scan, Pattern, ScanConfig, ScanError, ScanRecord};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn create_test_files(dir: &tempfile::TempDir, file_count: usize, repeats: usize) -> Result<()> {
    for i in 0..file_count {
        let file_path = dir.path().join(format!("test_{}.bin", i));
        let mut file = File::create(file_path)?;
        for _ in 0..repeats {
            file.write_all(b"\xDE\xAD\xBE\xEF\x00")?;
        }
        // File i carries i extra trailing matches
        for _ in 0..i {
            file.write_all(b"\xDE\xAD\xBE\xEF")?;
        }
    }
    Ok(())
}

fn counts_by_name(records: &[ScanRecord]) -> HashMap<String, u64> {
    records
        .iter()
        .filter_map(|r| {
            let name = r.path.file_name()?.to_string_lossy().into_owned();
            Some((name, r.match_count()?))
        })
        .collect()
}

/// Delegates to a real matcher while measuring concurrency
struct ObservedMatcher {
    inner: ByteMatcher,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl FileScanner for ObservedMatcher {
    fn scan(&self, path: &Path) -> Result<u64, ScanError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(30));
        let result = self.inner.scan(path);
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[test]
fn test_scan_directory() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 10, 100)?;

    let config = ScanConfig::new(dir.path(), "DEADBEEF", 4);
    let mut records: Vec<ScanRecord> = Vec::new();
    let summary = scan(&config, &mut records)?;

    assert_eq!(records.len(), 10);
    assert_eq!(summary.files_scanned, 10);
    assert_eq!(summary.files_with_matches, 10);
    assert_eq!(summary.total_matches, (10 * 100 + (0..10).sum::<usize>()) as u64);

    let counts = counts_by_name(&records);
    for i in 0..10 {
        assert_eq!(counts[&format!("test_{}.bin", i)], 100 + i as u64);
    }
    Ok(())
}

#[test]
fn test_capacity_two_with_five_files() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 5, 3)?;

    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let scanner = ObservedMatcher {
        inner: ByteMatcher::new(Pattern::from_hex("DEADBEEF")?),
        running: Arc::clone(&running),
        peak: Arc::clone(&peak),
    };
    let pool = WorkerPool::new(scanner, NonZeroUsize::new(2).unwrap());
    let mut dispatcher = Dispatcher::new(FileClassifier::new(dir.path()), pool);

    let mut records: Vec<ScanRecord> = Vec::new();
    let summary = dispatcher.run(DirectoryStream::open(dir.path(), false)?, &mut records);

    assert_eq!(records.len(), 5);
    assert_eq!(summary.files_submitted, 5);
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert!(dispatcher.pool().stats().peak_active <= 2);
    assert_eq!(dispatcher.pool().stats().reaped, 5);
    assert_eq!(running.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn test_non_regular_entries_never_produce_records() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("file.bin"), b"AA")?;
    fs::create_dir(dir.path().join("dir_a"))?;
    fs::create_dir(dir.path().join("dir_b"))?;
    #[cfg(unix)]
    std::os::unix::fs::symlink(dir.path().join("dir_a"), dir.path().join("link_to_dir"))?;

    let config = ScanConfig::new(dir.path(), "41", 1);
    let mut records: Vec<ScanRecord> = Vec::new();
    let summary = scan(&config, &mut records)?;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, dir.path().join("file.bin"));
    assert_eq!(records[0].match_count(), Some(2));
    assert_eq!(summary.files_submitted, 1);
    assert!(summary.entries_skipped >= 2);
    Ok(())
}

#[test]
fn test_pattern_longer_than_file() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("tiny.bin"), b"\x01\x02")?;
    fs::write(dir.path().join("empty.bin"), b"")?;

    let config = ScanConfig::new(dir.path(), "010203", 2);
    let mut records: Vec<ScanRecord> = Vec::new();
    let summary = scan(&config, &mut records)?;

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.match_count() == Some(0)));
    assert_eq!(summary.scan_failures, 0);
    Ok(())
}

#[test]
fn test_recursive_scan_with_ignore_patterns() -> Result<()> {
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("a").join("b"))?;
    fs::write(dir.path().join("top.bin"), b"AAA")?;
    fs::write(dir.path().join("a").join("mid.bin"), b"AA")?;
    fs::write(dir.path().join("a").join("b").join("deep.bin"), b"AAAA")?;
    fs::write(dir.path().join("a").join("skip.tmp"), b"AAAAAAAA")?;

    let mut config = ScanConfig::new(dir.path(), "4141", 3);
    config.recursive = true;
    config.ignore_patterns = vec!["*.tmp".to_string()];

    let mut records: Vec<ScanRecord> = Vec::new();
    let summary = scan(&config, &mut records)?;

    let counts = counts_by_name(&records);
    assert_eq!(counts.len(), 3);
    assert_eq!(counts["top.bin"], 2);
    assert_eq!(counts["mid.bin"], 1);
    assert_eq!(counts["deep.bin"], 3);
    assert_eq!(summary.entries_skipped, 1);
    Ok(())
}

#[test]
fn test_flat_scan_ignores_subdirectory_contents() -> Result<()> {
    let dir = tempdir()?;
    fs::create_dir(dir.path().join("sub"))?;
    fs::write(dir.path().join("sub").join("inner.bin"), b"AA")?;
    fs::write(dir.path().join("outer.bin"), b"AA")?;

    let config = ScanConfig::new(dir.path(), "4141", 2);
    let mut records: Vec<ScanRecord> = Vec::new();
    scan(&config, &mut records)?;

    let paths: Vec<PathBuf> = records.iter().map(|r| r.path.clone()).collect();
    assert_eq!(paths, vec![dir.path().join("outer.bin")]);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_reported_not_fatal() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir()?;
    fs::write(dir.path().join("ok.bin"), b"AA")?;
    let locked = dir.path().join("locked.bin");
    fs::write(&locked, b"AA")?;
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;

    // Root can read anything; nothing to check in that case
    if File::open(&locked).is_ok() {
        return Ok(());
    }

    let config = ScanConfig::new(dir.path(), "4141", 2);
    let mut records: Vec<ScanRecord> = Vec::new();
    let summary = scan(&config, &mut records)?;

    assert_eq!(records.len(), 2);
    assert_eq!(summary.scan_failures, 1);
    let failed = records.iter().find(|r| r.path == locked).unwrap();
    assert!(matches!(failed.error(), Some(ScanError::Unreadable { .. })));
    Ok(())
}

#[test]
fn test_records_are_streamed() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 6, 1)?;

    let config = ScanConfig::new(dir.path(), "DEADBEEF", 2);
    let mut order = Vec::new();
    let mut sink = |record: ScanRecord| order.push(record.match_count());
    let summary = scan(&config, &mut sink)?;

    assert_eq!(order.len(), 6);
    assert_eq!(summary.records(), 6);
    assert!(order.iter().all(Option::is_some));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_non_utf8_file_name_is_scanned() -> Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir()?;
    let raw = dir.path().join(OsStr::from_bytes(b"bad\xFFname.bin"));
    fs::write(&raw, b"AAA")?;
    fs::write(dir.path().join("good.bin"), b"AAA")?;

    let config = ScanConfig::new(dir.path(), "4141", 2);
    let mut records: Vec<ScanRecord> = Vec::new();
    let summary = scan(&config, &mut records)?;

    assert_eq!(records.len(), 2);
    assert_eq!(summary.classify_errors, 0);
    assert_eq!(summary.total_matches, 4);
    let odd = records.iter().find(|r| r.path == raw).unwrap();
    assert_eq!(odd.match_count(), Some(2));
    Ok(())
}
