use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::search::matcher::{LARGE_FILE_THRESHOLD, SMALL_FILE_THRESHOLD};

/// Tracks how files were read and how much data went through the matcher.
///
/// Clones share the same counters, so every worker can record into one
/// instance without locking.
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    bytes_scanned: Arc<AtomicU64>,
    mmap_bytes: Arc<AtomicU64>,

    small_files_processed: Arc<AtomicU64>,
    buffered_files_processed: Arc<AtomicU64>,
    mmap_files_processed: Arc<AtomicU64>,

    unreadable_files: Arc<AtomicU64>,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            bytes_scanned: Arc::new(AtomicU64::new(0)),
            mmap_bytes: Arc::new(AtomicU64::new(0)),
            small_files_processed: Arc::new(AtomicU64::new(0)),
            buffered_files_processed: Arc::new(AtomicU64::new(0)),
            mmap_files_processed: Arc::new(AtomicU64::new(0)),
            unreadable_files: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records which read strategy a file of `size` bytes goes through
    pub fn record_file_processing(&self, size: u64) {
        if size < SMALL_FILE_THRESHOLD {
            self.small_files_processed.fetch_add(1, Ordering::Relaxed);
        } else if size >= LARGE_FILE_THRESHOLD {
            self.mmap_files_processed.fetch_add(1, Ordering::Relaxed);
            self.mmap_bytes.fetch_add(size, Ordering::Relaxed);
        } else {
            self.buffered_files_processed
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records bytes that were fed to the matcher
    pub fn record_bytes_scanned(&self, bytes: u64) {
        let total = self.bytes_scanned.fetch_add(bytes, Ordering::Relaxed) + bytes;
        debug!("Scanned {} bytes, total: {} bytes", bytes, total);
    }

    pub fn record_unreadable(&self) {
        self.unreadable_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            bytes_scanned: self.bytes_scanned.load(Ordering::Relaxed),
            mmap_bytes: self.mmap_bytes.load(Ordering::Relaxed),
            small_files: self.small_files_processed.load(Ordering::Relaxed),
            buffered_files: self.buffered_files_processed.load(Ordering::Relaxed),
            mmap_files: self.mmap_files_processed.load(Ordering::Relaxed),
            unreadable_files: self.unreadable_files.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Bytes scanned: {} bytes\n\
             Memory mapped: {} bytes\n\
             Files processed (small/buffered/mmap): {}/{}/{}\n\
             Unreadable files: {}",
            stats.bytes_scanned,
            stats.mmap_bytes,
            stats.small_files,
            stats.buffered_files,
            stats.mmap_files,
            stats.unreadable_files
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the metric counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub bytes_scanned: u64,
    pub mmap_bytes: u64,
    pub small_files: u64,
    pub buffered_files: u64,
    pub mmap_files: u64,
    pub unreadable_files: u64,
}
