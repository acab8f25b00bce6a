use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ScanError;

/// What happened to a single work item
#[derive(Debug)]
pub enum ScanOutcome {
    Matched(u64),
    Failed(ScanError),
}

/// One record per scanned file, emitted as soon as its worker finishes
#[derive(Debug)]
pub struct ScanRecord {
    /// The path to the file
    pub path: PathBuf,
    /// Match count or the error that stopped the scan
    pub outcome: ScanOutcome,
    /// Name of the worker that produced the record
    pub worker: Option<String>,
}

impl ScanRecord {
    pub fn new(path: PathBuf, result: Result<u64, ScanError>) -> Self {
        let outcome = match result {
            Ok(count) => ScanOutcome::Matched(count),
            Err(e) => ScanOutcome::Failed(e),
        };
        Self {
            path,
            outcome,
            worker: None,
        }
    }

    pub fn with_worker(mut self, worker: impl Into<String>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    pub fn match_count(&self) -> Option<u64> {
        match self.outcome {
            ScanOutcome::Matched(count) => Some(count),
            ScanOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ScanError> {
        match &self.outcome {
            ScanOutcome::Matched(_) => None,
            ScanOutcome::Failed(e) => Some(e),
        }
    }

    /// Flat, serializable view of the record
    pub fn to_report(&self) -> RecordReport {
        RecordReport {
            path: self.path.display().to_string(),
            worker: self.worker.clone(),
            match_count: self.match_count(),
            error_kind: self.error().map(ScanError::kind),
            error: self.error().map(|e| e.to_string()),
        }
    }
}

/// Serialized form of a `ScanRecord`; exactly one of `match_count` and
/// `error_kind` is present.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecordReport {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Destination for records as they become available
pub trait ResultSink {
    fn emit(&mut self, record: ScanRecord);
}

impl ResultSink for Vec<ScanRecord> {
    fn emit(&mut self, record: ScanRecord) {
        self.push(record);
    }
}

impl<F> ResultSink for F
where
    F: FnMut(ScanRecord),
{
    fn emit(&mut self, record: ScanRecord) {
        self(record)
    }
}

/// Totals for a complete dispatch run
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Entries pulled from the directory stream
    pub entries_seen: usize,
    /// Entries handed to the worker pool
    pub files_submitted: usize,
    /// Entries that were not regular files or were ignored
    pub entries_skipped: usize,
    /// Entries whose metadata could not be read
    pub classify_errors: usize,
    /// Workers that could not be started
    pub spawn_failures: usize,
    /// Records received with a match count
    pub files_scanned: usize,
    /// Records with at least one match
    pub files_with_matches: usize,
    /// Sum of all match counts
    pub total_matches: u64,
    /// Records received with an error
    pub scan_failures: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl DispatchSummary {
    pub fn new() -> Self {
        Default::default()
    }

    /// Folds a record into the totals
    pub fn add_record(&mut self, record: &ScanRecord) {
        match record.outcome {
            ScanOutcome::Matched(count) => {
                self.files_scanned += 1;
                if count > 0 {
                    self.files_with_matches += 1;
                    self.total_matches += count;
                }
            }
            ScanOutcome::Failed(_) => self.scan_failures += 1,
        }
    }

    /// Records emitted during the run
    pub fn records(&self) -> usize {
        self.files_scanned + self.scan_failures
    }
}
