use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::matcher::{ByteMatcher, FileScanner};
use super::pool::{WorkItem, WorkerPool};
use crate::config::ScanConfig;
use crate::errors::{ScoutError, ScoutResult};
use crate::filters::{EntryKind, FileClassifier};
use crate::results::{DispatchSummary, ResultSink, ScanRecord};
use crate::stream::DirectoryStream;

/// Feeds directory entries through the classifier into a worker pool.
pub struct Dispatcher<S: FileScanner> {
    classifier: FileClassifier,
    pool: WorkerPool<S>,
}

/// Wraps the caller's sink so every record also lands in the summary
struct CountingSink<'a, K: ResultSink + ?Sized> {
    inner: &'a mut K,
    summary: &'a mut DispatchSummary,
}

impl<K: ResultSink + ?Sized> ResultSink for CountingSink<'_, K> {
    fn emit(&mut self, record: ScanRecord) {
        self.summary.add_record(&record);
        self.inner.emit(record);
    }
}

impl<S: FileScanner> Dispatcher<S> {
    pub fn new(classifier: FileClassifier, pool: WorkerPool<S>) -> Self {
        Self { classifier, pool }
    }

    pub fn pool(&self) -> &WorkerPool<S> {
        &self.pool
    }

    /// Classifies every entry and scans the regular files.
    ///
    /// Records are emitted to `sink` as workers finish, in completion order.
    /// Returns once the stream is exhausted and every worker has been
    /// reaped.
    pub fn run<I, K>(&mut self, entries: I, sink: &mut K) -> DispatchSummary
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
        K: ResultSink + ?Sized,
    {
        let started = Instant::now();
        let mut summary = DispatchSummary::new();
        let mut spawn_failures = 0;
        let mut submitted = 0;

        {
            let mut sink = CountingSink {
                inner: sink,
                summary: &mut summary,
            };

            for entry in entries {
                sink.summary.entries_seen += 1;
                match self.classifier.classify(entry.as_ref()) {
                    EntryKind::Regular(path) => {
                        match self.pool.submit(WorkItem::new(path), &mut sink) {
                            Ok(()) => submitted += 1,
                            Err(e) => {
                                warn!("{}", e);
                                spawn_failures += 1;
                            }
                        }
                    }
                    EntryKind::Skip(path) => {
                        debug!("Skipping non-regular entry: {}", path.display());
                        sink.summary.entries_skipped += 1;
                    }
                    EntryKind::Error(e) => {
                        warn!("{}", e);
                        sink.summary.classify_errors += 1;
                    }
                }
            }

            self.pool.drain(&mut sink);
            while self.pool.reap_one_nonblocking(&mut sink) {}
        }

        debug_assert_eq!(self.pool.active_count(), 0);
        summary.files_submitted = submitted;
        summary.spawn_failures = spawn_failures;
        summary.elapsed = started.elapsed();

        info!(
            "Dispatch complete in {:?}. {} entries, {} files scanned, {} matches in {} files",
            summary.elapsed,
            summary.entries_seen,
            summary.records(),
            summary.total_matches,
            summary.files_with_matches
        );
        summary
    }
}

/// Scans the directory described by `config`, streaming records to `sink`
pub fn scan<K>(config: &ScanConfig, sink: &mut K) -> ScoutResult<DispatchSummary>
where
    K: ResultSink + ?Sized,
{
    let pattern = config.validate()?;
    info!(
        "Starting scan of {} for {} ({} bytes) with capacity {}",
        config.root_path.display(),
        pattern,
        pattern.len(),
        config.capacity
    );

    let capacity =
        NonZeroUsize::new(config.capacity).ok_or(ScoutError::InvalidCapacity(config.capacity))?;
    let classifier = FileClassifier::new(&config.root_path)
        .with_ignore_patterns(&config.ignore_patterns)
        .map_err(|e| ScoutError::config_error(format!("invalid ignore pattern: {}", e)))?;
    let entries = DirectoryStream::open(&config.root_path, config.recursive)?;

    let matcher = ByteMatcher::new(pattern);
    let metrics = matcher.metrics().clone();
    let mut dispatcher = Dispatcher::new(classifier, WorkerPool::new(matcher, capacity));

    let summary = dispatcher.run(entries, sink);
    metrics.log_stats();

    Ok(summary)
}
