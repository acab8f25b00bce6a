use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use std::collections::HashMap;
use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

use super::matcher::FileScanner;
use crate::errors::{ScanError, SpawnError};
use crate::results::{ResultSink, ScanRecord};

/// A file accepted for scanning. Consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub path: PathBuf,
}

impl WorkItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Slot accounting, owned by the controlling thread only
#[derive(Debug, Clone, Copy)]
pub struct PoolState {
    active_count: usize,
    capacity: NonZeroUsize,
}

impl PoolState {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            active_count: 0,
            capacity,
        }
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn has_free_slot(&self) -> bool {
        self.active_count < self.capacity.get()
    }

    pub fn is_idle(&self) -> bool {
        self.active_count == 0
    }

    fn occupy(&mut self) {
        debug_assert!(self.has_free_slot(), "occupying a slot at capacity");
        self.active_count += 1;
    }

    fn release(&mut self) {
        debug_assert!(!self.is_idle(), "releasing a slot with none active");
        self.active_count -= 1;
    }
}

/// Lifetime counters of a pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub spawned: usize,
    pub reaped: usize,
    pub spawn_failures: usize,
    pub peak_active: usize,
}

/// Starts execution units. The default runs each unit on its own OS thread.
pub trait Launcher: Send {
    fn launch(
        &self,
        name: String,
        job: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>>;
}

/// Launches every unit on a fresh named thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadLauncher;

impl Launcher for ThreadLauncher {
    fn launch(
        &self,
        name: String,
        job: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>> {
        thread::Builder::new().name(name).spawn(job)
    }
}

/// Message a unit sends when it is done
struct Completion {
    slot: u64,
    record: ScanRecord,
}

/// Reports completion exactly once, even if the scan panics.
///
/// Created as the first thing a unit does, so a unit that never started
/// reports nothing.
struct CompletionGuard {
    slot: u64,
    worker: String,
    path: Option<PathBuf>,
    tx: Sender<Completion>,
}

impl CompletionGuard {
    fn complete(mut self, result: Result<u64, ScanError>) {
        if let Some(path) = self.path.take() {
            self.send(ScanRecord::new(path, result));
        }
    }

    fn send(&self, record: ScanRecord) {
        // The receiver lives as long as the pool, which outlives its units.
        let _ = self.tx.send(Completion {
            slot: self.slot,
            record: record.with_worker(self.worker.clone()),
        });
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let error = ScanError::aborted(path.clone());
            self.send(ScanRecord::new(path, Err(error)));
        }
    }
}

/// Runs at most `capacity` scans at once.
///
/// The pool is driven from a single thread: `submit`, `drain` and
/// `reap_one_nonblocking` take `&mut self`, so slot accounting needs no
/// lock. Workers talk back only through the completion channel.
pub struct WorkerPool<S: FileScanner> {
    scanner: Arc<S>,
    launcher: Box<dyn Launcher>,
    state: PoolState,
    units: HashMap<u64, JoinHandle<()>>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    next_slot: u64,
    stats: PoolStats,
}

impl<S: FileScanner> WorkerPool<S> {
    pub fn new(scanner: S, capacity: NonZeroUsize) -> Self {
        Self::with_launcher(scanner, capacity, Box::new(ThreadLauncher::default()))
    }

    pub fn with_launcher(scanner: S, capacity: NonZeroUsize, launcher: Box<dyn Launcher>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            scanner: Arc::new(scanner),
            launcher,
            state: PoolState::new(capacity),
            units: HashMap::with_capacity(capacity.get()),
            tx,
            rx,
            next_slot: 0,
            stats: PoolStats::default(),
        }
    }

    pub fn active_count(&self) -> usize {
        self.state.active_count()
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity()
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub fn scanner(&self) -> &S {
        &self.scanner
    }

    /// Admits `item`, blocking only while every slot is taken.
    ///
    /// Finished units are reaped opportunistically first. Records of reaped
    /// units go to `sink`. If the unit cannot be started the slot stays free
    /// and the error is handed back; nothing is retried.
    pub fn submit<K>(&mut self, item: WorkItem, sink: &mut K) -> Result<(), SpawnError>
    where
        K: ResultSink + ?Sized,
    {
        while self.reap_one_nonblocking(sink) {}

        if !self.state.has_free_slot() {
            trace!(
                "Pool at capacity ({}), waiting for a worker to finish",
                self.capacity()
            );
            self.reap_one_blocking(sink);
        }

        self.spawn(item)
    }

    /// Reaps one finished unit if there is one, without waiting
    pub fn reap_one_nonblocking<K>(&mut self, sink: &mut K) -> bool
    where
        K: ResultSink + ?Sized,
    {
        match self.rx.try_recv() {
            Ok(completion) => {
                self.finish(completion, sink);
                true
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }

    /// Waits for any one outstanding unit. Returns false when none is active.
    pub fn reap_one_blocking<K>(&mut self, sink: &mut K) -> bool
    where
        K: ResultSink + ?Sized,
    {
        if self.state.is_idle() {
            return false;
        }
        // Every started unit sends exactly one completion and the pool holds
        // a sender itself, so this cannot disconnect while units are active.
        match self.rx.recv() {
            Ok(completion) => {
                self.finish(completion, sink);
                true
            }
            Err(_) => false,
        }
    }

    /// Blocks until every outstanding unit has completed. Returns how many
    /// units were reaped.
    pub fn drain<K>(&mut self, sink: &mut K) -> usize
    where
        K: ResultSink + ?Sized,
    {
        let mut reaped = 0;
        while self.reap_one_blocking(sink) {
            reaped += 1;
        }
        debug!("Pool drained, {} workers reaped", reaped);
        reaped
    }

    fn spawn(&mut self, item: WorkItem) -> Result<(), SpawnError> {
        let slot = self.next_slot;
        self.next_slot += 1;

        let scanner = Arc::clone(&self.scanner);
        let tx = self.tx.clone();
        let path = item.path.clone();
        let name = format!("scan-{}", slot);
        let worker = name.clone();
        let job = Box::new(move || {
            let guard = CompletionGuard {
                slot,
                worker,
                path: Some(item.path.clone()),
                tx,
            };
            let result = scanner.scan(&item.path);
            guard.complete(result);
        });

        match self.launcher.launch(name, job) {
            Ok(handle) => {
                self.units.insert(slot, handle);
                self.state.occupy();
                self.stats.spawned += 1;
                self.stats.peak_active = self.stats.peak_active.max(self.state.active_count());
                debug!(
                    "Started worker {} for {} ({}/{} active)",
                    slot,
                    path.display(),
                    self.active_count(),
                    self.capacity()
                );
                Ok(())
            }
            Err(source) => {
                self.stats.spawn_failures += 1;
                warn!("Failed to start worker for {}: {}", path.display(), source);
                Err(SpawnError { path, source })
            }
        }
    }

    fn finish<K>(&mut self, completion: Completion, sink: &mut K)
    where
        K: ResultSink + ?Sized,
    {
        let Completion { slot, record } = completion;

        if let Some(handle) = self.units.remove(&slot) {
            if handle.join().is_err() {
                warn!("Worker {} for {} panicked", slot, record.path.display());
            }
        }

        self.state.release();
        self.stats.reaped += 1;
        debug!(
            "Reaped worker {} ({}/{} active)",
            slot,
            self.active_count(),
            self.capacity()
        );
        sink.emit(record);
    }
}

impl<S: FileScanner> Drop for WorkerPool<S> {
    fn drop(&mut self) {
        if self.units.is_empty() {
            return;
        }
        warn!(
            "Worker pool dropped with {} active workers, discarding their results",
            self.units.len()
        );
        for (_, handle) in self.units.drain() {
            let _ = handle.join();
        }
    }
}
