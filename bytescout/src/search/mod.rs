//! Bounded-concurrency scanning.
//!
//! `engine` drives the scan: it pulls entry names from a directory stream,
//! classifies them and hands regular files to the `pool`. The pool keeps at
//! most N workers alive, each running the `matcher` over one file and
//! reporting back over a channel. Results are streamed to a `ResultSink` in
//! completion order.

pub mod engine;
pub mod matcher;
pub mod pool;

pub use engine::{scan, Dispatcher};
pub use matcher::{count_matches, ByteMatcher, FileScanner};
pub use pool::{Launcher, PoolState, PoolStats, ThreadLauncher, WorkItem, WorkerPool};
