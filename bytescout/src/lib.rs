pub mod config;
pub mod errors;
pub mod filters;
pub mod metrics;
pub mod pattern;
pub mod results;
pub mod search;
pub mod stream;

pub use config::ScanConfig;
pub use errors::{ClassifyError, ScanError, ScoutError, ScoutResult, SpawnError};
pub use pattern::Pattern;
pub use results::{DispatchSummary, ResultSink, ScanOutcome, ScanRecord};
pub use search::scan;
