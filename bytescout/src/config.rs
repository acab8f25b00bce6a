use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{ScoutError, ScoutResult};
use crate::pattern::Pattern;

/// Configuration for a scan.
///
/// # Configuration Locations
///
/// Loaded from the following files, later ones taking precedence:
/// 1. Global `$CONFIG_DIR/bytescout/config.yaml`
/// 2. Local `.bytescout.yaml` in the current directory
/// 3. Custom config file specified via `--config`
///
/// Command-line arguments override all of them, see `merge_with_cli`.
///
/// # Configuration Format
///
/// ```yaml
/// # Directory to scan
/// root_path: "/var/data"
///
/// # Byte pattern as hex, 1 to 255 bytes
/// pattern: "DEADBEEF"
///
/// # Maximum number of files scanned at the same time
/// capacity: 4
///
/// # Descend into subdirectories
/// recursive: false
///
/// # Entries to skip (glob syntax, relative to root_path)
/// ignore_patterns:
///   - "*.tmp"
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanConfig {
    /// Directory whose entries are scanned
    #[serde(default = "default_root_path")]
    pub root_path: PathBuf,

    /// Hex encoded byte pattern
    #[serde(default)]
    pub pattern: String,

    /// Maximum number of concurrently running workers
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Walk subdirectories instead of only the root's direct entries
    #[serde(default)]
    pub recursive: bool,

    /// Glob patterns for entries to skip
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_root_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_capacity() -> usize {
    num_cpus::get()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            pattern: String::new(),
            capacity: default_capacity(),
            recursive: false,
            ignore_patterns: Vec::new(),
            log_level: default_log_level(),
        }
    }
}

impl ScanConfig {
    /// Creates a configuration with the given root, hex pattern and capacity
    pub fn new(root_path: impl Into<PathBuf>, pattern: impl Into<String>, capacity: usize) -> Self {
        Self {
            root_path: root_path.into(),
            pattern: pattern.into(),
            capacity,
            ..Default::default()
        }
    }

    /// Loads configuration from the default locations, adding a specific
    /// file on top when one is given
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("bytescout/config.yaml")),
            Some(PathBuf::from(".bytescout.yaml")),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicitly requested file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }

    /// Merges CLI arguments with configuration file values.
    ///
    /// Root path, capacity and log level always come from the CLI side;
    /// callers seed them from the file config when the user did not pass
    /// them. Other fields left at their defaults on the CLI side keep the
    /// file value.
    pub fn merge_with_cli(mut self, cli_config: ScanConfig) -> Self {
        self.root_path = cli_config.root_path;
        self.capacity = cli_config.capacity;
        self.log_level = cli_config.log_level;
        if !cli_config.pattern.is_empty() {
            self.pattern = cli_config.pattern;
        }
        if cli_config.recursive {
            self.recursive = true;
        }
        if !cli_config.ignore_patterns.is_empty() {
            self.ignore_patterns = cli_config.ignore_patterns;
        }
        self
    }

    /// Checks everything that must hold before workers start and returns the
    /// decoded pattern.
    pub fn validate(&self) -> ScoutResult<Pattern> {
        let pattern = Pattern::from_hex(&self.pattern)?;
        if self.capacity == 0 {
            return Err(ScoutError::InvalidCapacity(self.capacity));
        }
        if !self.root_path.is_dir() {
            return Err(ScoutError::config_error(format!(
                "{} is not a readable directory",
                self.root_path.display()
            )));
        }
        Ok(pattern)
    }
}
