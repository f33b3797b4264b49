//! Configuration loading and range clamping.
//!
//! Configuration can come from an optional TOML file, with CLI flags
//! overriding individual values (the shell does the overriding). A missing
//! or empty file yields `Config::default()`. Every knob is clamped to its
//! documented range by [`Config::clamped`] before the engine is built; the
//! engine never sees an out-of-range value.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to load template file: {0}")]
    Template(String),

    #[error("Failed to create output directory {}: {}", .0.display(), .1)]
    OutputDir(PathBuf, std::io::Error),
}

/// Aggregator configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified; missing keys fall back to the built-in defaults.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory for the rendered HTML pages. Created if necessary.
    pub output_dir: PathBuf,

    /// Per-request fetch timeout in seconds. Clamped to [1, 60].
    pub fetch_timeout_secs: u64,

    /// Minutes between update cycles. Clamped to [1, 30].
    pub update_interval_mins: u64,

    /// Items per rendered page. Clamped to [2, 500]. A new archive page is
    /// only created once the index would otherwise hold twice this number.
    pub items_per_page: usize,

    /// Minimum seconds between requests to the same host. Clamped to
    /// [10, 86400].
    pub min_domain_interval_secs: u64,

    /// Custom page template file. The built-in layout is used when unset.
    pub template_file: Option<PathBuf>,

    /// OPML file to bulk-import at startup.
    pub opml_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./news"),
            fetch_timeout_secs: 10,
            update_interval_mins: 10,
            items_per_page: 500,
            min_domain_interval_secs: 30,
            template_file: None,
            opml_file: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Clamps every knob to its documented range, warning per adjustment.
    pub fn clamped(mut self) -> Self {
        self.fetch_timeout_secs = clamp("fetch_timeout_secs", self.fetch_timeout_secs, 1, 60);
        self.update_interval_mins = clamp("update_interval_mins", self.update_interval_mins, 1, 30);
        self.items_per_page = clamp("items_per_page", self.items_per_page, 2, 500);
        self.min_domain_interval_secs = clamp(
            "min_domain_interval_secs",
            self.min_domain_interval_secs,
            10,
            86_400,
        );
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_mins * 60)
    }

    pub fn min_domain_interval(&self) -> Duration {
        Duration::from_secs(self.min_domain_interval_secs)
    }
}

fn clamp<T: Ord + Copy + std::fmt::Display>(name: &str, value: T, min: T, max: T) -> T {
    let clamped = value.clamp(min, max);
    if clamped != value {
        tracing::warn!(setting = name, given = %value, used = %clamped, "config value out of range, clamped");
    }
    clamped
}
