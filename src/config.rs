use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Screenlab";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Civil zone every clinical timestamp is authored in, regardless of where
/// the host runs.
pub const DEFAULT_CLINIC_TIMEZONE: &str = "America/New_York";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "screenlab=info,warn"
}

/// Default location of the optional pipeline config file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("screenlab").join("pipeline.json"))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed pipeline config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown clinic time zone '{0}'")]
    UnknownTimeZone(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Tunables for report parsing. Every field has a default, so a config file
/// only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// IANA zone name collection times are interpreted in.
    pub clinic_timezone: String,
    /// Max characters after a substance alias searched for its outcome word.
    pub substance_window_chars: usize,
    /// Share of printable characters below which text is treated as binary.
    pub min_printable_ratio: f32,
    /// Shortest text (after trimming) accepted as a report.
    pub min_text_chars: usize,
    /// Lines from the top searched by header-only strategies.
    pub header_lines: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            clinic_timezone: DEFAULT_CLINIC_TIMEZONE.into(),
            substance_window_chars: 80,
            min_printable_ratio: 0.85,
            min_text_chars: 20,
            header_lines: 15,
        }
    }
}

impl PipelineConfig {
    /// Reject values that would make parsing silently wrong.
    pub fn validate(&self) -> Result<(), ConfigError> {
        jiff::tz::TimeZone::get(&self.clinic_timezone)
            .map_err(|_| ConfigError::UnknownTimeZone(self.clinic_timezone.clone()))?;

        if self.substance_window_chars < 10 {
            return Err(ConfigError::InvalidValue {
                field: "substance_window_chars",
                reason: format!("{} is too small to reach an outcome word", self.substance_window_chars),
            });
        }
        if !(0.0..=1.0).contains(&self.min_printable_ratio) {
            return Err(ConfigError::InvalidValue {
                field: "min_printable_ratio",
                reason: format!("{} is not a ratio", self.min_printable_ratio),
            });
        }
        if self.header_lines == 0 {
            return Err(ConfigError::InvalidValue {
                field: "header_lines",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Load and validate a pipeline config from a JSON file.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: PipelineConfig = serde_json::from_str(&contents)?;
    config.validate()?;
    tracing::info!(path = %path.display(), timezone = %config.clinic_timezone, "Pipeline config loaded");
    Ok(config)
}

/// Load the config from [`default_config_path`], falling back to defaults
/// when no file exists there.
pub fn load_or_default() -> Result<PipelineConfig, ConfigError> {
    match default_config_path() {
        Some(path) if path.exists() => load_config(&path),
        _ => Ok(PipelineConfig::default()),
    }
}
