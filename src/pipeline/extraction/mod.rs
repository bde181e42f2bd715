pub mod types;
pub mod confidence;
pub mod sanitize;
pub mod normalize;
pub mod datetime;
pub mod strategy;
pub mod fields;
pub mod substances;
pub mod instant_panel;
pub mod lab_panel;
pub mod orchestrator;

pub use types::*;
pub use confidence::*;
pub use sanitize::*;
pub use normalize::{panel_substances, SubstanceTable};
pub use datetime::CollectionTimeResolver;
pub use instant_panel::InstantPanelParser;
pub use lab_panel::LabPanelParser;
pub use orchestrator::*;

use thiserror::Error;

use crate::config::ConfigError;

/// Hard failures: the input is not a readable drug-test report. No partial
/// record is ever returned alongside one of these.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Report text is empty")]
    EmptyText,

    #[error("Text encoding error: {0}")]
    Encoding(String),

    #[error("Input is a raw PDF; run text extraction before parsing")]
    RawPdf,

    #[error("Report text is unreadable ({printable_ratio:.2} printable)")]
    Unreadable { printable_ratio: f32 },

    #[error("Report text too short ({chars} chars, need at least {min})")]
    TooShort { chars: usize, min: usize },

    #[error("No screening results found; not a drug-test report")]
    NoScreenResults,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
