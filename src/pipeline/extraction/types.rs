use serde::{Deserialize, Serialize};

use super::ExtractionError;
use crate::models::{CanonicalSubstance, ExtractedLabRecord};

/// Which layout family a report belongs to. Chooses the parser; the exact
/// [`crate::models::ReportKind`] is decided by the parser itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFamily {
    /// Point-of-care cup or dip card read at the clinic.
    InstantPanel,
    /// Reference-laboratory report, possibly with confirmations.
    LabPanel,
}

/// Review flags raised on a parsed record. None of them is an error; they
/// tell a reviewer where to look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExtractionWarning {
    MissingDonorName,
    MissingCollectionInstant,
    DiluteSpecimen,
    /// Panel substances with no readable screen outcome.
    UnreportedSubstances { substances: Vec<CanonicalSubstance> },
    /// Confirmation lines the parser could not classify.
    InconclusiveConfirmations { substances: Vec<CanonicalSubstance> },
}

/// Parses sanitized report text of one family.
pub trait ReportParser {
    fn family(&self) -> ReportFamily;

    fn parse(&self, text: &str) -> Result<ExtractedLabRecord, ExtractionError>;
}
