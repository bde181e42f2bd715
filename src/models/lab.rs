use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Confidence, ConfirmationOutcome, ExtractedField, ReportKind};
use super::substance::CanonicalSubstance;

/// One laboratory confirmation line as read from a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationFinding {
    pub substance: CanonicalSubstance,
    pub outcome: ConfirmationOutcome,
}

/// Mutable assembly area for the report parsers.
///
/// Turned into an [`ExtractedLabRecord`] once parsing is done, which is the
/// only place confidence gets computed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabRecordDraft {
    #[serde(default)]
    pub donor_name: Option<String>,
    #[serde(default)]
    pub collection_instant: Option<DateTime<Utc>>,
    #[serde(default)]
    pub detected_substances: BTreeSet<CanonicalSubstance>,
    #[serde(default)]
    pub screened_substances: BTreeSet<CanonicalSubstance>,
    #[serde(default)]
    pub is_dilute: bool,
    #[serde(default)]
    pub report_kind: Option<ReportKind>,
    #[serde(default)]
    pub confirmation_results: Vec<ConfirmationFinding>,
    /// Which named strategy produced each recovered field.
    #[serde(default)]
    pub field_strategies: BTreeMap<ExtractedField, String>,
    #[serde(default)]
    pub raw_text: String,
}

/// Structured output of parsing one report.
///
/// Fields are read-only so `confidence` can never drift from the fields it is
/// derived from. Deserializing goes through [`LabRecordDraft`], which discards
/// any stored confidence and recomputes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LabRecordDraft")]
pub struct ExtractedLabRecord {
    donor_name: Option<String>,
    collection_instant: Option<DateTime<Utc>>,
    detected_substances: BTreeSet<CanonicalSubstance>,
    screened_substances: BTreeSet<CanonicalSubstance>,
    is_dilute: bool,
    report_kind: ReportKind,
    confirmation_results: Vec<ConfirmationFinding>,
    confidence: Confidence,
    field_strategies: BTreeMap<ExtractedField, String>,
    raw_text: String,
}

impl From<LabRecordDraft> for ExtractedLabRecord {
    fn from(draft: LabRecordDraft) -> Self {
        let donor_name = draft
            .donor_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let confidence =
            Confidence::from_presence(donor_name.is_some(), draft.collection_instant.is_some());

        // Detected substances are a subset of those with any screen outcome.
        let mut screened_substances = draft.screened_substances;
        screened_substances.extend(draft.detected_substances.iter().copied());

        Self {
            donor_name,
            collection_instant: draft.collection_instant,
            detected_substances: draft.detected_substances,
            screened_substances,
            is_dilute: draft.is_dilute,
            report_kind: draft.report_kind.unwrap_or(ReportKind::InstantPanel),
            confirmation_results: draft.confirmation_results,
            confidence,
            field_strategies: draft.field_strategies,
            raw_text: draft.raw_text,
        }
    }
}

impl ExtractedLabRecord {
    pub fn donor_name(&self) -> Option<&str> {
        self.donor_name.as_deref()
    }

    pub fn collection_instant(&self) -> Option<DateTime<Utc>> {
        self.collection_instant
    }

    /// Substances with a positive-family screen outcome.
    pub fn detected_substances(&self) -> &BTreeSet<CanonicalSubstance> {
        &self.detected_substances
    }

    /// Substances with any explicit screen outcome, positive or negative.
    pub fn screened_substances(&self) -> &BTreeSet<CanonicalSubstance> {
        &self.screened_substances
    }

    pub fn is_dilute(&self) -> bool {
        self.is_dilute
    }

    pub fn report_kind(&self) -> ReportKind {
        self.report_kind
    }

    pub fn confirmation_results(&self) -> &[ConfirmationFinding] {
        &self.confirmation_results
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn extracted_fields(&self) -> impl Iterator<Item = ExtractedField> + '_ {
        self.field_strategies.keys().copied()
    }

    pub fn field_strategy(&self, field: ExtractedField) -> Option<&str> {
        self.field_strategies.get(&field).map(String::as_str)
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }
}
