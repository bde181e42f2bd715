//! Instant-panel (point-of-care cup) reports.

use std::sync::LazyLock;

use regex::Regex;

use super::datetime::CollectionTimeResolver;
use super::fields::{
    collected_inline, extract_identity, header_date, labeled_collection_date, CivilStamp,
};
use super::normalize::{panel_substances, SubstanceTable};
use super::sanitize::prepare_text;
use super::strategy::{ReportText, Strategy};
use super::substances::{detect_substances, is_dilute};
use super::types::{ReportFamily, ReportParser};
use super::ExtractionError;
use crate::config::{ConfigError, PipelineConfig};
use crate::models::{ExtractedField, ExtractedLabRecord, LabRecordDraft, ReportKind};

static LABELED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:donor|client|patient|participant)(?:'s)?\s*name\s*[:\-]\s*(.+)$").unwrap()
});

static PHONE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(?\b\d{3}\)?[\s.\-]?\d{3}[\-.\s]\d{4}\b").unwrap());

static TEST_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^test\s+description\b").unwrap());

static DONOR_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:donor|client)(?:'s)?\s+signature\s*[:\-]?\s*(.*)$").unwrap()
});

/// "Donor Name: Jane Doe".
pub fn labeled_name(report: &ReportText<'_>) -> Option<String> {
    report
        .lines()
        .iter()
        .find_map(|line| LABELED_NAME.captures(line).map(|c| c[1].trim().to_string()))
}

/// Cups print the clinic phone number directly above the donor.
pub fn after_phone_line(report: &ReportText<'_>) -> Option<String> {
    let index = report.find_line(&PHONE_LINE)?;
    report.line_after(index).map(str::to_string)
}

/// Donor printed just above the "Test Description" row.
pub fn before_test_description(report: &ReportText<'_>) -> Option<String> {
    let index = report.find_line(&TEST_DESCRIPTION)?;
    report.line_before(index).map(str::to_string)
}

/// Name written on the signature line, or printed under it.
pub fn near_donor_signature(report: &ReportText<'_>) -> Option<String> {
    let index = report.find_line(&DONOR_SIGNATURE)?;
    let inline = DONOR_SIGNATURE
        .captures(report.lines()[index])
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_matches(|c: char| c == '_' || c.is_whitespace()))
        .filter(|s| !s.is_empty());
    match inline {
        Some(name) => Some(name.to_string()),
        None => report.line_after(index).map(str::to_string),
    }
}

const NAME_STRATEGIES: &[Strategy<String>] = &[
    Strategy::new("labeled_name", labeled_name),
    Strategy::new("after_phone_line", after_phone_line),
    Strategy::new("before_test_description", before_test_description),
    Strategy::new("near_donor_signature", near_donor_signature),
];

const DATE_STRATEGIES: &[Strategy<CivilStamp>] = &[
    Strategy::new("labeled_collection_date", labeled_collection_date),
    Strategy::new("collected_inline", collected_inline),
    Strategy::new("header_date", header_date),
];

pub struct InstantPanelParser {
    config: PipelineConfig,
    resolver: CollectionTimeResolver,
}

impl InstantPanelParser {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        let resolver = CollectionTimeResolver::from_config(&config)?;
        Ok(Self { config, resolver })
    }
}

impl ReportParser for InstantPanelParser {
    fn family(&self) -> ReportFamily {
        ReportFamily::InstantPanel
    }

    fn parse(&self, text: &str) -> Result<ExtractedLabRecord, ExtractionError> {
        let clean = prepare_text(text, &self.config)?;
        let report = ReportText::new(&clean, self.config.header_lines);

        let kind = ReportKind::InstantPanel;
        let findings = detect_substances(
            &clean,
            SubstanceTable::InstantPanel,
            panel_substances(kind),
            self.config.substance_window_chars,
        );
        if findings.screened.is_empty() {
            return Err(ExtractionError::NoScreenResults);
        }

        let mut draft = LabRecordDraft {
            report_kind: Some(kind),
            is_dilute: is_dilute(&clean),
            ..Default::default()
        };
        extract_identity(&report, NAME_STRATEGIES, DATE_STRATEGIES, &self.resolver, &mut draft);

        draft
            .field_strategies
            .insert(ExtractedField::DetectedSubstances, "screen_outcome_window".into());
        if draft.is_dilute {
            draft
                .field_strategies
                .insert(ExtractedField::Dilution, "dilute_line".into());
        }
        draft.detected_substances = findings.detected;
        draft.screened_substances = findings.screened;
        draft.raw_text = text.to_string();

        let record = ExtractedLabRecord::from(draft);
        tracing::info!(
            confidence = %record.confidence(),
            detected = record.detected_substances().len(),
            screened = record.screened_substances().len(),
            "Instant-panel report parsed"
        );
        Ok(record)
    }
}
