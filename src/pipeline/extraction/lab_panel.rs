//! Reference-laboratory reports (11-panel, 17-panel, EtG panel).

use std::sync::LazyLock;

use regex::Regex;

use super::datetime::CollectionTimeResolver;
use super::fields::{collected_inline, extract_identity, labeled_collection_date, CivilStamp};
use super::normalize::{panel_substances, SubstanceTable};
use super::sanitize::prepare_text;
use super::strategy::{ReportText, Strategy};
use super::substances::{detect_confirmations, detect_substances, is_dilute, split_confirmation_section};
use super::types::{ReportFamily, ReportParser};
use super::ExtractionError;
use crate::config::{ConfigError, PipelineConfig};
use crate::models::{
    CanonicalSubstance, ExtractedField, ExtractedLabRecord, LabRecordDraft, ReportKind,
};

static TESTS_ORDERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^tests?\s+ordered\s*[:\-]?\s*(.*)$").unwrap());

/// Lines that open the next section and end the tests-ordered block.
static SECTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:screening|confirmation|specimen|collection|donor|received|reported|results?|substance|analyte)\b").unwrap()
});

static ETG_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:70510|ethyl\s+glucuronide|etg)\b").unwrap()
});

static PANEL_17_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:10330|17[\s-]*panel)\b").unwrap());

static LAB_DONOR_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:donor\s+name|donor|patient\s+name|name)\s*[:\-]\s*(.+)$").unwrap()
});

static DONOR_INFO_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^donor\s+information\s*:?$").unwrap());

static SPECIMEN_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^specimen\s+(?:id|number|no\.?|#)").unwrap());

// ═══════════════════════════════════════════
// Report kind
// ═══════════════════════════════════════════

/// Text of the tests-ordered block: the labeled line plus up to two
/// continuation lines.
fn tests_ordered_block(report: &ReportText<'_>) -> Option<String> {
    let index = report.find_line(&TESTS_ORDERED)?;
    let lines = report.lines();
    let mut block = TESTS_ORDERED
        .captures(lines[index])
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    for line in lines.iter().skip(index + 1).take(2) {
        if SECTION_HEADER.is_match(line) {
            break;
        }
        block.push(' ');
        block.push_str(line);
    }
    Some(block)
}

/// Decide the panel from the tests-ordered block. EtG beats 17-panel; with
/// neither marker (or no block at all) the report is an 11-panel.
pub fn detect_report_kind(report: &ReportText<'_>) -> ReportKind {
    let Some(block) = tests_ordered_block(report) else {
        tracing::debug!("No tests-ordered section; assuming 11-panel");
        return ReportKind::Panel11;
    };
    if ETG_MARKER.is_match(&block) {
        ReportKind::EtgPanel
    } else if PANEL_17_MARKER.is_match(&block) {
        ReportKind::Panel17
    } else {
        ReportKind::Panel11
    }
}

// ═══════════════════════════════════════════
// Name strategies
// ═══════════════════════════════════════════

/// "Donor Name: DOE, JOHN".
pub fn labeled_donor_name(report: &ReportText<'_>) -> Option<String> {
    report.lines().iter().find_map(|line| {
        LAB_DONOR_LABEL
            .captures(line)
            .map(|c| c[1].trim().to_string())
    })
}

/// Name on the line under a "Donor Information" heading.
pub fn after_donor_information(report: &ReportText<'_>) -> Option<String> {
    let index = report.find_line(&DONOR_INFO_HEADER)?;
    report.line_after(index).map(str::to_string)
}

/// Name on the line above "Specimen ID".
pub fn before_specimen_id(report: &ReportText<'_>) -> Option<String> {
    let index = report.find_line(&SPECIMEN_ID)?;
    report.line_before(index).map(str::to_string)
}

const NAME_STRATEGIES: &[Strategy<String>] = &[
    Strategy::new("labeled_donor_name", labeled_donor_name),
    Strategy::new("after_donor_information", after_donor_information),
    Strategy::new("before_specimen_id", before_specimen_id),
];

const DATE_STRATEGIES: &[Strategy<CivilStamp>] = &[
    Strategy::new("labeled_collection_date", labeled_collection_date),
    Strategy::new("collected_inline", collected_inline),
];

/// Substances to search for. An EtG order that also names the 17-panel
/// keeps the `etg_panel` kind but screens the union of both panels.
fn ordered_substances(report: &ReportText<'_>, kind: ReportKind) -> Vec<CanonicalSubstance> {
    let mut substances = panel_substances(kind).to_vec();
    let combined = kind == ReportKind::EtgPanel
        && tests_ordered_block(report).is_some_and(|block| PANEL_17_MARKER.is_match(&block));
    if combined {
        tracing::debug!("EtG ordered with the 17-panel; screening both panels");
        for substance in panel_substances(ReportKind::Panel17) {
            if !substances.contains(substance) {
                substances.push(*substance);
            }
        }
    }
    substances
}

// ═══════════════════════════════════════════
// Parser
// ═══════════════════════════════════════════

pub struct LabPanelParser {
    config: PipelineConfig,
    resolver: CollectionTimeResolver,
}

impl LabPanelParser {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        let resolver = CollectionTimeResolver::from_config(&config)?;
        Ok(Self { config, resolver })
    }
}

impl ReportParser for LabPanelParser {
    fn family(&self) -> ReportFamily {
        ReportFamily::LabPanel
    }

    fn parse(&self, text: &str) -> Result<ExtractedLabRecord, ExtractionError> {
        let clean = prepare_text(text, &self.config)?;
        let report = ReportText::new(&clean, self.config.header_lines);

        // Kind picks the panel, so it must be known before detection.
        let kind = detect_report_kind(&report);
        let table = SubstanceTable::for_kind(kind);

        let (screen_section, confirmation_section) = split_confirmation_section(&clean);
        let findings = detect_substances(
            screen_section,
            table,
            &ordered_substances(&report, kind),
            self.config.substance_window_chars,
        );
        if findings.screened.is_empty() {
            return Err(ExtractionError::NoScreenResults);
        }

        let mut draft = LabRecordDraft {
            report_kind: Some(kind),
            is_dilute: is_dilute(&clean),
            confirmation_results: detect_confirmations(confirmation_section.unwrap_or(clean.as_str())),
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
        if !draft.confirmation_results.is_empty() {
            draft
                .field_strategies
                .insert(ExtractedField::ConfirmationResults, "confirmation_line".into());
        }
        draft.detected_substances = findings.detected;
        draft.screened_substances = findings.screened;
        draft.raw_text = text.to_string();

        let record = ExtractedLabRecord::from(draft);
        tracing::info!(
            kind = %kind,
            confidence = %record.confidence(),
            detected = record.detected_substances().len(),
            confirmations = record.confirmation_results().len(),
            "Lab-panel report parsed"
        );
        Ok(record)
    }
}
