use std::sync::LazyLock;

use regex::Regex;

use super::instant_panel::InstantPanelParser;
use super::lab_panel::LabPanelParser;
use super::sanitize::text_from_bytes;
use super::types::{ReportFamily, ReportParser};
use super::ExtractionError;
use crate::config::{ConfigError, PipelineConfig};
use crate::models::ExtractedLabRecord;

/// Wording only reference-laboratory reports carry: a tests-ordered block or
/// a chromatography method. Specimen ids and clinic letterheads show up on
/// cups too.
static LAB_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*tests?\s+ordered\b|\b(?:LC|GC)[-/]?MS\b").unwrap()
});

/// Guess the layout family from report wording.
pub fn detect_family(text: &str) -> ReportFamily {
    if LAB_MARKERS.is_match(text) {
        ReportFamily::LabPanel
    } else {
        ReportFamily::InstantPanel
    }
}

/// Routes report text to the parser for its family.
/// Parsers are trait objects so hosts can substitute their own.
pub struct ReportExtractor {
    config: PipelineConfig,
    instant: Box<dyn ReportParser + Send + Sync>,
    lab: Box<dyn ReportParser + Send + Sync>,
}

impl ReportExtractor {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let instant = Box::new(InstantPanelParser::new(config.clone())?);
        let lab = Box::new(LabPanelParser::new(config.clone())?);
        Ok(Self {
            config,
            instant,
            lab,
        })
    }

    /// Build with explicit parsers.
    pub fn with_parsers(
        config: PipelineConfig,
        instant: Box<dyn ReportParser + Send + Sync>,
        lab: Box<dyn ReportParser + Send + Sync>,
    ) -> Self {
        Self {
            config,
            instant,
            lab,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn parser_for(&self, family: ReportFamily) -> &(dyn ReportParser + Send + Sync) {
        match family {
            ReportFamily::InstantPanel => self.instant.as_ref(),
            ReportFamily::LabPanel => self.lab.as_ref(),
        }
    }

    /// Parse text whose family is detected from its wording.
    pub fn extract(&self, text: &str) -> Result<ExtractedLabRecord, ExtractionError> {
        let family = detect_family(text);
        tracing::debug!(family = ?family, "Report family detected");
        self.extract_as(text, family)
    }

    /// Parse text as a known family.
    pub fn extract_as(
        &self,
        text: &str,
        family: ReportFamily,
    ) -> Result<ExtractedLabRecord, ExtractionError> {
        let parser = self.parser_for(family);
        parser.parse(text).inspect_err(|e| {
            tracing::warn!(family = ?parser.family(), error = %e, "Report extraction failed");
        })
    }

    /// Decode upstream-extracted bytes, then parse them.
    pub fn extract_bytes(&self, bytes: &[u8]) -> Result<ExtractedLabRecord, ExtractionError> {
        let text = text_from_bytes(bytes, &self.config)?;
        self.extract(&text)
    }
}

/// One-shot parse with family auto-detection.
pub fn parse_report(
    text: &str,
    config: &PipelineConfig,
) -> Result<ExtractedLabRecord, ExtractionError> {
    ReportExtractor::new(config.clone())?.extract(text)
}

pub fn parse_instant_panel(
    text: &str,
    config: &PipelineConfig,
) -> Result<ExtractedLabRecord, ExtractionError> {
    InstantPanelParser::new(config.clone())?.parse(text)
}

pub fn parse_lab_panel(
    text: &str,
    config: &PipelineConfig,
) -> Result<ExtractedLabRecord, ExtractionError> {
    LabPanelParser::new(config.clone())?.parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalSubstance, LabRecordDraft, ReportKind};

    const CUP: &str = "Donor Name: Jane Doe\nDate Collected: 03/15/2024\nTHC Positive\nCOC Negative";

    const LAB: &str = "\
Acme Toxicology Laboratories
Donor Name: DOE, JANE
Specimen ID: 1
Tests Ordered: 70510 EtG
Ethyl Glucuronide 500 ng/mL Positive
";

    #[test]
    fn family_detection() {
        assert_eq!(detect_family(CUP), ReportFamily::InstantPanel);
        assert_eq!(detect_family(LAB), ReportFamily::LabPanel);
        assert_eq!(
            detect_family("THC LC-MS/MS 15 ng/mL 42"),
            ReportFamily::LabPanel
        );
    }

    #[test]
    fn cup_with_specimen_id_stays_instant() {
        let cup = "\
Lakeside Recovery Clinic
Specimen ID: 4411
Jane Q Doe
Test Description: 12 Panel Instant Cup
Date Collected: 03/15/2024 10:42 AM
FYL Fentanyl Positive
KRAT Kratom Negative
";
        assert_eq!(detect_family(cup), ReportFamily::InstantPanel);
        assert_eq!(
            detect_family("Valley Laboratory Services\nSpecimen ID: 9\nTHC Negative"),
            ReportFamily::InstantPanel
        );

        let record = parse_report(cup, &PipelineConfig::default()).unwrap();
        assert_eq!(record.report_kind(), ReportKind::InstantPanel);
        assert!(record.detected_substances().contains(&CanonicalSubstance::Fentanyl));
        assert!(record.screened_substances().contains(&CanonicalSubstance::Kratom));
    }

    #[test]
    fn parse_report_routes_by_family() {
        let config = PipelineConfig::default();
        let cup = parse_report(CUP, &config).unwrap();
        assert_eq!(cup.report_kind(), ReportKind::InstantPanel);
        assert!(cup.detected_substances().contains(&CanonicalSubstance::Thc));

        let lab = parse_report(LAB, &config).unwrap();
        assert_eq!(lab.report_kind(), ReportKind::EtgPanel);
        assert!(lab.detected_substances().contains(&CanonicalSubstance::Etg));
    }

    #[test]
    fn explicit_family_entry_points() {
        let config = PipelineConfig::default();
        assert_eq!(
            parse_instant_panel(CUP, &config).unwrap().report_kind(),
            ReportKind::InstantPanel
        );
        assert_eq!(
            parse_lab_panel(LAB, &config).unwrap().report_kind(),
            ReportKind::EtgPanel
        );
    }

    #[test]
    fn bad_config_is_extraction_error() {
        let config = PipelineConfig {
            clinic_timezone: "Atlantis/Capital".into(),
            ..Default::default()
        };
        assert!(matches!(
            parse_report(CUP, &config),
            Err(ExtractionError::Config(ConfigError::UnknownTimeZone(_)))
        ));
    }

    #[test]
    fn extract_bytes_decodes_first() {
        let extractor = ReportExtractor::new(PipelineConfig::default()).unwrap();
        let record = extractor.extract_bytes(CUP.as_bytes()).unwrap();
        assert_eq!(record.donor_name(), Some("Jane Doe"));
        assert!(matches!(
            extractor.extract_bytes(b"%PDF-1.7 ..."),
            Err(ExtractionError::RawPdf)
        ));
    }

    struct FixedParser;

    impl ReportParser for FixedParser {
        fn family(&self) -> ReportFamily {
            ReportFamily::InstantPanel
        }

        fn parse(&self, text: &str) -> Result<ExtractedLabRecord, ExtractionError> {
            Ok(ExtractedLabRecord::from(LabRecordDraft {
                donor_name: Some("Fixed Donor".into()),
                raw_text: text.into(),
                ..Default::default()
            }))
        }
    }

    #[test]
    fn injected_parsers_are_used() {
        let extractor = ReportExtractor::with_parsers(
            PipelineConfig::default(),
            Box::new(FixedParser),
            Box::new(FixedParser),
        );
        let record = extractor.extract("anything at all").unwrap();
        assert_eq!(record.donor_name(), Some("Fixed Donor"));
        assert_eq!(extractor.config().header_lines, 15);
    }
}
