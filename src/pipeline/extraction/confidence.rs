use super::normalize::panel_substances;
use super::types::ExtractionWarning;
use crate::models::{CanonicalSubstance, ConfirmationOutcome, ExtractedLabRecord};

/// Review flags for a parsed record. Field misses show up here and in the
/// record's confidence; they never fail the parse.
pub fn review_warnings(record: &ExtractedLabRecord) -> Vec<ExtractionWarning> {
    let mut warnings = Vec::new();

    if record.donor_name().is_none() {
        warnings.push(ExtractionWarning::MissingDonorName);
    }
    if record.collection_instant().is_none() {
        warnings.push(ExtractionWarning::MissingCollectionInstant);
    }
    if record.is_dilute() {
        warnings.push(ExtractionWarning::DiluteSpecimen);
    }

    let unreported: Vec<CanonicalSubstance> = panel_substances(record.report_kind())
        .iter()
        .copied()
        .filter(|s| !record.screened_substances().contains(s))
        .collect();
    if !unreported.is_empty() {
        warnings.push(ExtractionWarning::UnreportedSubstances {
            substances: unreported,
        });
    }

    let inconclusive: Vec<CanonicalSubstance> = record
        .confirmation_results()
        .iter()
        .filter(|f| f.outcome == ConfirmationOutcome::Inconclusive)
        .map(|f| f.substance)
        .collect();
    if !inconclusive.is_empty() {
        warnings.push(ExtractionWarning::InconclusiveConfirmations {
            substances: inconclusive,
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CanonicalSubstance as S, ConfirmationFinding, LabRecordDraft, ReportKind,
    };
    use chrono::Utc;

    fn full_instant_draft() -> LabRecordDraft {
        LabRecordDraft {
            donor_name: Some("Jane Doe".into()),
            collection_instant: Some(Utc::now()),
            screened_substances: panel_substances(ReportKind::InstantPanel)
                .iter()
                .copied()
                .collect(),
            report_kind: Some(ReportKind::InstantPanel),
            ..Default::default()
        }
    }

    #[test]
    fn clean_record_has_no_warnings() {
        let record = ExtractedLabRecord::from(full_instant_draft());
        assert!(review_warnings(&record).is_empty());
    }

    #[test]
    fn missing_fields_flagged() {
        let draft = LabRecordDraft {
            donor_name: None,
            collection_instant: None,
            ..full_instant_draft()
        };
        let warnings = review_warnings(&ExtractedLabRecord::from(draft));
        assert!(warnings.contains(&ExtractionWarning::MissingDonorName));
        assert!(warnings.contains(&ExtractionWarning::MissingCollectionInstant));
    }

    #[test]
    fn dilute_flagged() {
        let draft = LabRecordDraft {
            is_dilute: true,
            ..full_instant_draft()
        };
        let warnings = review_warnings(&ExtractedLabRecord::from(draft));
        assert_eq!(warnings, vec![ExtractionWarning::DiluteSpecimen]);
    }

    #[test]
    fn unreported_panel_substances_listed() {
        let mut draft = full_instant_draft();
        draft.screened_substances.remove(&S::Kratom);
        draft.screened_substances.remove(&S::Etg);
        let warnings = review_warnings(&ExtractedLabRecord::from(draft));
        assert_eq!(
            warnings,
            vec![ExtractionWarning::UnreportedSubstances {
                substances: vec![S::Kratom, S::Etg]
            }]
        );
    }

    #[test]
    fn inconclusive_confirmations_listed() {
        let draft = LabRecordDraft {
            report_kind: Some(ReportKind::Panel11),
            screened_substances: panel_substances(ReportKind::Panel11).iter().copied().collect(),
            confirmation_results: vec![
                ConfirmationFinding {
                    substance: S::Thc,
                    outcome: ConfirmationOutcome::Inconclusive,
                },
                ConfirmationFinding {
                    substance: S::Cocaine,
                    outcome: ConfirmationOutcome::ConfirmedNegative,
                },
            ],
            ..full_instant_draft()
        };
        let warnings = review_warnings(&ExtractedLabRecord::from(draft));
        assert_eq!(
            warnings,
            vec![ExtractionWarning::InconclusiveConfirmations {
                substances: vec![S::Thc]
            }]
        );
    }
}
