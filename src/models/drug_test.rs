use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{
    ConfirmationDecision, ConfirmationOutcome, ReportKind, ScreenResult, ScreeningStatus,
};
use super::lab::ConfirmationFinding;
use super::medication::MedicationEntry;
use super::substance::CanonicalSubstance;

/// Confirmation result as tracked on the record. `outcome` stays `None` while
/// the lab has acknowledged the substance but not reported on it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationResult {
    pub substance: CanonicalSubstance,
    pub outcome: Option<ConfirmationOutcome>,
}

impl From<ConfirmationFinding> for ConfirmationResult {
    fn from(finding: ConfirmationFinding) -> Self {
        Self {
            substance: finding.substance,
            outcome: Some(finding.outcome),
        }
    }
}

/// The persisted test entity this pipeline mutates.
///
/// Classification fields (`expected_positives`, `unexpected_positives`,
/// `unexpected_negatives`, `initial_screen_result`) are derived; only
/// `pipeline::workflow` and `pipeline::processor` write them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugTestRecord {
    pub id: Uuid,
    pub client_id: Uuid,
    pub collected_at: Option<DateTime<Utc>>,
    pub report_kind: Option<ReportKind>,
    pub is_dilute: bool,
    pub detected_substances: BTreeSet<CanonicalSubstance>,
    pub expected_positives: BTreeSet<CanonicalSubstance>,
    pub unexpected_positives: BTreeSet<CanonicalSubstance>,
    pub unexpected_negatives: BTreeSet<CanonicalSubstance>,
    pub initial_screen_result: Option<ScreenResult>,
    pub screening_status: ScreeningStatus,
    pub confirmation_decision: ConfirmationDecision,
    pub confirmation_substances: BTreeSet<CanonicalSubstance>,
    pub confirmation_results: Vec<ConfirmationResult>,
    pub final_status: Option<ScreenResult>,
    pub is_complete: bool,
    /// Medications as they stood when the record was last classified.
    /// Authoritative once the record is complete.
    pub medication_snapshot: Vec<MedicationEntry>,
    pub invalid_sample_reason: Option<String>,
}

impl DrugTestRecord {
    /// A freshly collected sample: nothing screened, nothing decided.
    pub fn new(client_id: Uuid, collected_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            collected_at,
            report_kind: None,
            is_dilute: false,
            detected_substances: BTreeSet::new(),
            expected_positives: BTreeSet::new(),
            unexpected_positives: BTreeSet::new(),
            unexpected_negatives: BTreeSet::new(),
            initial_screen_result: None,
            screening_status: ScreeningStatus::Collected,
            confirmation_decision: ConfirmationDecision::PendingDecision,
            confirmation_substances: BTreeSet::new(),
            confirmation_results: Vec::new(),
            final_status: None,
            is_complete: false,
            medication_snapshot: Vec::new(),
            invalid_sample_reason: None,
        }
    }

    /// Substances eligible to be sent for confirmation.
    pub fn unexpected_findings(&self) -> BTreeSet<CanonicalSubstance> {
        self.unexpected_positives
            .union(&self.unexpected_negatives)
            .copied()
            .collect()
    }

    /// Everything the active medications made expected at classification time.
    pub fn expected_substances(&self) -> BTreeSet<CanonicalSubstance> {
        self.expected_positives
            .union(&self.unexpected_negatives)
            .copied()
            .collect()
    }

    pub fn confirmation_outcome(
        &self,
        substance: CanonicalSubstance,
    ) -> Option<ConfirmationOutcome> {
        self.confirmation_results
            .iter()
            .find(|r| r.substance == substance)
            .and_then(|r| r.outcome)
    }

    /// Substances whose confirmation came back inconclusive. Surfaced for
    /// review; they never change the final status on their own.
    pub fn inconclusive_substances(&self) -> BTreeSet<CanonicalSubstance> {
        self.confirmation_results
            .iter()
            .filter(|r| r.outcome == Some(ConfirmationOutcome::Inconclusive))
            .map(|r| r.substance)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_collected() {
        let record = DrugTestRecord::new(Uuid::new_v4(), None);
        assert_eq!(record.screening_status, ScreeningStatus::Collected);
        assert_eq!(
            record.confirmation_decision,
            ConfirmationDecision::PendingDecision
        );
        assert!(record.initial_screen_result.is_none());
        assert!(record.final_status.is_none());
        assert!(!record.is_complete);
    }

    #[test]
    fn unexpected_findings_union() {
        let mut record = DrugTestRecord::new(Uuid::new_v4(), None);
        record.unexpected_positives.insert(CanonicalSubstance::Thc);
        record.unexpected_negatives.insert(CanonicalSubstance::Oxycodone);
        record.expected_positives.insert(CanonicalSubstance::Buprenorphine);

        let findings = record.unexpected_findings();
        assert_eq!(findings.len(), 2);
        assert!(findings.contains(&CanonicalSubstance::Thc));
        assert!(findings.contains(&CanonicalSubstance::Oxycodone));

        let expected = record.expected_substances();
        assert!(expected.contains(&CanonicalSubstance::Buprenorphine));
        assert!(expected.contains(&CanonicalSubstance::Oxycodone));
        assert!(!expected.contains(&CanonicalSubstance::Thc));
    }

    #[test]
    fn inconclusive_substances_listed() {
        let mut record = DrugTestRecord::new(Uuid::new_v4(), None);
        record.confirmation_results = vec![
            ConfirmationResult {
                substance: CanonicalSubstance::Thc,
                outcome: Some(ConfirmationOutcome::Inconclusive),
            },
            ConfirmationResult {
                substance: CanonicalSubstance::Cocaine,
                outcome: Some(ConfirmationOutcome::ConfirmedPositive),
            },
            ConfirmationResult {
                substance: CanonicalSubstance::Fentanyl,
                outcome: None,
            },
        ];
        let inconclusive = record.inconclusive_substances();
        assert_eq!(inconclusive.len(), 1);
        assert!(inconclusive.contains(&CanonicalSubstance::Thc));
        assert_eq!(
            record.confirmation_outcome(CanonicalSubstance::Cocaine),
            Some(ConfirmationOutcome::ConfirmedPositive)
        );
        assert_eq!(record.confirmation_outcome(CanonicalSubstance::Fentanyl), None);
    }

    #[test]
    fn record_serializes_round_trip() {
        let record = DrugTestRecord::new(Uuid::new_v4(), None);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"screening_status\":\"collected\""));
        let back: DrugTestRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
