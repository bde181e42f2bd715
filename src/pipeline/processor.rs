//! Write-path glue: report text → extracted record → drug test record.
//!
//! Every call works on a copy of the record and commits only on success, so
//! a failed parse or rejected transition never leaves a half-written record.
//! Medications are read fresh from the [`MedicationSource`] on every call.

use std::collections::BTreeSet;

use thiserror::Error;
use uuid::Uuid;

use crate::config::{ConfigError, PipelineConfig};
use crate::models::{
    CanonicalSubstance, DrugTestRecord, ExtractedLabRecord, MedicationEntry, ScreeningStatus,
};
use crate::pipeline::classification::Classification;
use crate::pipeline::extraction::{review_warnings, ExtractionError, ExtractionWarning, ReportExtractor};
use crate::pipeline::workflow::{self, WorkflowError};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Client {0} not found")]
    ClientNotFound(Uuid),

    #[error("Medication source unavailable: {0}")]
    Unavailable(String),
}

/// Point-in-time read of a client's medication list. An empty list is a
/// valid answer, not a miss.
pub trait MedicationSource {
    fn read_medications(&self, client_id: Uuid) -> Result<Vec<MedicationEntry>, LookupError>;
}

impl<F> MedicationSource for F
where
    F: Fn(Uuid) -> Result<Vec<MedicationEntry>, LookupError>,
{
    fn read_medications(&self, client_id: Uuid) -> Result<Vec<MedicationEntry>, LookupError> {
        self(client_id)
    }
}

// ---------------------------------------------------------------------------
// Error and result types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Workflow rejected the write: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// What an ingest did to the record.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub extracted: ExtractedLabRecord,
    /// `None` when the medication lookup missed and classification was left
    /// as it was.
    pub classification: Option<Classification>,
    pub confirmations_recorded: usize,
    pub warnings: Vec<ExtractionWarning>,
    pub status: ScreeningStatus,
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

pub struct ScreeningProcessor<M: MedicationSource> {
    extractor: ReportExtractor,
    medications: M,
}

impl<M: MedicationSource> ScreeningProcessor<M> {
    pub fn new(config: PipelineConfig, medications: M) -> Result<Self, ConfigError> {
        Ok(Self {
            extractor: ReportExtractor::new(config)?,
            medications,
        })
    }

    pub fn with_extractor(extractor: ReportExtractor, medications: M) -> Self {
        Self {
            extractor,
            medications,
        }
    }

    /// Medications for the record's client; a miss is logged and `None`.
    fn lookup(&self, record: &DrugTestRecord) -> Option<Vec<MedicationEntry>> {
        match self.medications.read_medications(record.client_id) {
            Ok(meds) => Some(meds),
            Err(e) => {
                tracing::warn!(
                    record_id = %record.id,
                    client_id = %record.client_id,
                    error = %e,
                    "Medication lookup missed; keeping previous classification"
                );
                None
            }
        }
    }

    /// Parse a report and merge it into `record`.
    ///
    /// Before confirmation is requested the report supplies the screen
    /// (detected substances, dilution, kind, collection time) and the record
    /// is classified. While confirmation is pending only its confirmation
    /// lines are used. A complete record is never touched.
    pub fn ingest_report(
        &self,
        record: &mut DrugTestRecord,
        text: &str,
    ) -> Result<IngestOutcome, PipelineError> {
        if record.is_complete {
            return Err(WorkflowError::RecordComplete(record.id).into());
        }

        let extracted = self.extractor.extract(text).inspect_err(|e| {
            tracing::warn!(record_id = %record.id, error = %e, "Report rejected");
        })?;
        let warnings = review_warnings(&extracted);
        if !warnings.is_empty() {
            tracing::info!(record_id = %record.id, warnings = ?warnings, "Extracted report needs review");
        }

        let mut working = record.clone();
        let mut classification = None;
        let mut confirmations_recorded = 0;

        match working.screening_status {
            ScreeningStatus::Collected | ScreeningStatus::Screened => {
                let Some(meds) = self.lookup(&working) else {
                    return Ok(IngestOutcome {
                        extracted,
                        classification: None,
                        confirmations_recorded: 0,
                        warnings,
                        status: record.screening_status,
                    });
                };
                merge_screen_fields(&mut working, &extracted);
                classification = Some(workflow::record_screen(
                    &mut working,
                    extracted.detected_substances().clone(),
                    &meds,
                )?);
                if !extracted.confirmation_results().is_empty() {
                    tracing::debug!(
                        record_id = %working.id,
                        count = extracted.confirmation_results().len(),
                        "Confirmation lines ignored until confirmation is requested"
                    );
                }
            }
            ScreeningStatus::ConfirmationPending => {
                confirmations_recorded = ingest_confirmations(&mut working, &extracted)?;
            }
            ScreeningStatus::Complete => {
                return Err(WorkflowError::RecordComplete(working.id).into());
            }
        }

        *record = working;
        tracing::info!(
            record_id = %record.id,
            status = %record.screening_status,
            confirmations_recorded,
            "Report ingested"
        );
        Ok(IngestOutcome {
            extracted,
            classification,
            confirmations_recorded,
            warnings,
            status: record.screening_status,
        })
    }

    /// Author-set screen results, classified against current medications.
    /// Returns `None` on a lookup miss, leaving the record unchanged.
    pub fn record_screen(
        &self,
        record: &mut DrugTestRecord,
        detected: BTreeSet<CanonicalSubstance>,
    ) -> Result<Option<Classification>, PipelineError> {
        if record.is_complete {
            return Err(WorkflowError::RecordComplete(record.id).into());
        }
        let Some(meds) = self.lookup(record) else {
            return Ok(None);
        };
        let mut working = record.clone();
        let classification = workflow::record_screen(&mut working, detected, &meds)?;
        *record = working;
        Ok(Some(classification))
    }

    /// Recompute after a medication change. Only screened records awaiting a
    /// decision are recomputed; anything else keeps its classification,
    /// complete records above all.
    pub fn reclassify(
        &self,
        record: &mut DrugTestRecord,
    ) -> Result<Option<Classification>, PipelineError> {
        if record.screening_status != ScreeningStatus::Screened || record.is_complete {
            tracing::debug!(
                record_id = %record.id,
                status = %record.screening_status,
                "Reclassification skipped"
            );
            return Ok(None);
        }
        let Some(meds) = self.lookup(record) else {
            return Ok(None);
        };
        Ok(Some(workflow::reclassify(record, &meds)?))
    }
}

/// Copy screen-level facts from a parsed report. An existing collection time
/// is kept; the report only fills it in.
fn merge_screen_fields(record: &mut DrugTestRecord, extracted: &ExtractedLabRecord) {
    record.is_dilute = extracted.is_dilute();
    record.report_kind = Some(extracted.report_kind());
    if record.collected_at.is_none() {
        record.collected_at = extracted.collection_instant();
    }
}

/// Record every parsed confirmation that answers a pending substance.
fn ingest_confirmations(
    record: &mut DrugTestRecord,
    extracted: &ExtractedLabRecord,
) -> Result<usize, WorkflowError> {
    let mut recorded = 0;
    for finding in extracted.confirmation_results() {
        if record.is_complete {
            break;
        }
        let pending = record.confirmation_substances.contains(&finding.substance)
            && record.confirmation_outcome(finding.substance).is_none();
        if !pending {
            tracing::debug!(
                record_id = %record.id,
                substance = %finding.substance,
                "Confirmation line does not answer a pending substance"
            );
            continue;
        }
        workflow::record_confirmation(record, (*finding).into())?;
        recorded += 1;
    }
    Ok(recorded)
}
