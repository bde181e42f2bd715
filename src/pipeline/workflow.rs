//! Confirmation workflow for a drug test record.
//!
//! `collected → screened → (confirmation_pending) → complete`. Every write to
//! a complete record is rejected; nothing reopens it.

use std::collections::BTreeSet;

use thiserror::Error;
use uuid::Uuid;

use super::classification::{classify, classify_against, Classification};
use crate::models::{
    CanonicalSubstance, ConfirmationDecision, ConfirmationOutcome, ConfirmationResult,
    DrugTestRecord, MedicationEntry, ScreenResult, ScreeningStatus,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Record {0} is complete and cannot change")]
    RecordComplete(Uuid),

    #[error("Cannot {action} while record is {from}")]
    InvalidTransition {
        from: ScreeningStatus,
        action: &'static str,
    },

    #[error("{0} is not an unexpected finding on this record")]
    SubstanceNotUnderReview(CanonicalSubstance),

    #[error("{0} was not sent for confirmation")]
    NotSentForConfirmation(CanonicalSubstance),

    #[error("Confirmation result for {0} already recorded")]
    DuplicateResult(CanonicalSubstance),

    #[error("Confirmation requested without any substances")]
    EmptyConfirmationSet,
}

fn reject(record: &DrugTestRecord, err: WorkflowError) -> WorkflowError {
    tracing::warn!(record_id = %record.id, status = %record.screening_status, error = %err, "Workflow write rejected");
    err
}

fn ensure_open(record: &DrugTestRecord) -> Result<(), WorkflowError> {
    if record.is_complete || record.screening_status == ScreeningStatus::Complete {
        return Err(reject(record, WorkflowError::RecordComplete(record.id)));
    }
    Ok(())
}

fn ensure_status(
    record: &DrugTestRecord,
    allowed: &[ScreeningStatus],
    action: &'static str,
) -> Result<(), WorkflowError> {
    if !allowed.contains(&record.screening_status) {
        return Err(reject(
            record,
            WorkflowError::InvalidTransition {
                from: record.screening_status,
                action,
            },
        ));
    }
    Ok(())
}

fn apply_classification(
    record: &mut DrugTestRecord,
    classification: &Classification,
    medications: &[MedicationEntry],
) {
    record.expected_positives = classification.expected_positives.clone();
    record.unexpected_positives = classification.unexpected_positives.clone();
    record.unexpected_negatives = classification.unexpected_negatives.clone();
    record.initial_screen_result = Some(classification.verdict);
    record.medication_snapshot = medications.to_vec();
}

// ═══════════════════════════════════════════
// Screening
// ═══════════════════════════════════════════

/// Record screen results and classify them. Allowed until a confirmation is
/// requested; a re-screen replaces the previous classification.
pub fn record_screen(
    record: &mut DrugTestRecord,
    detected: BTreeSet<CanonicalSubstance>,
    medications: &[MedicationEntry],
) -> Result<Classification, WorkflowError> {
    ensure_open(record)?;
    ensure_status(
        record,
        &[ScreeningStatus::Collected, ScreeningStatus::Screened],
        "record screen results",
    )?;

    let classification = classify(&detected, medications);
    record.detected_substances = detected;
    apply_classification(record, &classification, medications);
    record.screening_status = ScreeningStatus::Screened;

    tracing::info!(
        record_id = %record.id,
        verdict = %classification.verdict,
        detected = record.detected_substances.len(),
        "Screen recorded"
    );
    Ok(classification)
}

/// Recompute the classification after the client's medications changed.
/// Only a screened record awaiting a decision is recomputed.
pub fn reclassify(
    record: &mut DrugTestRecord,
    medications: &[MedicationEntry],
) -> Result<Classification, WorkflowError> {
    ensure_open(record)?;
    ensure_status(record, &[ScreeningStatus::Screened], "reclassify")?;

    let classification = classify(&record.detected_substances, medications);
    let changed = record.initial_screen_result != Some(classification.verdict);
    apply_classification(record, &classification, medications);

    tracing::info!(
        record_id = %record.id,
        verdict = %classification.verdict,
        changed,
        "Record reclassified"
    );
    Ok(classification)
}

// ═══════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════

/// Apply the reviewer's confirmation decision to a screened record.
///
/// `substances` is only read for [`ConfirmationDecision::RequestConfirmation`]
/// and must be a non-empty subset of the record's unexpected findings.
pub fn decide(
    record: &mut DrugTestRecord,
    decision: ConfirmationDecision,
    substances: BTreeSet<CanonicalSubstance>,
) -> Result<ScreeningStatus, WorkflowError> {
    ensure_open(record)?;
    ensure_status(record, &[ScreeningStatus::Screened], "decide on confirmation")?;

    match decision {
        ConfirmationDecision::PendingDecision => {
            record.confirmation_decision = decision;
        }
        ConfirmationDecision::Accept => {
            record.confirmation_decision = decision;
            record.final_status = record.initial_screen_result;
            complete(record);
        }
        ConfirmationDecision::RequestConfirmation => {
            if substances.is_empty() {
                return Err(reject(record, WorkflowError::EmptyConfirmationSet));
            }
            let findings = record.unexpected_findings();
            if let Some(foreign) = substances.iter().find(|s| !findings.contains(*s)) {
                return Err(reject(record, WorkflowError::SubstanceNotUnderReview(*foreign)));
            }
            record.confirmation_decision = decision;
            record.confirmation_substances = substances;
            record.confirmation_results.clear();
            record.screening_status = ScreeningStatus::ConfirmationPending;
        }
    }

    tracing::info!(
        record_id = %record.id,
        decision = %decision,
        status = %record.screening_status,
        "Confirmation decision applied"
    );
    Ok(record.screening_status)
}

// ═══════════════════════════════════════════
// Confirmation
// ═══════════════════════════════════════════

/// True once every substance sent for confirmation has an outcome.
pub fn is_confirmation_complete(record: &DrugTestRecord) -> bool {
    record.confirmation_results.len() == record.confirmation_substances.len()
        && record.confirmation_results.iter().all(|r| r.outcome.is_some())
        && record
            .confirmation_substances
            .iter()
            .all(|s| record.confirmation_results.iter().any(|r| r.substance == *s))
}

/// Record one confirmation result. A result without an outcome marks the
/// substance as acknowledged by the lab; a later result with an outcome
/// replaces it. The record completes once every substance has an outcome.
pub fn record_confirmation(
    record: &mut DrugTestRecord,
    result: ConfirmationResult,
) -> Result<ScreeningStatus, WorkflowError> {
    ensure_open(record)?;
    ensure_status(
        record,
        &[ScreeningStatus::ConfirmationPending],
        "record a confirmation result",
    )?;
    if !record.confirmation_substances.contains(&result.substance) {
        return Err(reject(
            record,
            WorkflowError::NotSentForConfirmation(result.substance),
        ));
    }

    let existing = record
        .confirmation_results
        .iter()
        .position(|r| r.substance == result.substance);
    match existing {
        Some(i) if record.confirmation_results[i].outcome.is_some() => {
            return Err(reject(record, WorkflowError::DuplicateResult(result.substance)));
        }
        Some(i) => record.confirmation_results[i] = result,
        None => record.confirmation_results.push(result),
    }

    tracing::info!(
        record_id = %record.id,
        substance = %result.substance,
        outcome = ?result.outcome,
        "Confirmation result recorded"
    );

    if is_confirmation_complete(record) {
        let final_status = final_status_after_confirmation(record);
        record.final_status = Some(final_status);
        complete(record);
        let inconclusive = record.inconclusive_substances();
        if !inconclusive.is_empty() {
            tracing::warn!(
                record_id = %record.id,
                substances = ?inconclusive,
                "Confirmation finished with inconclusive substances"
            );
        }
    }
    Ok(record.screening_status)
}

/// Final status from confirmation outcomes.
///
/// A confirmed-negative clears an unexpected positive and a confirmed-positive
/// clears an unexpected negative; the opposite outcomes uphold them.
/// Inconclusive results change nothing. Findings that were not sent for
/// confirmation stand as screened.
pub fn final_status_after_confirmation(record: &DrugTestRecord) -> ScreenResult {
    let mut effective = record.detected_substances.clone();
    for result in &record.confirmation_results {
        match result.outcome {
            Some(ConfirmationOutcome::ConfirmedNegative)
                if record.unexpected_positives.contains(&result.substance) =>
            {
                effective.remove(&result.substance);
            }
            Some(ConfirmationOutcome::ConfirmedPositive)
                if record.unexpected_negatives.contains(&result.substance) =>
            {
                effective.insert(result.substance);
            }
            _ => {}
        }
    }
    classify_against(&effective, &record.expected_substances()).verdict
}

// ═══════════════════════════════════════════
// Invalid sample
// ═══════════════════════════════════════════

/// Close a record whose sample is physically unusable. Terminal: the final
/// status is inconclusive and the rest of the workflow is skipped.
pub fn mark_invalid_sample(
    record: &mut DrugTestRecord,
    reason: impl Into<String>,
) -> Result<(), WorkflowError> {
    ensure_open(record)?;
    let reason = reason.into();
    tracing::warn!(record_id = %record.id, reason = %reason, "Sample marked invalid");
    record.invalid_sample_reason = Some(reason);
    record.final_status = Some(ScreenResult::Inconclusive);
    complete(record);
    Ok(())
}

fn complete(record: &mut DrugTestRecord) {
    record.screening_status = ScreeningStatus::Complete;
    record.is_complete = true;
    tracing::info!(
        record_id = %record.id,
        final_status = ?record.final_status,
        "Record complete"
    );
}
