//! Screen classification against a client's medication profile.
//!
//! Pure functions only: the same detected set and medication list always
//! give the same classification.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{CanonicalSubstance, MedicationEntry, ScreenResult};

/// Derived classification fields of a drug test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub expected_positives: BTreeSet<CanonicalSubstance>,
    pub unexpected_positives: BTreeSet<CanonicalSubstance>,
    pub unexpected_negatives: BTreeSet<CanonicalSubstance>,
    pub verdict: ScreenResult,
}

/// Substances the active medications are expected to trigger. Discontinued
/// entries and the `none` sentinel contribute nothing.
pub fn expected_substances(medications: &[MedicationEntry]) -> BTreeSet<CanonicalSubstance> {
    medications
        .iter()
        .flat_map(|m| m.expected_substances())
        .collect()
}

/// Classify a screen against the client's medications.
pub fn classify(
    detected: &BTreeSet<CanonicalSubstance>,
    medications: &[MedicationEntry],
) -> Classification {
    classify_against(detected, &expected_substances(medications))
}

/// Classify a screen against an already-built expected set.
pub fn classify_against(
    detected: &BTreeSet<CanonicalSubstance>,
    expected: &BTreeSet<CanonicalSubstance>,
) -> Classification {
    let detected: BTreeSet<CanonicalSubstance> =
        detected.iter().copied().filter(|s| !s.is_sentinel()).collect();
    let expected: BTreeSet<CanonicalSubstance> =
        expected.iter().copied().filter(|s| !s.is_sentinel()).collect();

    let expected_positives: BTreeSet<_> = detected.intersection(&expected).copied().collect();
    let unexpected_positives: BTreeSet<_> = detected.difference(&expected).copied().collect();
    let unexpected_negatives: BTreeSet<_> = expected.difference(&detected).copied().collect();

    let verdict = verdict(
        detected.is_empty(),
        unexpected_positives.is_empty(),
        unexpected_negatives.is_empty(),
    );

    Classification {
        expected_positives,
        unexpected_positives,
        unexpected_negatives,
        verdict,
    }
}

/// Decision table over (detected empty, unexpected positives empty,
/// unexpected negatives empty). Exhaustive, so there is no fallback arm;
/// `Inconclusive` is reserved for invalid samples.
///
/// An empty detected set has no unexpected positives, so its quadrant only
/// depends on whether anything was expected.
fn verdict(detected_empty: bool, no_unexpected_pos: bool, no_unexpected_neg: bool) -> ScreenResult {
    match (detected_empty, no_unexpected_pos, no_unexpected_neg) {
        (true, _, true) => ScreenResult::Negative,
        (true, _, false) => ScreenResult::UnexpectedNegative,
        (false, false, false) => ScreenResult::MixedUnexpected,
        (false, false, true) => ScreenResult::UnexpectedPositive,
        (false, true, false) => ScreenResult::UnexpectedNegative,
        (false, true, true) => ScreenResult::ExpectedPositive,
    }
}
