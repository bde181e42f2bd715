use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::enums::MedicationStatus;
use super::substance::CanonicalSubstance;

/// A client's medication as read from the host's records. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationEntry {
    pub name: String,
    pub status: MedicationStatus,
    /// Substances this medication is expected to trigger on a screen.
    /// May be empty or hold only the `none` sentinel.
    #[serde(default)]
    pub detected_as: BTreeSet<CanonicalSubstance>,
}

impl MedicationEntry {
    pub fn new(
        name: impl Into<String>,
        status: MedicationStatus,
        detected_as: impl IntoIterator<Item = CanonicalSubstance>,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            detected_as: detected_as.into_iter().collect(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MedicationStatus::Active
    }

    /// Substances this entry makes expected: nothing unless active, and never
    /// the sentinel.
    pub fn expected_substances(&self) -> impl Iterator<Item = CanonicalSubstance> + '_ {
        self.detected_as
            .iter()
            .copied()
            .filter(move |s| self.is_active() && !s.is_sentinel())
    }
}
