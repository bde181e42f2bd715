/// Macro to generate enum with as_str + std::str::FromStr pattern.
///
/// The string form doubles as the serde representation, so persisted records
/// and log fields always carry the same stable code.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const VARIANTS: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err($crate::models::ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

pub(crate) use str_enum;

str_enum!(
    /// Which report dialect a record was parsed from.
    ReportKind {
        InstantPanel => "instant_panel",
        Panel11 => "11_panel",
        Panel17 => "17_panel",
        EtgPanel => "etg_panel",
    }
);

impl ReportKind {
    /// Lab-panel kinds come from a reference laboratory and may carry
    /// confirmation results; instant panels never do.
    pub fn is_lab_panel(&self) -> bool {
        !matches!(self, Self::InstantPanel)
    }
}

str_enum!(
    /// Derived from which identifying fields were recovered. Never authored.
    Confidence {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
);

impl Confidence {
    /// High iff both identifying fields are present, medium iff exactly one.
    pub fn from_presence(has_donor_name: bool, has_collection_instant: bool) -> Self {
        match (has_donor_name, has_collection_instant) {
            (true, true) => Self::High,
            (true, false) | (false, true) => Self::Medium,
            (false, false) => Self::Low,
        }
    }
}

str_enum!(MedicationStatus {
    Active => "active",
    Discontinued => "discontinued",
});

str_enum!(
    /// Screening verdict; also the vocabulary of a record's final status.
    ScreenResult {
        Negative => "negative",
        ExpectedPositive => "expected_positive",
        UnexpectedPositive => "unexpected_positive",
        UnexpectedNegative => "unexpected_negative",
        MixedUnexpected => "mixed_unexpected",
        Inconclusive => "inconclusive",
    }
);

impl ScreenResult {
    /// Pass-equivalent results: nothing unexpected was found.
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Negative | Self::ExpectedPositive)
    }
}

str_enum!(ScreeningStatus {
    Collected => "collected",
    Screened => "screened",
    ConfirmationPending => "confirmation_pending",
    Complete => "complete",
});

str_enum!(ConfirmationDecision {
    PendingDecision => "pending_decision",
    Accept => "accept",
    RequestConfirmation => "request_confirmation",
});

str_enum!(ConfirmationOutcome {
    ConfirmedPositive => "confirmed_positive",
    ConfirmedNegative => "confirmed_negative",
    Inconclusive => "inconclusive",
});

str_enum!(
    /// Fields the report parser can recover; absence is a field miss.
    ExtractedField {
        DonorName => "donor_name",
        CollectionInstant => "collection_instant",
        DetectedSubstances => "detected_substances",
        Dilution => "dilution",
        ConfirmationResults => "confirmation_results",
    }
);
