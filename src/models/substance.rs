use super::enums::str_enum;

str_enum!(
    /// Fixed internal vocabulary of detectable substances.
    ///
    /// Report wording never travels past the normalizer; everything downstream
    /// speaks in these codes. `None` is a sentinel meaning "triggers no
    /// substance" and never counts as a detection or an expectation.
    CanonicalSubstance {
        Amphetamines => "amphetamines",
        Methamphetamine => "methamphetamine",
        Mdma => "mdma",
        Barbiturates => "barbiturates",
        Benzodiazepines => "benzodiazepines",
        Buprenorphine => "buprenorphine",
        Cocaine => "cocaine",
        Thc => "thc",
        Methadone => "methadone",
        Opiates => "opiates",
        Oxycodone => "oxycodone",
        Pcp => "pcp",
        Propoxyphene => "propoxyphene",
        Tramadol => "tramadol",
        Fentanyl => "fentanyl",
        Tricyclics => "tricyclics",
        Kratom => "kratom",
        Etg => "etg",
        None => "none",
    }
);

impl CanonicalSubstance {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Human-readable label for review screens and log lines.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Amphetamines => "Amphetamines",
            Self::Methamphetamine => "Methamphetamine",
            Self::Mdma => "MDMA",
            Self::Barbiturates => "Barbiturates",
            Self::Benzodiazepines => "Benzodiazepines",
            Self::Buprenorphine => "Buprenorphine",
            Self::Cocaine => "Cocaine",
            Self::Thc => "THC",
            Self::Methadone => "Methadone",
            Self::Opiates => "Opiates",
            Self::Oxycodone => "Oxycodone",
            Self::Pcp => "PCP",
            Self::Propoxyphene => "Propoxyphene",
            Self::Tramadol => "Tramadol",
            Self::Fentanyl => "Fentanyl",
            Self::Tricyclics => "Tricyclic Antidepressants",
            Self::Kratom => "Kratom",
            Self::Etg => "EtG (Alcohol)",
            Self::None => "None",
        }
    }
}
