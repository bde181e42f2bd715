//! Substance-name normalization.
//!
//! Maps vendor spellings, cup abbreviations and metabolite names onto
//! [`CanonicalSubstance`] codes. Instant-panel cups and reference-lab reports
//! use different vocabularies, so each has its own table; the lab table is a
//! strict superset and alone covers the 17-panel-only substances.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::LazyLock;

use crate::models::{CanonicalSubstance, CanonicalSubstance as S, ReportKind};

/// Aliases printed on instant-panel cups and dip cards. Lowercase, singular.
const INSTANT_ALIASES: &[(&str, CanonicalSubstance)] = &[
    ("amphetamine", S::Amphetamines),
    ("amp", S::Amphetamines),
    ("methamphetamine", S::Methamphetamine),
    ("met", S::Methamphetamine),
    ("meth", S::Methamphetamine),
    ("mamp", S::Methamphetamine),
    ("mdma", S::Mdma),
    ("ecstasy", S::Mdma),
    ("methylenedioxymethamphetamine", S::Mdma),
    ("xtc", S::Mdma),
    ("benzodiazepine", S::Benzodiazepines),
    ("bzo", S::Benzodiazepines),
    ("benzo", S::Benzodiazepines),
    ("buprenorphine", S::Buprenorphine),
    ("bup", S::Buprenorphine),
    ("cocaine", S::Cocaine),
    ("coc", S::Cocaine),
    ("thc", S::Thc),
    ("marijuana", S::Thc),
    ("cannabinoid", S::Thc),
    ("cannabis", S::Thc),
    ("methadone", S::Methadone),
    ("mtd", S::Methadone),
    ("opiate", S::Opiates),
    ("opi", S::Opiates),
    ("mop", S::Opiates),
    ("morphine", S::Opiates),
    ("oxycodone", S::Oxycodone),
    ("oxy", S::Oxycodone),
    ("tramadol", S::Tramadol),
    ("tml", S::Tramadol),
    ("fentanyl", S::Fentanyl),
    ("fyl", S::Fentanyl),
    ("fen", S::Fentanyl),
    ("tricyclic antidepressant", S::Tricyclics),
    ("tricyclic", S::Tricyclics),
    ("tca", S::Tricyclics),
    ("kratom", S::Kratom),
    ("krat", S::Kratom),
    ("etg", S::Etg),
    ("ethyl glucuronide", S::Etg),
];

/// Reference-lab names that never appear on cups: parent drugs confirmed
/// individually, metabolites, and the 17-panel-only classes.
const LAB_ONLY_ALIASES: &[(&str, CanonicalSubstance)] = &[
    ("phencyclidine", S::Pcp),
    ("pcp", S::Pcp),
    ("barbiturate", S::Barbiturates),
    ("bar", S::Barbiturates),
    ("butalbital", S::Barbiturates),
    ("phenobarbital", S::Barbiturates),
    ("propoxyphene", S::Propoxyphene),
    ("ppx", S::Propoxyphene),
    ("norpropoxyphene", S::Propoxyphene),
    ("benzoylecgonine", S::Cocaine),
    ("cocaine metabolite", S::Cocaine),
    ("marijuana metabolite", S::Thc),
    ("thc metabolite", S::Thc),
    ("thc-cooh", S::Thc),
    ("carboxy-thc", S::Thc),
    ("mitragynine", S::Kratom),
    ("7-hydroxymitragynine", S::Kratom),
    ("norbuprenorphine", S::Buprenorphine),
    ("norfentanyl", S::Fentanyl),
    ("eddp", S::Methadone),
    ("methadone metabolite", S::Methadone),
    ("o-desmethyltramadol", S::Tramadol),
    ("hydrocodone", S::Opiates),
    ("codeine", S::Opiates),
    ("6-monoacetylmorphine", S::Opiates),
    ("6-mam", S::Opiates),
    ("alprazolam", S::Benzodiazepines),
    ("clonazepam", S::Benzodiazepines),
    ("lorazepam", S::Benzodiazepines),
    ("diazepam", S::Benzodiazepines),
    ("nordiazepam", S::Benzodiazepines),
    ("oxazepam", S::Benzodiazepines),
    ("temazepam", S::Benzodiazepines),
    ("amitriptyline", S::Tricyclics),
    ("nortriptyline", S::Tricyclics),
    ("mda", S::Mdma),
];

const PANEL_11: &[CanonicalSubstance] = &[
    S::Amphetamines,
    S::Methamphetamine,
    S::Mdma,
    S::Benzodiazepines,
    S::Buprenorphine,
    S::Cocaine,
    S::Thc,
    S::Methadone,
    S::Opiates,
    S::Oxycodone,
    S::Tramadol,
];

const PANEL_17: &[CanonicalSubstance] = &[
    S::Amphetamines,
    S::Methamphetamine,
    S::Mdma,
    S::Benzodiazepines,
    S::Buprenorphine,
    S::Cocaine,
    S::Thc,
    S::Methadone,
    S::Opiates,
    S::Oxycodone,
    S::Tramadol,
    S::Barbiturates,
    S::Pcp,
    S::Propoxyphene,
    S::Fentanyl,
    S::Tricyclics,
    S::Kratom,
];

const ETG_PANEL: &[CanonicalSubstance] = &[
    S::Amphetamines,
    S::Methamphetamine,
    S::Mdma,
    S::Benzodiazepines,
    S::Buprenorphine,
    S::Cocaine,
    S::Thc,
    S::Methadone,
    S::Opiates,
    S::Oxycodone,
    S::Tramadol,
    S::Etg,
];

const INSTANT_PANEL: &[CanonicalSubstance] = &[
    S::Amphetamines,
    S::Methamphetamine,
    S::Mdma,
    S::Benzodiazepines,
    S::Buprenorphine,
    S::Cocaine,
    S::Thc,
    S::Methadone,
    S::Opiates,
    S::Oxycodone,
    S::Tramadol,
    S::Fentanyl,
    S::Tricyclics,
    S::Kratom,
    S::Etg,
];

/// Substances a report of the given kind reports on.
pub fn panel_substances(kind: ReportKind) -> &'static [CanonicalSubstance] {
    match kind {
        ReportKind::InstantPanel => INSTANT_PANEL,
        ReportKind::Panel11 => PANEL_11,
        ReportKind::Panel17 => PANEL_17,
        ReportKind::EtgPanel => ETG_PANEL,
    }
}

static INSTANT_MAP: LazyLock<HashMap<&'static str, CanonicalSubstance>> =
    LazyLock::new(|| INSTANT_ALIASES.iter().copied().collect());

static LAB_MAP: LazyLock<HashMap<&'static str, CanonicalSubstance>> = LazyLock::new(|| {
    INSTANT_ALIASES
        .iter()
        .chain(LAB_ONLY_ALIASES)
        .copied()
        .collect()
});

/// Alias table a lookup runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubstanceTable {
    InstantPanel,
    LabPanel,
}

impl SubstanceTable {
    pub fn for_kind(kind: ReportKind) -> Self {
        if kind.is_lab_panel() {
            Self::LabPanel
        } else {
            Self::InstantPanel
        }
    }

    /// Raw `(alias, code)` entries, in table order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, CanonicalSubstance)> {
        let lab_only: &'static [(&'static str, CanonicalSubstance)] = match self {
            Self::InstantPanel => &[],
            Self::LabPanel => LAB_ONLY_ALIASES,
        };
        INSTANT_ALIASES.iter().chain(lab_only).copied()
    }

    fn map(&self) -> &'static HashMap<&'static str, CanonicalSubstance> {
        match self {
            Self::InstantPanel => &INSTANT_MAP,
            Self::LabPanel => &LAB_MAP,
        }
    }

    /// Every code at least one alias in this table maps to.
    pub fn covered(&self) -> BTreeSet<CanonicalSubstance> {
        self.entries().map(|(_, code)| code).collect()
    }

    pub fn covers(&self, substance: CanonicalSubstance) -> bool {
        self.entries().any(|(_, code)| code == substance)
    }

    /// Aliases that map to `substance`, in table order.
    pub fn aliases_for(
        &self,
        substance: CanonicalSubstance,
    ) -> impl Iterator<Item = &'static str> {
        self.entries()
            .filter(move |(_, code)| *code == substance)
            .map(|(alias, _)| alias)
    }

    /// Normalize a raw substance name to its canonical code.
    ///
    /// Case-insensitive. Tries the whole name, then the text outside a
    /// parenthetical, then the parenthetical itself ("Ecstasy (MDMA)"), each
    /// with singular/plural variants. A canonical code name covered by this
    /// table normalizes to itself. Unknown names yield `None`; whether that
    /// matters is the caller's call.
    pub fn normalize(&self, raw: &str) -> Option<CanonicalSubstance> {
        let key = clean_key(raw);
        if key.is_empty() {
            return None;
        }

        candidate_keys(&key)
            .iter()
            .find_map(|candidate| self.lookup_with_plurals(candidate))
    }

    fn lookup_with_plurals(&self, key: &str) -> Option<CanonicalSubstance> {
        let map = self.map();
        if let Some(code) = map.get(key) {
            return Some(*code);
        }
        if let Some(singular) = key.strip_suffix('s') {
            if let Some(code) = map.get(singular) {
                return Some(*code);
            }
        }
        CanonicalSubstance::from_str(key)
            .ok()
            .filter(|code| self.covers(*code))
    }
}

/// Lowercase, collapse whitespace, drop trailing footnote markers and colons.
fn clean_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(['*', ':', ' '])
        .trim_start_matches(['*', ' '])
        .to_string()
}

/// Whole key first, then outside-the-parens, then inside-the-parens.
fn candidate_keys(key: &str) -> Vec<String> {
    let mut candidates = vec![key.to_string()];
    if let (Some(open), Some(close)) = (key.find('('), key.rfind(')')) {
        if open < close {
            let outside = format!("{} {}", &key[..open], &key[close + 1..]);
            let outside = outside.split_whitespace().collect::<Vec<_>>().join(" ");
            let inside = key[open + 1..close].trim().to_string();
            for candidate in [outside, inside] {
                if !candidate.is_empty() && !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }
    }
    candidates
}

/// Case-insensitive, word-bounded regex source for an alias, allowing a
/// plural `s` and any run of whitespace between words.
pub fn alias_pattern(alias: &str) -> String {
    let words: Vec<String> = alias.split_whitespace().map(regex::escape).collect();
    format!(r"(?i)\b{}s?\b", words.join(r"\s+"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn instant_names_normalize() {
        let t = SubstanceTable::InstantPanel;
        assert_eq!(t.normalize("Amphetamine"), Some(S::Amphetamines));
        assert_eq!(t.normalize("AMPHETAMINES"), Some(S::Amphetamines));
        assert_eq!(t.normalize("Marijuana (THC)"), Some(S::Thc));
        assert_eq!(t.normalize("Oxycodone (OXY)*"), Some(S::Oxycodone));
        assert_eq!(t.normalize("  Benzodiazepines:  "), Some(S::Benzodiazepines));
    }

    #[test]
    fn parenthetical_alias_resolves() {
        let t = SubstanceTable::InstantPanel;
        assert_eq!(
            t.normalize("Methylenedioxymethamphetamine (MDMA)"),
            Some(S::Mdma)
        );
        // Outer name unknown, parenthetical known.
        assert_eq!(t.normalize("Molly (MDMA)"), Some(S::Mdma));
    }

    #[test]
    fn lab_spellings_normalize() {
        let t = SubstanceTable::LabPanel;
        assert_eq!(t.normalize("Mitragynine"), Some(S::Kratom));
        assert_eq!(t.normalize("Benzoylecgonine"), Some(S::Cocaine));
        assert_eq!(t.normalize("Cocaine Metabolite"), Some(S::Cocaine));
        assert_eq!(t.normalize("THC-COOH"), Some(S::Thc));
        assert_eq!(t.normalize("Phencyclidine"), Some(S::Pcp));
        assert_eq!(t.normalize("Barbiturates"), Some(S::Barbiturates));
    }

    #[test]
    fn seventeen_panel_substances_are_lab_only() {
        let instant = SubstanceTable::InstantPanel;
        assert_eq!(instant.normalize("Phencyclidine"), None);
        assert_eq!(instant.normalize("Barbiturates"), None);
        assert_eq!(instant.normalize("Propoxyphene"), None);
        assert_eq!(instant.normalize("pcp"), None);
    }

    #[test]
    fn unknown_names_yield_none() {
        let t = SubstanceTable::LabPanel;
        assert_eq!(t.normalize("Creatinine"), None);
        assert_eq!(t.normalize(""), None);
        assert_eq!(t.normalize("***"), None);
    }

    #[test]
    fn canonical_codes_normalize_to_themselves() {
        for table in [SubstanceTable::InstantPanel, SubstanceTable::LabPanel] {
            for code in table.covered() {
                assert_eq!(table.normalize(code.as_str()), Some(code), "{table:?} {code}");
            }
        }
    }

    #[test]
    fn no_alias_maps_to_two_codes() {
        for table in [SubstanceTable::InstantPanel, SubstanceTable::LabPanel] {
            let mut seen = HashSet::new();
            for (alias, _) in table.entries() {
                assert!(seen.insert(alias), "{table:?}: duplicate alias '{alias}'");
            }
        }
    }

    #[test]
    fn aliases_are_lowercase_and_trimmed() {
        for (alias, _) in SubstanceTable::LabPanel.entries() {
            assert_eq!(alias, clean_key(alias), "alias '{alias}' is not in key form");
        }
    }

    #[test]
    fn tables_cover_their_panels() {
        // Surjectivity: every substance a panel reports has an alias.
        for kind in ReportKind::VARIANTS {
            let table = SubstanceTable::for_kind(*kind);
            for substance in panel_substances(*kind) {
                assert!(table.covers(*substance), "{kind}: {substance} has no alias");
                assert!(table.aliases_for(*substance).next().is_some());
            }
        }
    }

    #[test]
    fn tables_cover_nothing_beyond_their_panels() {
        let instant: BTreeSet<_> = panel_substances(ReportKind::InstantPanel)
            .iter()
            .copied()
            .collect();
        assert_eq!(SubstanceTable::InstantPanel.covered(), instant);

        let lab: BTreeSet<_> = [ReportKind::Panel11, ReportKind::Panel17, ReportKind::EtgPanel]
            .into_iter()
            .flat_map(|k| panel_substances(k).iter().copied())
            .collect();
        assert_eq!(SubstanceTable::LabPanel.covered(), lab);
    }

    #[test]
    fn lab_table_is_superset_of_instant() {
        let instant = SubstanceTable::InstantPanel.covered();
        let lab = SubstanceTable::LabPanel.covered();
        assert!(lab.is_superset(&instant));
        for only in [S::Pcp, S::Barbiturates, S::Propoxyphene] {
            assert!(lab.contains(&only) && !instant.contains(&only));
        }
    }

    #[test]
    fn sentinel_is_never_covered() {
        assert!(!SubstanceTable::LabPanel.covers(S::None));
        assert_eq!(SubstanceTable::LabPanel.normalize("none"), None);
    }

    #[test]
    fn panel_sizes_match_names() {
        assert_eq!(panel_substances(ReportKind::Panel11).len(), 11);
        assert_eq!(panel_substances(ReportKind::Panel17).len(), 17);
    }

    #[test]
    fn alias_pattern_is_word_bounded() {
        let re = regex::Regex::new(&alias_pattern("amphetamine")).unwrap();
        assert!(re.is_match("Amphetamines  Negative"));
        assert!(!re.is_match("Methamphetamine Negative"));

        let re = regex::Regex::new(&alias_pattern("cocaine metabolite")).unwrap();
        assert!(re.is_match("COCAINE   METABOLITE  POSITIVE"));

        let re = regex::Regex::new(&alias_pattern("thc-cooh")).unwrap();
        assert!(re.is_match("THC-COOH LC-MS/MS 15 ng/mL 42"));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn lab_alias() -> impl Strategy<Value = (&'static str, CanonicalSubstance)> {
            proptest::sample::select(SubstanceTable::LabPanel.entries().collect::<Vec<_>>())
        }

        proptest! {
            /// Any listed alias normalizes to its code, and the code re-normalizes to itself.
            #[test]
            fn alias_normalization_is_idempotent((alias, code) in lab_alias()) {
                let table = SubstanceTable::LabPanel;
                let first = table.normalize(alias);
                prop_assert_eq!(first, Some(code));
                let again = table.normalize(code.as_str());
                prop_assert_eq!(again, Some(code));
            }

            /// Case and surrounding noise never change the result.
            #[test]
            fn normalization_ignores_case_and_padding(
                (alias, code) in lab_alias(),
                upper in any::<bool>(),
                pad in 0usize..4,
            ) {
                let text = if upper { alias.to_uppercase() } else { alias.to_string() };
                let raw = format!("{}{}{}", " ".repeat(pad), text, "*");
                prop_assert_eq!(SubstanceTable::LabPanel.normalize(&raw), Some(code));
            }
        }
    }
}
