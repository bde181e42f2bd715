//! Screen outcomes, laboratory confirmations and dilution.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::normalize::SubstanceTable;
use crate::models::{CanonicalSubstance, ConfirmationFinding, ConfirmationOutcome};

/// Screen-level outcome word next to a substance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenOutcome {
    Positive,
    Negative,
}

/// Compound keywords first so "Non-Negative" is never read as "Negative".
static OUTCOME_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(presumptive\s+positive|screened\s+positive|non-?negative|positive|pos|negative|neg|not\s+detected)\b",
    )
    .unwrap()
});

static LEADING_OUTCOME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(presumptive\s+positive|screened\s+positive|non-?negative|positive|pos|negative|neg|not\s+detected)\b",
    )
    .unwrap()
});

static CONFIRMATION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*confirmation(?:\s+(?:results?|testing|tests))?\s*:?\s*$|^\s*confirmation\s+(?:results?|testing)\b").unwrap()
});

static DILUTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bdilute(?:d)?\b").unwrap());

static DILUTE_NEGATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:not|non)[\s-]*dilute(?:d)?\b|\bdilute(?:d)?\s*[:\-]?\s*(?:no|negative|n/a|none|normal|false)\b",
    )
    .unwrap()
});

static NUMERIC_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+)?(?:ng/ml)?$").unwrap());

/// One regex per alias, so a hit always knows its substance.
fn alias_regexes(table: SubstanceTable) -> Vec<(CanonicalSubstance, Regex)> {
    table
        .entries()
        .map(|(alias, code)| {
            let pattern = super::normalize::alias_pattern(alias);
            (code, Regex::new(&pattern).unwrap())
        })
        .collect()
}

static INSTANT_SCREEN_PATTERNS: LazyLock<Vec<(CanonicalSubstance, Regex)>> =
    LazyLock::new(|| alias_regexes(SubstanceTable::InstantPanel));

static LAB_SCREEN_PATTERNS: LazyLock<Vec<(CanonicalSubstance, Regex)>> =
    LazyLock::new(|| alias_regexes(SubstanceTable::LabPanel));

fn confirmation_regexes(table: SubstanceTable) -> Vec<(CanonicalSubstance, Regex)> {
    table
        .entries()
        .map(|(alias, code)| {
            let words: Vec<String> = alias.split_whitespace().map(regex::escape).collect();
            let pattern = format!(
                r"(?i)\b{}s?\b\)?\s*\*?\s*(?:LC|GC)[-/\s]?MS(?:/MS)?\s+[<>]?\s*\d+(?:\.\d+)?\s*(?:ng/ml)?[ \t]+(?P<outcome>[^\r\n]+)",
                words.join(r"\s+")
            );
            (code, Regex::new(&pattern).unwrap())
        })
        .collect()
}

static LAB_CONFIRMATION_PATTERNS: LazyLock<Vec<(CanonicalSubstance, Regex)>> =
    LazyLock::new(|| confirmation_regexes(SubstanceTable::LabPanel));

fn screen_patterns(table: SubstanceTable) -> &'static [(CanonicalSubstance, Regex)] {
    match table {
        SubstanceTable::InstantPanel => &INSTANT_SCREEN_PATTERNS,
        SubstanceTable::LabPanel => &LAB_SCREEN_PATTERNS,
    }
}

/// Classify an outcome keyword.
pub fn keyword_outcome(keyword: &str) -> Option<ScreenOutcome> {
    let lowered = keyword.to_lowercase();
    let squashed: String = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    match squashed.as_str() {
        "presumptive positive" | "screened positive" | "non-negative" | "nonnegative"
        | "positive" | "pos" => Some(ScreenOutcome::Positive),
        "negative" | "neg" | "not detected" => Some(ScreenOutcome::Negative),
        _ => None,
    }
}

/// First outcome keyword in `window`.
pub fn first_outcome(window: &str) -> Option<ScreenOutcome> {
    OUTCOME_KEYWORD
        .find(window)
        .and_then(|m| keyword_outcome(m.as_str()))
}

/// Outcome for an alias ending at byte `alias_end`: the rest of its line,
/// capped at `window_chars`, or else the next line when that line opens
/// with an outcome keyword.
fn outcome_after(text: &str, alias_end: usize, window_chars: usize) -> Option<ScreenOutcome> {
    let rest = &text[alias_end..];
    let (line_rest, after_line) = match rest.find('\n') {
        Some(i) => (&rest[..i], Some(&rest[i + 1..])),
        None => (rest, None),
    };
    let window = match line_rest.char_indices().nth(window_chars) {
        Some((cut, _)) => &line_rest[..cut],
        None => line_rest,
    };
    if let Some(outcome) = first_outcome(window) {
        return Some(outcome);
    }

    let next_line = after_line?.lines().next()?;
    LEADING_OUTCOME
        .captures(next_line)
        .and_then(|c| keyword_outcome(&c[1]))
}

/// Substances with a positive-family screen, and every substance with any
/// explicit screen outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenFindings {
    pub detected: BTreeSet<CanonicalSubstance>,
    pub screened: BTreeSet<CanonicalSubstance>,
}

/// Scan `text` for screen outcomes of the substances in `panel`.
///
/// Any positive-family outcome marks a substance detected, even if another
/// alias of it reads negative elsewhere.
pub fn detect_substances(
    text: &str,
    table: SubstanceTable,
    panel: &[CanonicalSubstance],
    window_chars: usize,
) -> ScreenFindings {
    let mut findings = ScreenFindings::default();
    for (substance, pattern) in screen_patterns(table) {
        if !panel.contains(substance) {
            continue;
        }
        for hit in pattern.find_iter(text) {
            match outcome_after(text, hit.end(), window_chars) {
                Some(ScreenOutcome::Positive) => {
                    findings.screened.insert(*substance);
                    findings.detected.insert(*substance);
                }
                Some(ScreenOutcome::Negative) => {
                    findings.screened.insert(*substance);
                }
                None => {}
            }
        }
    }
    findings
}

/// Split lab text at the confirmation section header. Without a header the
/// whole text is the screen section.
pub fn split_confirmation_section(text: &str) -> (&str, Option<&str>) {
    match CONFIRMATION_HEADER.find(text) {
        Some(m) => (&text[..m.start()], Some(&text[m.start()..])),
        None => (text, None),
    }
}

static LEADING_UNIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^ng/ml\b").unwrap());

/// Outcome from the text after the cutoff: any outcome keyword on the rest
/// of the line, else a measured concentration as its first token. `None`
/// when nothing follows the cutoff unit.
fn confirmation_outcome(rest: &str) -> Option<ConfirmationOutcome> {
    let rest = LEADING_UNIT.replace(rest.trim(), "");
    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }
    match first_outcome(rest) {
        Some(ScreenOutcome::Negative) => return Some(ConfirmationOutcome::ConfirmedNegative),
        Some(ScreenOutcome::Positive) => return Some(ConfirmationOutcome::ConfirmedPositive),
        None => {}
    }
    let token = rest
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_matches(|c: char| matches!(c, ',' | ';' | '(' | ')' | '*'))
        .replace(',', "");
    if NUMERIC_VALUE.is_match(&token.to_lowercase()) {
        Some(ConfirmationOutcome::ConfirmedPositive)
    } else {
        Some(ConfirmationOutcome::Inconclusive)
    }
}

/// Read laboratory confirmation lines: alias, optional `*`, method marker,
/// cutoff, then an outcome word or a measured concentration. One finding per
/// substance; the first in text order wins.
pub fn detect_confirmations(text: &str) -> Vec<ConfirmationFinding> {
    let mut hits: Vec<(usize, CanonicalSubstance, ConfirmationOutcome)> = LAB_CONFIRMATION_PATTERNS
        .iter()
        .flat_map(|(substance, pattern)| {
            pattern.captures_iter(text).filter_map(move |caps| {
                let start = caps.get(0)?.start();
                let outcome = confirmation_outcome(caps.name("outcome")?.as_str())?;
                Some((start, *substance, outcome))
            })
        })
        .collect();
    hits.sort_by_key(|(start, substance, _)| (*start, *substance));

    let mut seen = BTreeSet::new();
    hits.into_iter()
        .filter(|(_, substance, _)| seen.insert(*substance))
        .map(|(_, substance, outcome)| ConfirmationFinding { substance, outcome })
        .collect()
}

/// True when some line flags the specimen dilute and does not negate it.
pub fn is_dilute(text: &str) -> bool {
    text.lines()
        .any(|line| DILUTE.is_match(line) && !DILUTE_NEGATED.is_match(line))
}
