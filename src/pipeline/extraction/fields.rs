//! Donor-name and collection-date recovery shared by both report families.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::datetime::{parse_civil_date, CollectionTimeResolver};
use super::strategy::{first_success, ReportText, Strategy, StrategyHit};
use crate::models::{ExtractedField, LabRecordDraft};

// ═══════════════════════════════════════════
// Donor names
// ═══════════════════════════════════════════

/// Words that show a candidate line is a label or heading, not a person.
const NAME_STOPWORDS: &[&str] = &[
    "date", "time", "test", "tests", "panel", "result", "results", "donor", "information",
    "collection", "collected", "signature", "phone", "fax", "specimen", "laboratory",
    "laboratories", "lab", "negative", "positive", "report", "cup", "clinic", "center",
    "centre", "recovery", "services", "health", "inc", "llc", "screen", "drug", "urine",
    "description", "name", "id",
];

/// Clean a raw name: collapse whitespace, drop trailing punctuation and
/// signature underscores, reorder `LAST, FIRST` and fix all-caps casing.
pub fn clean_name(raw: &str) -> String {
    let collapsed = raw
        .trim_matches(|c: char| c == '_' || c == ':' || c.is_whitespace())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let collapsed = collapsed.trim_end_matches([',', ';', '.', '_']).trim();

    let reordered = match collapsed.split_once(',') {
        Some((last, first)) if !first.contains(',') && !first.trim().is_empty() => {
            format!("{} {}", first.trim(), last.trim())
        }
        _ => collapsed.to_string(),
    };

    if reordered.chars().any(|c| c.is_lowercase()) {
        reordered
    } else {
        reordered
            .split(' ')
            .map(title_case_word)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// "O'BRIEN-SMITH" -> "O'Brien-Smith".
fn title_case_word(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut upper_next = true;
    for c in word.chars() {
        if upper_next {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        upper_next = matches!(c, '\'' | '-');
    }
    out
}

/// Two to four alphabetic tokens, none of them a heading word.
pub fn is_plausible_name(name: &str) -> bool {
    if name.len() > 60 {
        return false;
    }
    let tokens: Vec<&str> = name.split_whitespace().collect();
    if !(2..=4).contains(&tokens.len()) {
        return false;
    }
    tokens.iter().all(|token| {
        let starts_alpha = token.chars().next().is_some_and(char::is_alphabetic);
        let body_ok = token
            .chars()
            .all(|c| c.is_alphabetic() || matches!(c, '\'' | '-' | '.'));
        let lowered = token.trim_end_matches('.').to_lowercase();
        starts_alpha && body_ok && !NAME_STOPWORDS.contains(&lowered.as_str())
    })
}

/// Acceptance check for name strategies.
pub fn accept_name(raw: String) -> Option<String> {
    let name = clean_name(&raw);
    is_plausible_name(&name).then_some(name)
}

// ═══════════════════════════════════════════
// Collection date
// ═══════════════════════════════════════════

const DATE_TOKEN: &str = r"\d{1,2}/\d{1,2}/\d{2,4}|\d{4}-\d{1,2}-\d{1,2}|\d{1,2}-\d{1,2}-\d{4}|\d{1,2}-[A-Za-z]{3}-\d{4}|[A-Za-z]{3,9}\.?\s+\d{1,2},?\s+\d{4}";

const TIME_TOKEN: &str = r"\d{1,2}:\d{2}(?::\d{2})?(?:\s*[AaPp]\.?\s*[Mm]\.?)?";

fn with_tokens(pattern: &str) -> Regex {
    Regex::new(&pattern.replace("{DATE}", DATE_TOKEN).replace("{TIME}", TIME_TOKEN)).unwrap()
}

static LABELED_COLLECTION_DATE: LazyLock<Regex> = LazyLock::new(|| {
    with_tokens(
        r"(?im)^\s*(?:collection\s+date|date\s+of\s+collection)(?:\s*(?:/|and|&)\s*time)?\s*[:\-]?\s*(?P<date>{DATE})(?:\s*(?:,|@|\bat\b)?\s*(?P<time>{TIME}))?",
    )
});

static LABELED_COLLECTION_TIME: LazyLock<Regex> = LazyLock::new(|| {
    with_tokens(r"(?im)^\s*(?:collection\s+time|time\s+(?:of\s+)?collect(?:ed|ion))\s*[:\-]?\s*(?P<time>{TIME})")
});

static COLLECTED_INLINE: LazyLock<Regex> = LazyLock::new(|| {
    with_tokens(
        r"(?i)\b(?:date\s+collected|collected(?:\s+on)?)\s*[:\-]?\s*(?P<date>{DATE})(?:\s*(?:,|@|\bat\b)?\s*(?P<time>{TIME}))?",
    )
});

static ANY_DATE: LazyLock<Regex> = LazyLock::new(|| with_tokens(r"(?P<date>{DATE})"));

static ANY_TIME: LazyLock<Regex> = LazyLock::new(|| with_tokens(r"(?P<time>{TIME})"));

/// Civil date and optional wall-clock time, as printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CivilStamp {
    pub date: String,
    pub time: Option<String>,
}

impl CivilStamp {
    fn from_captures(caps: &regex::Captures<'_>) -> Option<Self> {
        Some(Self {
            date: caps.name("date")?.as_str().to_string(),
            time: caps.name("time").map(|m| m.as_str().to_string()),
        })
    }
}

/// "Collection Date: 03/15/2024 10:42 AM", or the date with a separate
/// "Collection Time:" line.
pub fn labeled_collection_date(report: &ReportText<'_>) -> Option<CivilStamp> {
    let caps = LABELED_COLLECTION_DATE.captures(report.text())?;
    let mut stamp = CivilStamp::from_captures(&caps)?;
    if stamp.time.is_none() {
        stamp.time = LABELED_COLLECTION_TIME
            .captures(report.text())
            .and_then(|c| c.name("time"))
            .map(|m| m.as_str().to_string());
    }
    Some(stamp)
}

/// "Date Collected: 03/15/2024" or "Collected 3/15/24 @ 10:42".
pub fn collected_inline(report: &ReportText<'_>) -> Option<CivilStamp> {
    let caps = COLLECTED_INLINE.captures(report.text())?;
    let mut stamp = CivilStamp::from_captures(&caps)?;
    if stamp.time.is_none() {
        stamp.time = LABELED_COLLECTION_TIME
            .captures(report.text())
            .and_then(|c| c.name("time"))
            .map(|m| m.as_str().to_string());
    }
    Some(stamp)
}

/// First parseable date in the header block, with a time from the same line.
pub fn header_date(report: &ReportText<'_>) -> Option<CivilStamp> {
    report.header().iter().find_map(|line| {
        let date = ANY_DATE
            .find_iter(line)
            .map(|m| m.as_str())
            .find(|d| parse_civil_date(d).is_some())?;
        let time = ANY_TIME.find(line).map(|m| m.as_str().to_string());
        Some(CivilStamp {
            date: date.to_string(),
            time,
        })
    })
}

/// Resolve the collection instant through `strategies`; a stamp the resolver
/// cannot turn into an instant counts as a miss for that strategy.
pub fn resolve_collection(
    report: &ReportText<'_>,
    strategies: &[Strategy<CivilStamp>],
    resolver: &CollectionTimeResolver,
) -> Option<StrategyHit<DateTime<Utc>>> {
    first_success(
        ExtractedField::CollectionInstant,
        strategies,
        report,
        |stamp: CivilStamp| resolver.resolve(&stamp.date, stamp.time.as_deref()),
    )
}

/// Fill donor name and collection instant on `draft`, recording which
/// strategies produced them.
pub fn extract_identity(
    report: &ReportText<'_>,
    name_strategies: &[Strategy<String>],
    date_strategies: &[Strategy<CivilStamp>],
    resolver: &CollectionTimeResolver,
    draft: &mut LabRecordDraft,
) {
    if let Some(hit) = first_success(ExtractedField::DonorName, name_strategies, report, accept_name) {
        draft
            .field_strategies
            .insert(ExtractedField::DonorName, hit.strategy.to_string());
        draft.donor_name = Some(hit.value);
    }
    if let Some(hit) = resolve_collection(report, date_strategies, resolver) {
        draft
            .field_strategies
            .insert(ExtractedField::CollectionInstant, hit.strategy.to_string());
        draft.collection_instant = Some(hit.value);
    }
}
