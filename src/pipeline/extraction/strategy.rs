//! Ordered-fallback field extraction.
//!
//! Report layouts vary by vendor and even by cup lot, so every field is
//! recovered by an ordered list of named strategies. The first strategy whose
//! output passes the field's acceptance check wins.

use regex::Regex;

use crate::models::ExtractedField;

/// Report text pre-split into trimmed, non-empty lines.
#[derive(Debug, Clone)]
pub struct ReportText<'a> {
    text: &'a str,
    lines: Vec<&'a str>,
    header_lines: usize,
}

impl<'a> ReportText<'a> {
    pub fn new(text: &'a str, header_lines: usize) -> Self {
        let lines = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        Self {
            text,
            lines,
            header_lines,
        }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn lines(&self) -> &[&'a str] {
        &self.lines
    }

    /// Leading lines where titles, clinic details and the collection date sit.
    pub fn header(&self) -> &[&'a str] {
        &self.lines[..self.header_lines.min(self.lines.len())]
    }

    /// Index of the first line matching `pattern`.
    pub fn find_line(&self, pattern: &Regex) -> Option<usize> {
        self.lines.iter().position(|l| pattern.is_match(l))
    }

    pub fn line_after(&self, index: usize) -> Option<&'a str> {
        self.lines.get(index + 1).copied()
    }

    pub fn line_before(&self, index: usize) -> Option<&'a str> {
        index.checked_sub(1).and_then(|i| self.lines.get(i).copied())
    }
}

/// A named way of pulling one field out of a report.
pub struct Strategy<T> {
    pub name: &'static str,
    pub extract: fn(&ReportText<'_>) -> Option<T>,
}

impl<T> Strategy<T> {
    pub const fn new(name: &'static str, extract: fn(&ReportText<'_>) -> Option<T>) -> Self {
        Self { name, extract }
    }
}

/// Winning value plus the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyHit<T> {
    pub value: T,
    pub strategy: &'static str,
}

/// Run `strategies` in order; the first candidate `accept` turns into a
/// value wins. A strategy that matches but yields an implausible candidate is
/// skipped, not fatal.
pub fn first_success<T, U>(
    field: ExtractedField,
    strategies: &[Strategy<T>],
    report: &ReportText<'_>,
    accept: impl Fn(T) -> Option<U>,
) -> Option<StrategyHit<U>> {
    for strategy in strategies {
        let Some(candidate) = (strategy.extract)(report) else {
            tracing::trace!(field = %field, strategy = strategy.name, "Strategy found nothing");
            continue;
        };
        match accept(candidate) {
            Some(value) => {
                tracing::debug!(field = %field, strategy = strategy.name, "Field extracted");
                return Some(StrategyHit {
                    value,
                    strategy: strategy.name,
                });
            }
            None => {
                tracing::debug!(field = %field, strategy = strategy.name, "Candidate rejected as implausible");
            }
        }
    }
    tracing::debug!(field = %field, "No strategy recovered field");
    None
}
