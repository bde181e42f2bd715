use crate::config::PipelineConfig;

use super::ExtractionError;

/// Sanitize report text before parsing.
/// Strips control characters, trims every line and drops blank ones, keeps
/// the punctuation reports use for labels, units and cutoffs.
pub fn sanitize_extracted_text(raw: &str) -> String {
    raw.replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|c| {
            c.is_alphanumeric()
                || c.is_whitespace()
                || matches!(
                    c,
                    '.' | ','
                        | ';'
                        | ':'
                        | '-'
                        | '/'
                        | '('
                        | ')'
                        | '['
                        | ']'
                        | '+'
                        | '='
                        | '%'
                        | '#'
                        | '@'
                        | '&'
                        | '\''
                        | '"'
                        | '!'
                        | '?'
                        | '<'
                        | '>'
                        | '*'
                        | '_'
                        | '|'
                        | '~'
                        | 'µ'
                        | '\u{2013}' // En-dash
                        | '\u{2019}' // Right single quotation mark
                )
        })
        .collect::<String>()
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Share of characters that are printable. Line breaks and tabs count as
/// printable; U+FFFD (the mark of a lossy decode) does not.
pub fn printable_ratio(text: &str) -> f32 {
    let mut total = 0usize;
    let mut printable = 0usize;
    for c in text.chars() {
        total += 1;
        let unreadable = c == '\u{FFFD}' || (c.is_control() && !matches!(c, '\n' | '\r' | '\t'));
        if !unreadable {
            printable += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    printable as f32 / total as f32
}

/// Gate report text: reject anything that is not readable text, then
/// sanitize it. Every parse entry point goes through here.
pub fn prepare_text(text: &str, config: &PipelineConfig) -> Result<String, ExtractionError> {
    let text = text.trim_start_matches('\u{FEFF}');
    if text.trim().is_empty() {
        return Err(ExtractionError::EmptyText);
    }
    if text.starts_with("%PDF-") {
        return Err(ExtractionError::RawPdf);
    }

    let ratio = printable_ratio(text);
    if ratio < config.min_printable_ratio {
        return Err(ExtractionError::Unreadable {
            printable_ratio: ratio,
        });
    }

    let clean = sanitize_extracted_text(text);
    let chars = clean.chars().count();
    if chars == 0 {
        return Err(ExtractionError::EmptyText);
    }
    if chars < config.min_text_chars {
        return Err(ExtractionError::TooShort {
            chars,
            min: config.min_text_chars,
        });
    }
    Ok(clean)
}

/// Decode raw report bytes (already run through an upstream text extractor)
/// and gate them like [`prepare_text`].
pub fn text_from_bytes(bytes: &[u8], config: &PipelineConfig) -> Result<String, ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::EmptyText);
    }
    if bytes.starts_with(b"%PDF-") {
        return Err(ExtractionError::RawPdf);
    }
    let text =
        std::str::from_utf8(bytes).map_err(|e| ExtractionError::Encoding(e.to_string()))?;
    prepare_text(text, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_null_bytes() {
        let raw = "Donor: Jane\x00Doe";
        let clean = sanitize_extracted_text(raw);
        assert!(!clean.contains('\x00'));
        assert!(clean.contains("JaneDoe"));
    }

    #[test]
    fn strips_control_characters() {
        let raw = "Oxycodone 100 ng/mL\x01\x02\x03\nCollected: 03/15/2024";
        let clean = sanitize_extracted_text(raw);
        assert!(!clean.contains('\x01'));
        assert!(clean.contains("100 ng/mL"));
        assert!(clean.contains("03/15/2024"));
    }

    #[test]
    fn preserves_report_punctuation() {
        let raw = "Oxycodone * LC-MS/MS 50 ng/mL | Positive (>1,000)";
        assert_eq!(sanitize_extracted_text(raw), raw);
    }

    #[test]
    fn collapses_blank_lines() {
        let raw = "Line one\n\n\n\nLine two\n\n\nLine three";
        assert_eq!(sanitize_extracted_text(raw), "Line one\nLine two\nLine three");
    }

    #[test]
    fn normalizes_carriage_returns() {
        let raw = "Line one\r\nLine two\rLine three";
        assert_eq!(sanitize_extracted_text(raw), "Line one\nLine two\nLine three");
    }

    #[test]
    fn trims_whitespace_per_line() {
        let raw = "  leading spaces  \n\ttrailing too\t";
        assert_eq!(sanitize_extracted_text(raw), "leading spaces\ntrailing too");
    }

    #[test]
    fn empty_input_returns_empty() {
        assert_eq!(sanitize_extracted_text(""), "");
        assert_eq!(sanitize_extracted_text("\x00\x01\x02"), "");
    }

    #[test]
    fn printable_ratio_bounds() {
        assert_eq!(printable_ratio(""), 0.0);
        assert_eq!(printable_ratio("abc\n\tdef"), 1.0);
        assert!(printable_ratio("\x01\x02\x03a") < 0.5);
        assert!(printable_ratio("\u{FFFD}\u{FFFD}ab") <= 0.5);
    }

    #[test]
    fn prepare_rejects_empty() {
        let config = PipelineConfig::default();
        assert!(matches!(prepare_text("", &config), Err(ExtractionError::EmptyText)));
        assert!(matches!(
            prepare_text("  \n\t ", &config),
            Err(ExtractionError::EmptyText)
        ));
    }

    #[test]
    fn prepare_rejects_binary() {
        let config = PipelineConfig::default();
        let binary: String = (0u8..32).map(char::from).cycle().take(200).collect();
        let text = format!("Oxycodone Positive {binary}");
        assert!(matches!(
            prepare_text(&text, &config),
            Err(ExtractionError::Unreadable { .. })
        ));
    }

    #[test]
    fn prepare_rejects_short_text() {
        let config = PipelineConfig::default();
        assert!(matches!(
            prepare_text("THC Neg", &config),
            Err(ExtractionError::TooShort { chars: 7, min: 20 })
        ));
    }

    #[test]
    fn prepare_strips_bom_and_sanitizes() {
        let config = PipelineConfig::default();
        let clean = prepare_text("\u{FEFF}Donor Name: Jane Doe\n\nTHC Negative\n", &config).unwrap();
        assert_eq!(clean, "Donor Name: Jane Doe\nTHC Negative");
    }

    #[test]
    fn bytes_reject_raw_pdf() {
        let config = PipelineConfig::default();
        assert!(matches!(
            text_from_bytes(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3", &config),
            Err(ExtractionError::RawPdf)
        ));
    }

    #[test]
    fn bytes_reject_invalid_utf8() {
        let config = PipelineConfig::default();
        let bytes = b"Donor Name: Jane \xFF\xFE Doe, THC Negative";
        assert!(matches!(
            text_from_bytes(bytes, &config),
            Err(ExtractionError::Encoding(_))
        ));
    }

    #[test]
    fn bytes_reject_empty() {
        let config = PipelineConfig::default();
        assert!(matches!(
            text_from_bytes(b"", &config),
            Err(ExtractionError::EmptyText)
        ));
    }

    #[test]
    fn bytes_accept_report_text() {
        let config = PipelineConfig::default();
        let text = text_from_bytes(b"Donor Name: Jane Doe\r\nTHC Negative\r\n", &config).unwrap();
        assert_eq!(text, "Donor Name: Jane Doe\nTHC Negative");
    }
}
