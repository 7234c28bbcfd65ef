//! Pluggable subheading detection for narrative text.
//!
//! Filings rarely mark their internal subheadings ("Competition", "Seasonality:") with any
//! structure, so detection is heuristic. The strategy lives behind a trait so the chunker can
//! be exercised with a deterministic detector in tests and swapped without touching the
//! grouping logic.

/// Surrounding-line context handed to a detector alongside the candidate line.
#[derive(Debug, Clone, Copy)]
pub struct SubheadingContext<'a> {
    /// Whether the candidate line was preceded by a blank line (or the section start).
    pub preceded_by_blank: bool,
    /// The next non-blank line, when one exists.
    pub next_line: Option<&'a str>,
}

/// Strategy interface for recognizing subheading lines.
pub trait SubheadingDetector: Send + Sync {
    /// Return the subheading text when the line reads as a subheading, `None` otherwise.
    fn detect_subheading(&self, line: &str, context: SubheadingContext<'_>) -> Option<String>;
}

/// Default line-level heuristics: short, not sentence-terminated, ALL-CAPS / Title-Case /
/// colon-suffixed, and either flanked by blank lines or followed by a capitalized line.
#[derive(Debug, Default)]
pub struct HeuristicSubheadingDetector;

const MAX_SUBHEADING_CHARS: usize = 80;
const MAX_SUBHEADING_WORDS: usize = 10;

impl SubheadingDetector for HeuristicSubheadingDetector {
    fn detect_subheading(&self, line: &str, context: SubheadingContext<'_>) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_SUBHEADING_CHARS {
            return None;
        }
        if trimmed.split_whitespace().count() > MAX_SUBHEADING_WORDS {
            return None;
        }
        if trimmed.ends_with(['.', '!', '?', ',', ';']) {
            return None;
        }

        let shaped = trimmed.ends_with(':') || is_all_caps(trimmed) || is_title_case(trimmed);
        if !shaped {
            return None;
        }

        let flanked = context.preceded_by_blank
            || context
                .next_line
                .map(|next| starts_capitalized(next))
                .unwrap_or(false);
        if !flanked {
            return None;
        }

        Some(trimmed.trim_end_matches(':').trim().to_string())
    }
}

fn is_all_caps(text: &str) -> bool {
    let mut saw_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            saw_alpha = true;
            if c.is_lowercase() {
                return false;
            }
        }
    }
    saw_alpha
}

fn is_title_case(text: &str) -> bool {
    let words: Vec<&str> = text
        .split_whitespace()
        .filter(|word| word.chars().any(char::is_alphabetic))
        .collect();
    if words.is_empty() {
        return false;
    }
    if !starts_capitalized(words[0]) {
        return false;
    }
    // Small connective words ("of", "and") are allowed in lowercase.
    let capitalized = words.iter().filter(|word| starts_capitalized(word)).count();
    capitalized * 3 >= words.len() * 2
}

fn starts_capitalized(text: &str) -> bool {
    text.trim_start()
        .chars()
        .find(|c| c.is_alphabetic())
        .map(|c| c.is_uppercase())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(line: &str, preceded_by_blank: bool, next_line: Option<&str>) -> Option<String> {
        HeuristicSubheadingDetector.detect_subheading(
            line,
            SubheadingContext {
                preceded_by_blank,
                next_line,
            },
        )
    }

    #[test]
    fn all_caps_line_between_blanks_is_subheading() {
        assert_eq!(detect("COMPETITION", true, None), Some("COMPETITION".into()));
    }

    #[test]
    fn title_case_with_capitalized_follower_is_subheading() {
        assert_eq!(
            detect("Sources of Revenue", false, Some("We derive revenue from...")),
            Some("Sources of Revenue".into())
        );
    }

    #[test]
    fn colon_suffix_is_stripped() {
        assert_eq!(detect("Seasonality:", true, None), Some("Seasonality".into()));
    }

    #[test]
    fn sentence_terminated_line_is_not_subheading() {
        assert_eq!(detect("We sell widgets worldwide.", true, None), None);
    }

    #[test]
    fn long_prose_line_is_not_subheading() {
        let line = "during the fiscal year the company entered into several agreements";
        assert_eq!(detect(line, true, None), None);
    }

    #[test]
    fn unflanked_title_case_is_not_subheading() {
        assert_eq!(detect("Sources of Revenue", false, Some("and then...")), None);
    }
}
