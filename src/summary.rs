use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

pub const DEFAULT_GOOD_SUMMARY: &str = "You engaged in the conversation!";
pub const DEFAULT_BAD_SUMMARY: &str = "Keep practicing to improve your conversational skills.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub good: String,
    pub bad: String,
}

/// Reads the `GOOD: ... BAD: ...` end-of-session summary response.
#[derive(Debug)]
pub struct SummaryParser {
    good: Regex,
    bad: Regex,
}

impl SummaryParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            good: Regex::new(r"(?is)GOOD\s*:\s*(.*?)\s*(?:BAD\s*:|\z)")
                .context("failed to compile good summary regex")?,
            bad: Regex::new(r"(?is)BAD\s*:\s*(.*)")
                .context("failed to compile bad summary regex")?,
        })
    }

    pub fn parse(&self, response: &str) -> SessionSummary {
        SessionSummary {
            good: capture_or(&self.good, response, DEFAULT_GOOD_SUMMARY),
            bad: capture_or(&self.bad, response, DEFAULT_BAD_SUMMARY),
        }
    }
}

fn capture_or(pattern: &Regex, response: &str, fallback: &str) -> String {
    pattern
        .captures(response)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().trim())
        .filter(|value| !value.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> SummaryParser {
        SummaryParser::new().expect("summary regexes should compile")
    }

    #[test]
    fn parses_both_sections_across_lines() {
        let summary = parser().parse(
            "GOOD: Asked follow-up questions.\nStayed polite.\nBAD: Answers were short.\nGive more detail.",
        );

        assert_eq!(summary.good, "Asked follow-up questions.\nStayed polite.");
        assert_eq!(summary.bad, "Answers were short.\nGive more detail.");
    }

    #[test]
    fn section_labels_are_case_insensitive() {
        let summary = parser().parse("good: warm tone bad: too vague");

        assert_eq!(summary.good, "warm tone");
        assert_eq!(summary.bad, "too vague");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parser = parser();

        let only_good = parser.parse("GOOD: clear questions");
        assert_eq!(only_good.good, "clear questions");
        assert_eq!(only_good.bad, DEFAULT_BAD_SUMMARY);

        let empty_good = parser.parse("GOOD:\nBAD: hesitant");
        assert_eq!(empty_good.good, DEFAULT_GOOD_SUMMARY);
        assert_eq!(empty_good.bad, "hesitant");

        let nothing = parser.parse("");
        assert_eq!(nothing.good, DEFAULT_GOOD_SUMMARY);
        assert_eq!(nothing.bad, DEFAULT_BAD_SUMMARY);
    }
}
