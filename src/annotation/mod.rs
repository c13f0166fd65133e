//! Turns a free-form feedback response from the text-generation provider into
//! speaker-tagged messages plus a map of highlighted phrases and critiques.
//!
//! The pipeline runs in four stages: segment the response into transcript
//! and critique regions, parse messages, extract highlights, then pair
//! critiques with highlights. Every stage degrades to the emptiest valid
//! output instead of failing.

use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

mod critique;
mod highlights;
mod messages;
mod segment;
mod types;

pub use types::{
    AnnotatedTranscript, Annotation, AnnotationMap, CritiqueEntry, CritiqueStrategy, Diagnostic,
    HighlightSource, HighlightSpan, MarkerKind, MessageRecord, Segment, Speaker,
    parse_reference_key, reference_key,
};

pub const DEFAULT_WRAPPER_MARKER: &str = "(highlight)";
pub const DEFAULT_CRITIQUE_KEYWORD: &str = "feedback";

const ALIAS_LABEL_PATTERN: &str = r"[A-Z][A-Z0-9_]*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationConfig {
    pub wrapper_marker: String,
    pub critique_keyword: String,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            wrapper_marker: DEFAULT_WRAPPER_MARKER.to_string(),
            critique_keyword: DEFAULT_CRITIQUE_KEYWORD.to_string(),
        }
    }
}

#[derive(Debug)]
struct Patterns {
    divider: Regex,
    critique_line: Regex,
    speaker_label: Regex,
    wrapper_marker: Regex,
    parenthetical: Regex,
    alias_token: Regex,
    reference_key: Regex,
    critique_marker: Regex,
    quoted_phrase: Regex,
    paragraph_break: Regex,
}

impl Patterns {
    fn compile(config: &AnnotationConfig) -> Result<Self> {
        let wrapper = config.wrapper_marker.trim();
        if wrapper.is_empty() {
            bail!("wrapper marker must not be empty");
        }
        if fits_inside_reference_key(wrapper) {
            bail!("wrapper marker {wrapper:?} would match inside reference keys");
        }
        let keyword = config.critique_keyword.trim();
        if keyword.is_empty() || !keyword.chars().all(|value| value.is_alphanumeric()) {
            bail!("critique keyword must be a single word: {keyword:?}");
        }

        let keyword = regex::escape(keyword);
        let labelled_marker = format!(
            r"(?i:{keyword})(?:[ \t]*(?P<number>\d+))?(?:[ \t]*\[(?P<alias>{ALIAS_LABEL_PATTERN})\])?[ \t]*:"
        );
        let bare_alias_marker = format!(r"\[(?P<bare_alias>{ALIAS_LABEL_PATTERN})\][ \t]*:");

        Ok(Self {
            divider: Regex::new(r"(?m)^[ \t]*-{3,}[ \t]*\r?$")
                .context("failed to compile divider regex")?,
            critique_line: Regex::new(&format!(
                r"(?m)^[ \t]*(?:{labelled_marker}|{bare_alias_marker})"
            ))
            .context("failed to compile critique line regex")?,
            speaker_label: Regex::new(r"(?i)\b(user|ai)\s*:")
                .context("failed to compile speaker label regex")?,
            wrapper_marker: Regex::new(&format!("(?i){}", regex::escape(wrapper)))
                .context("failed to compile wrapper marker regex")?,
            parenthetical: Regex::new(r"\(([^()]*)\)")
                .context("failed to compile parenthetical regex")?,
            alias_token: Regex::new(&format!(r"\[({ALIAS_LABEL_PATTERN})\]"))
                .context("failed to compile alias token regex")?,
            reference_key: Regex::new(&format!(
                r"\({}(\d+)\)",
                regex::escape(types::REFERENCE_KEY_PREFIX)
            ))
            .context("failed to compile reference key regex")?,
            critique_marker: Regex::new(&format!(
                r"(?m)\b{labelled_marker}|^[ \t]*{bare_alias_marker}"
            ))
            .context("failed to compile critique marker regex")?,
            quoted_phrase: Regex::new(r#"["“]([^"“”\n]+)["”]"#)
                .context("failed to compile quoted phrase regex")?,
            paragraph_break: Regex::new(r"\n[ \t]*\r?\n")
                .context("failed to compile paragraph break regex")?,
        })
    }
}

/// Result of one parse call.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub transcript: AnnotatedTranscript,
    pub highlights: Vec<HighlightSpan>,
    pub critique_strategy: CritiqueStrategy,
    pub diagnostics: Vec<Diagnostic>,
}

/// Compiled parser; holds no per-call state and can be shared freely.
#[derive(Debug)]
pub struct AnnotationParser {
    patterns: Patterns,
}

impl AnnotationParser {
    pub fn new(config: &AnnotationConfig) -> Result<Self> {
        Ok(Self {
            patterns: Patterns::compile(config)?,
        })
    }

    pub fn parse(&self, raw: &str) -> ParseOutcome {
        let mut diagnostics = Vec::new();

        let segment = self.segment(raw, &mut diagnostics);
        debug!(
            head_chars = segment.head.len(),
            tail_chars = segment.tail.len(),
            "segmented feedback response"
        );

        let messages = self.parse_messages(&segment.head, &mut diagnostics);
        let entries = self.extract_critiques(&segment.tail);
        let aliases = alias_labels(&entries);
        debug!(
            messages = messages.len(),
            critique_entries = entries.len(),
            aliases = aliases.len(),
            "parsed transcript and critique regions"
        );

        let mut extraction = self.extract_highlights(messages, &aliases);
        let (annotations, critique_strategy) =
            self.assemble(entries, &mut extraction, &mut diagnostics);
        debug!(
            highlights = extraction.spans.len(),
            annotations = annotations.len(),
            strategy = critique_strategy.as_str(),
            "assembled annotations"
        );

        ParseOutcome {
            transcript: AnnotatedTranscript {
                messages: extraction.messages,
                annotations,
            },
            highlights: extraction.spans,
            critique_strategy,
            diagnostics,
        }
    }
}

/// Whether `marker` can occur inside some `(highlightedN)` key, compared
/// case-insensitively the way the wrapper regex matches.
fn fits_inside_reference_key(marker: &str) -> bool {
    let marker = marker.to_lowercase();
    let opening = format!("({}", types::REFERENCE_KEY_PREFIX);
    if opening.contains(marker.as_str()) {
        return true;
    }

    (0..=opening.len())
        .filter_map(|start| opening.get(start..))
        .any(|suffix| {
            marker.strip_prefix(suffix).is_some_and(|rest| {
                rest.strip_suffix(')')
                    .unwrap_or(rest)
                    .chars()
                    .all(|value| value.is_ascii_digit())
            })
        })
}

fn alias_labels(entries: &[CritiqueEntry]) -> HashSet<String> {
    entries
        .iter()
        .filter_map(|entry| entry.alias.clone())
        .collect()
}
