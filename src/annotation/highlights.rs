use std::collections::HashSet;
use std::ops::Range;

use regex::{Captures, Regex};
use tracing::debug;

use super::{
    AnnotationParser, HighlightSource, HighlightSpan, MessageRecord, Speaker, reference_key,
};

/// Hands out reference key numbers, starting above any key already present
/// in the transcript so keys are never reused within one parse. Once the
/// number space is used up it hands out nothing.
#[derive(Debug, Clone)]
pub(super) struct KeyAllocator {
    next: Option<u32>,
}

impl KeyAllocator {
    pub(super) fn seeded(messages: &[MessageRecord], reference_key_regex: &Regex) -> Self {
        let highest = messages
            .iter()
            .flat_map(|message| reference_key_regex.captures_iter(&message.text))
            .filter_map(|captures| captures.get(1)?.as_str().parse::<u32>().ok())
            .max()
            .unwrap_or(0);

        Self {
            next: highest.checked_add(1),
        }
    }

    pub(super) fn allocate(&mut self) -> Option<u32> {
        let index = self.next?;
        self.next = index.checked_add(1);
        Some(index)
    }
}

/// Messages with highlights substituted, plus the spans in discovery order.
#[derive(Debug, Clone)]
pub(super) struct Extraction {
    pub(super) messages: Vec<MessageRecord>,
    pub(super) spans: Vec<HighlightSpan>,
    pub(super) keys: KeyAllocator,
}

impl Extraction {
    /// Replaces the first literal occurrence of `phrase` in a user message
    /// that does not sit inside an existing reference key. Returns the new
    /// span's index.
    pub(super) fn substitute_literal(
        &mut self,
        phrase: &str,
        reference_key_regex: &Regex,
    ) -> Option<u32> {
        for message in self
            .messages
            .iter_mut()
            .filter(|message| message.sender == Speaker::User)
        {
            let key_ranges = reference_key_regex
                .find_iter(&message.text)
                .map(|found| found.range())
                .collect::<Vec<_>>();

            let Some(start) = message
                .text
                .match_indices(phrase)
                .map(|(start, _)| start)
                .find(|start| {
                    let end = start + phrase.len();
                    !key_ranges
                        .iter()
                        .any(|range| *start < range.end && range.start < end)
                })
            else {
                continue;
            };

            let candidate = Candidate {
                range: start..start + phrase.len(),
                original_text: phrase.to_string(),
                alias: None,
            };
            let mut added = apply_candidates(
                message,
                vec![candidate],
                HighlightSource::QuotedTarget,
                &mut self.keys,
            );
            let span = added.pop()?;
            let index = span.sequence_index;
            self.spans.push(span);
            return Some(index);
        }

        None
    }
}

/// A span a strategy wants replaced, in byte offsets of the message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Candidate {
    pub(super) range: Range<usize>,
    pub(super) original_text: String,
    pub(super) alias: Option<String>,
}

impl AnnotationParser {
    /// Runs the highlight strategies over each message in order; the first
    /// strategy that finds anything in a message wins for that message.
    pub(super) fn extract_highlights(
        &self,
        mut messages: Vec<MessageRecord>,
        aliases: &HashSet<String>,
    ) -> Extraction {
        for (position, message) in messages.iter_mut().enumerate() {
            self.canonicalize_reference_keys(position, message);
        }
        let mut keys = KeyAllocator::seeded(&messages, &self.patterns.reference_key);
        let mut spans = Vec::new();

        for (position, message) in messages.iter_mut().enumerate() {
            for strategy in HighlightSource::EXTRACTION_PRIORITY {
                let candidates = self.detect(strategy, message, aliases);
                if candidates.is_empty() {
                    continue;
                }

                let added = apply_candidates(message, candidates, strategy, &mut keys);
                debug!(
                    message = position,
                    strategy = strategy.as_str(),
                    count = added.len(),
                    "extracted highlights"
                );
                spans.extend(added);
                break;
            }
        }

        Extraction {
            messages,
            spans,
            keys,
        }
    }

    /// Rewrites key-shaped text that arrived from upstream into the exact
    /// spelling the map serializes (`(highlighted01)` becomes
    /// `(highlighted1)`). Tokens whose number does not fit a key are dropped.
    fn canonicalize_reference_keys(&self, position: usize, message: &mut MessageRecord) {
        if !self.patterns.reference_key.is_match(&message.text) {
            return;
        }

        let rewritten = self
            .patterns
            .reference_key
            .replace_all(&message.text, |captures: &Captures| {
                captures
                    .get(1)
                    .and_then(|digits| digits.as_str().parse::<u32>().ok())
                    .map(reference_key)
                    .unwrap_or_default()
            })
            .into_owned();

        if rewritten != message.text {
            debug!(message = position, "normalized upstream reference keys");
            message.text = rewritten;
        }
    }

    fn detect(
        &self,
        strategy: HighlightSource,
        message: &MessageRecord,
        aliases: &HashSet<String>,
    ) -> Vec<Candidate> {
        match strategy {
            HighlightSource::WrapperMarkers => self.detect_wrapper_markers(message),
            HighlightSource::ImplicitParenthetical => self.detect_implicit_parenthetical(message),
            HighlightSource::AliasToken => self.detect_alias_tokens(message, aliases),
            HighlightSource::QuotedTarget => Vec::new(),
        }
    }

    /// Consecutive marker pairs delimit a phrase. An odd trailing marker, or a
    /// pair around nothing, is left in the text as is.
    fn detect_wrapper_markers(&self, message: &MessageRecord) -> Vec<Candidate> {
        let markers = self
            .patterns
            .wrapper_marker
            .find_iter(&message.text)
            .collect::<Vec<_>>();

        markers
            .chunks_exact(2)
            .filter_map(|pair| {
                let interior = message.text[pair[0].end()..pair[1].start()].trim();
                if interior.is_empty() {
                    return None;
                }
                Some(Candidate {
                    range: pair[0].start()..pair[1].end(),
                    original_text: interior.to_string(),
                    alias: None,
                })
            })
            .collect()
    }

    /// First non-empty `( ... )` in a user message. Keys and stray wrapper
    /// markers are skipped. At most one per message.
    fn detect_implicit_parenthetical(&self, message: &MessageRecord) -> Vec<Candidate> {
        if message.sender != Speaker::User {
            return Vec::new();
        }

        self.patterns
            .parenthetical
            .captures_iter(&message.text)
            .find_map(|captures| {
                let whole = captures.get(0)?;
                let interior = captures.get(1)?.as_str().trim();
                if interior.is_empty()
                    || is_whole_match(&self.patterns.reference_key, whole.as_str())
                    || is_whole_match(&self.patterns.wrapper_marker, whole.as_str())
                {
                    return None;
                }
                Some(Candidate {
                    range: whole.range(),
                    original_text: interior.to_string(),
                    alias: None,
                })
            })
            .into_iter()
            .collect()
    }

    /// `[LABEL]` tokens count only when the critique block has an entry for
    /// the same label; the phrase itself arrives with that entry.
    fn detect_alias_tokens(
        &self,
        message: &MessageRecord,
        aliases: &HashSet<String>,
    ) -> Vec<Candidate> {
        if aliases.is_empty() {
            return Vec::new();
        }

        self.patterns
            .alias_token
            .captures_iter(&message.text)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                let label = captures.get(1)?.as_str();
                if !aliases.contains(label) {
                    return None;
                }
                Some(Candidate {
                    range: whole.range(),
                    original_text: String::new(),
                    alias: Some(label.to_string()),
                })
            })
            .collect()
    }
}

/// Rewrites the message left to right, swapping each candidate range for the
/// next reference key. Candidates must be sorted and non-overlapping. If keys
/// run out, the remaining candidates stay in the text untouched.
pub(super) fn apply_candidates(
    message: &mut MessageRecord,
    candidates: Vec<Candidate>,
    source: HighlightSource,
    keys: &mut KeyAllocator,
) -> Vec<HighlightSpan> {
    let mut rewritten = String::with_capacity(message.text.len());
    let mut spans = Vec::with_capacity(candidates.len());
    let mut cursor = 0usize;

    for candidate in candidates {
        let Some(index) = keys.allocate() else {
            debug!(
                original = %candidate.original_text,
                "reference keys exhausted, leaving phrase in place"
            );
            break;
        };
        rewritten.push_str(&message.text[cursor..candidate.range.start]);
        rewritten.push_str(&reference_key(index));
        cursor = candidate.range.end;

        spans.push(HighlightSpan {
            sequence_index: index,
            original_text: candidate.original_text,
            alias: candidate.alias,
            source,
        });
    }

    rewritten.push_str(&message.text[cursor..]);
    message.text = rewritten;
    spans
}

fn is_whole_match(regex: &Regex, text: &str) -> bool {
    regex
        .find(text)
        .is_some_and(|found| found.start() == 0 && found.end() == text.len())
}
