use std::collections::HashMap;

use tracing::debug;

use super::highlights::Extraction;
use super::{
    Annotation, AnnotationMap, AnnotationParser, CritiqueEntry, CritiqueStrategy, Diagnostic,
    parse_reference_key, reference_key,
};

impl AnnotationParser {
    /// Reads critique entries from the tail in order of appearance.
    ///
    /// An entry runs from its marker to the next marker, a blank line, or the
    /// end of the tail.
    pub(super) fn extract_critiques(&self, tail: &str) -> Vec<CritiqueEntry> {
        let markers = self
            .patterns
            .critique_marker
            .captures_iter(tail)
            .collect::<Vec<_>>();

        markers
            .iter()
            .enumerate()
            .filter_map(|(index, captures)| {
                let marker = captures.get(0)?;
                let body_end = markers
                    .get(index + 1)
                    .and_then(|next| next.get(0))
                    .map(|next| next.start())
                    .unwrap_or(tail.len());
                let mut body = &tail[marker.end()..body_end];
                if let Some(paragraph_break) = self.patterns.paragraph_break.find(body) {
                    body = &body[..paragraph_break.start()];
                }

                let alias = captures
                    .name("alias")
                    .or_else(|| captures.name("bare_alias"))
                    .map(|value| value.as_str().to_string());
                let (target, text) = self.split_quoted_target(body.trim());

                Some(CritiqueEntry {
                    sequence_index: index,
                    text,
                    target,
                    alias,
                })
            })
            .collect()
    }

    /// Pulls a quoted phrase out of an entry body. When the body opens with
    /// the quote, the critique is what follows it; otherwise the whole body.
    fn split_quoted_target(&self, body: &str) -> (Option<String>, String) {
        let Some(captures) = self.patterns.quoted_phrase.captures(body) else {
            return (None, body.to_string());
        };
        let (Some(whole), Some(phrase)) = (captures.get(0), captures.get(1)) else {
            return (None, body.to_string());
        };
        let target = phrase.as_str().trim();
        if target.is_empty() {
            return (None, body.to_string());
        }

        if whole.start() == 0 {
            let rest = body[whole.end()..]
                .trim_start_matches(|value: char| {
                    value.is_whitespace() || matches!(value, '-' | '–' | '—' | ':' | ';' | ',')
                })
                .trim();
            if !rest.is_empty() {
                return (Some(target.to_string()), rest.to_string());
            }
        }

        (Some(target.to_string()), body.to_string())
    }

    /// Pairs critique entries with highlights and builds the final map.
    ///
    /// Entries labelled with an alias bind to the matching alias highlight.
    /// The rest are handled by one strategy for the whole call: quoted
    /// targets if any entry quotes a phrase, positional pairing otherwise.
    /// Every highlight ends up in the map, with an empty critique if nothing
    /// was paired with it.
    pub(super) fn assemble(
        &self,
        entries: Vec<CritiqueEntry>,
        extraction: &mut Extraction,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> (AnnotationMap, CritiqueStrategy) {
        let mut critiques = HashMap::<u32, String>::new();
        let mut remaining = Vec::with_capacity(entries.len());
        let mut alias_bound = 0usize;

        for entry in entries {
            let position = entry.alias.as_deref().and_then(|alias| {
                extraction.spans.iter().position(|span| {
                    span.alias.as_deref() == Some(alias)
                        && !critiques.contains_key(&span.sequence_index)
                })
            });
            let Some(position) = position else {
                remaining.push(entry);
                continue;
            };

            let span = &mut extraction.spans[position];
            if let Some(target) = entry.target {
                span.original_text = target;
            }
            critiques.insert(span.sequence_index, entry.text);
            alias_bound += 1;
        }

        let strategy = if remaining.is_empty() {
            if alias_bound > 0 {
                CritiqueStrategy::AliasOnly
            } else {
                CritiqueStrategy::NoEntries
            }
        } else if remaining.iter().any(|entry| entry.target.is_some()) {
            CritiqueStrategy::QuotedTarget
        } else {
            CritiqueStrategy::Positional
        };

        match strategy {
            CritiqueStrategy::QuotedTarget => {
                self.bind_quoted_targets(remaining, extraction, &mut critiques, diagnostics)
            }
            CritiqueStrategy::Positional => {
                bind_positional(remaining, extraction, &mut critiques, diagnostics)
            }
            CritiqueStrategy::NoEntries | CritiqueStrategy::AliasOnly => {}
        }

        let mut annotations = AnnotationMap::default();
        for span in &extraction.spans {
            let critique_text = match critiques.remove(&span.sequence_index) {
                Some(text) => text,
                None => {
                    diagnostics.push(Diagnostic::UnresolvedReference {
                        key: reference_key(span.sequence_index),
                    });
                    String::new()
                }
            };
            let original_text = match (&span.alias, span.original_text.is_empty()) {
                (Some(alias), true) => alias.clone(),
                _ => span.original_text.clone(),
            };

            annotations.insert(
                span.sequence_index,
                Annotation {
                    original_text,
                    critique_text,
                },
            );
        }

        self.cover_stray_keys(extraction, &mut annotations, diagnostics);

        (annotations, strategy)
    }

    fn bind_quoted_targets(
        &self,
        entries: Vec<CritiqueEntry>,
        extraction: &mut Extraction,
        critiques: &mut HashMap<u32, String>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        for entry in entries {
            let Some(target) = entry.target.as_deref() else {
                diagnostics.push(Diagnostic::UnattachedCritique {
                    entry: entry.sequence_index,
                    reason: "entry quotes no phrase while quoted targets are in use",
                });
                continue;
            };

            let existing = extraction
                .spans
                .iter()
                .find(|span| {
                    !critiques.contains_key(&span.sequence_index)
                        && phrases_match(&span.original_text, target)
                })
                .map(|span| span.sequence_index);

            let bound = existing.or_else(|| {
                extraction.substitute_literal(target, &self.patterns.reference_key)
            });

            match bound {
                Some(index) => {
                    debug!(
                        key = %reference_key(index),
                        target = %target,
                        "bound quoted critique"
                    );
                    critiques.insert(index, entry.text);
                }
                None => diagnostics.push(Diagnostic::UnattachedCritique {
                    entry: entry.sequence_index,
                    reason: "quoted phrase not found in transcript",
                }),
            }
        }
    }

    /// Gives an empty annotation to any key-shaped token that the upstream
    /// text already contained, so no key in a message is left dangling.
    /// Upstream keys were normalized during extraction, so every token here
    /// is spelled exactly as the map serializes it.
    fn cover_stray_keys(
        &self,
        extraction: &Extraction,
        annotations: &mut AnnotationMap,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        for message in &extraction.messages {
            for found in self.patterns.reference_key.find_iter(&message.text) {
                let Some(index) = parse_reference_key(found.as_str()) else {
                    debug!(token = found.as_str(), "skipping non-canonical key token");
                    continue;
                };
                if annotations.get(found.as_str()).is_some() {
                    continue;
                }

                diagnostics.push(Diagnostic::UnresolvedReference {
                    key: found.as_str().to_string(),
                });
                annotations.insert(
                    index,
                    Annotation {
                        original_text: String::new(),
                        critique_text: String::new(),
                    },
                );
            }
        }
    }
}

fn bind_positional(
    entries: Vec<CritiqueEntry>,
    extraction: &Extraction,
    critiques: &mut HashMap<u32, String>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let unbound = extraction
        .spans
        .iter()
        .filter(|span| !critiques.contains_key(&span.sequence_index))
        .map(|span| span.sequence_index)
        .collect::<Vec<_>>();

    for (position, entry) in entries.into_iter().enumerate() {
        match unbound.get(position) {
            Some(&index) => {
                critiques.insert(index, entry.text);
            }
            None => diagnostics.push(Diagnostic::UnattachedCritique {
                entry: entry.sequence_index,
                reason: "no highlight left to pair with",
            }),
        }
    }
}

fn phrases_match(original: &str, target: &str) -> bool {
    let original = original.trim();
    let target = target.trim();
    original == target || original.to_lowercase() == target.to_lowercase()
}
