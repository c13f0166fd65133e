use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::annotation::{AnnotationConfig, AnnotationParser, ParseOutcome, Speaker};
use crate::cli::AnnotateArgs;
use crate::model::{AnnotationCounts, AnnotationRunManifest, HighlightSourceCount};
use crate::util::{now_utc_string, read_input, sha256_hex, write_json_pretty, write_json_stdout};

const REPORT_MANIFEST_VERSION: u32 = 1;

pub fn run(args: AnnotateArgs) -> Result<()> {
    let config = AnnotationConfig {
        wrapper_marker: args.wrapper_marker.clone(),
        critique_keyword: args.critique_keyword.clone(),
    };
    let parser = AnnotationParser::new(&config).context("invalid annotation settings")?;

    let raw = read_input(&args.input)?;
    info!(input = %args.input.display(), chars = raw.len(), "annotating feedback response");

    let outcome = parser.parse(&raw);
    for diagnostic in &outcome.diagnostics {
        if diagnostic.is_warning() {
            warn!(diagnostic = %diagnostic, "annotation diagnostic");
        } else {
            debug!(diagnostic = %diagnostic, "annotation diagnostic");
        }
    }

    match &args.output {
        Some(path) => {
            write_json_pretty(path, &outcome.transcript)?;
            info!(path = %path.display(), "wrote annotated transcript");
        }
        None => write_json_stdout(&outcome.transcript, args.compact)?,
    }

    if let Some(report_path) = &args.report_path {
        let manifest = build_manifest(&args.input, config, &raw, &outcome);
        write_json_pretty(report_path, &manifest)?;
        info!(path = %report_path.display(), "wrote annotation report");
    }

    if outcome.transcript.annotations.is_empty() {
        debug!("no highlights found in response");
    }
    info!(
        messages = outcome.transcript.messages.len(),
        highlights = outcome.transcript.annotations.len(),
        strategy = outcome.critique_strategy.as_str(),
        "annotation completed"
    );

    Ok(())
}

fn build_manifest(
    input: &Path,
    config: AnnotationConfig,
    raw: &str,
    outcome: &ParseOutcome,
) -> AnnotationRunManifest {
    let annotations = &outcome.transcript.annotations;
    let resolved = annotations
        .iter()
        .filter(|(_, annotation)| !annotation.critique_text.is_empty())
        .count();

    let mut sources = BTreeMap::new();
    for span in &outcome.highlights {
        *sources.entry(span.source).or_insert(0usize) += 1;
    }

    AnnotationRunManifest {
        manifest_version: REPORT_MANIFEST_VERSION,
        generated_at: now_utc_string(),
        input_path: input.display().to_string(),
        input_sha256: sha256_hex(raw.as_bytes()),
        input_chars: raw.chars().count(),
        config,
        counts: AnnotationCounts {
            messages: outcome.transcript.messages.len(),
            user_messages: outcome
                .transcript
                .messages
                .iter()
                .filter(|message| message.sender == Speaker::User)
                .count(),
            highlights: annotations.len(),
            resolved,
            unresolved: annotations.len() - resolved,
        },
        critique_strategy: outcome.critique_strategy,
        highlight_sources: sources
            .into_iter()
            .map(|(source, count)| HighlightSourceCount { source, count })
            .collect(),
        diagnostics: outcome.diagnostics.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::annotation::{CritiqueStrategy, HighlightSource};

    #[test]
    fn manifest_counts_resolved_and_unresolved_highlights() {
        let config = AnnotationConfig::default();
        let parser = AnnotationParser::new(&config).expect("default config compiles");
        let raw = "user: (highlight)Um(highlight) (I guess)\n\
                   ai: ok\n\
                   user: Well (maybe) so.\n\
                   ---\n\
                   feedback: drop the filler.";
        let outcome = parser.parse(raw);

        let manifest = build_manifest(&PathBuf::from("response.txt"), config, raw, &outcome);

        assert_eq!(manifest.manifest_version, REPORT_MANIFEST_VERSION);
        assert_eq!(manifest.input_path, "response.txt");
        assert_eq!(manifest.input_sha256.len(), 64);
        assert_eq!(manifest.counts.messages, 3);
        assert_eq!(manifest.counts.user_messages, 2);
        assert_eq!(manifest.counts.highlights, 2);
        assert_eq!(manifest.counts.resolved, 1);
        assert_eq!(manifest.counts.unresolved, 1);
        assert_eq!(manifest.critique_strategy, CritiqueStrategy::Positional);

        let sources = manifest
            .highlight_sources
            .iter()
            .map(|entry| (entry.source, entry.count))
            .collect::<Vec<_>>();
        assert_eq!(
            sources,
            vec![
                (HighlightSource::WrapperMarkers, 1),
                (HighlightSource::ImplicitParenthetical, 1),
            ]
        );
    }
}
