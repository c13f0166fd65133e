use tracing::debug;

use super::{AnnotationParser, Diagnostic, MarkerKind, MessageRecord, Speaker};

impl AnnotationParser {
    /// Splits the transcript region on speaker labels.
    ///
    /// Each label opens a message that runs until the next label, so one
    /// message per line and several labels on one line go through the same
    /// path. Text ahead of the first label has no owner and is dropped.
    pub(super) fn parse_messages(
        &self,
        head: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<MessageRecord> {
        let labels = self
            .patterns
            .speaker_label
            .captures_iter(head)
            .filter_map(|captures| {
                let label = captures.get(0)?;
                let sender = Speaker::from_label(captures.get(1)?.as_str())?;
                Some((sender, label.start(), label.end()))
            })
            .collect::<Vec<_>>();

        let Some(&(_, first_start, _)) = labels.first() else {
            diagnostics.push(Diagnostic::StructuralAbsence {
                marker: MarkerKind::SpeakerLabel,
            });
            return Vec::new();
        };

        let preamble = head[..first_start].trim();
        if !preamble.is_empty() {
            debug!(
                chars = preamble.len(),
                "dropping unattributed text before first speaker label"
            );
        }

        labels
            .iter()
            .enumerate()
            .map(|(index, &(sender, _, body_start))| {
                let body_end = labels
                    .get(index + 1)
                    .map(|&(_, next_start, _)| next_start)
                    .unwrap_or(head.len());
                MessageRecord::new(sender, head[body_start..body_end].trim())
            })
            .collect()
    }
}
