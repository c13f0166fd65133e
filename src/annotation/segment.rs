use super::{AnnotationParser, Diagnostic, MarkerKind, Segment};

impl AnnotationParser {
    /// Splits a response into the annotated transcript and the critique block.
    ///
    /// A dashed divider line wins; otherwise the first line opening with a
    /// critique marker starts the tail. Without either the tail is empty.
    pub(super) fn segment(&self, raw: &str, diagnostics: &mut Vec<Diagnostic>) -> Segment {
        if let Some(divider) = self.patterns.divider.find(raw) {
            return Segment {
                head: raw[..divider.start()].trim().to_string(),
                tail: raw[divider.end()..].trim().to_string(),
            };
        }

        diagnostics.push(Diagnostic::StructuralAbsence {
            marker: MarkerKind::Divider,
        });

        if let Some(marker) = self.patterns.critique_line.find(raw) {
            return Segment {
                head: raw[..marker.start()].trim().to_string(),
                tail: raw[marker.start()..].trim().to_string(),
            };
        }

        diagnostics.push(Diagnostic::StructuralAbsence {
            marker: MarkerKind::CritiqueMarker,
        });

        Segment {
            head: raw.trim().to_string(),
            tail: String::new(),
        }
    }
}
