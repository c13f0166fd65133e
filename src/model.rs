use serde::Serialize;

use crate::annotation::{AnnotationConfig, CritiqueStrategy, Diagnostic, HighlightSource};

#[derive(Debug, Clone, Serialize)]
pub struct AnnotationCounts {
    pub messages: usize,
    pub user_messages: usize,
    pub highlights: usize,
    pub resolved: usize,
    pub unresolved: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HighlightSourceCount {
    pub source: HighlightSource,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotationRunManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub input_path: String,
    pub input_sha256: String,
    pub input_chars: usize,
    pub config: AnnotationConfig,
    pub counts: AnnotationCounts,
    pub critique_strategy: CritiqueStrategy,
    pub highlight_sources: Vec<HighlightSourceCount>,
    pub diagnostics: Vec<Diagnostic>,
}
