use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const REFERENCE_KEY_PREFIX: &str = "highlighted";

pub fn reference_key(sequence_index: u32) -> String {
    format!("({REFERENCE_KEY_PREFIX}{sequence_index})")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Ai,
}

impl Speaker {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("user") {
            Some(Self::User)
        } else if label.eq_ignore_ascii_case("ai") {
            Some(Self::Ai)
        } else {
            None
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Speaker {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Speaker::from_label(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown sender label: {raw}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub sender: Speaker,
    pub text: String,
}

impl MessageRecord {
    pub fn new(sender: Speaker, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub head: String,
    pub tail: String,
}

/// Where a highlight was recognised.
///
/// The first three variants are the per-message extraction strategies, in
/// the order they are tried. `QuotedTarget` highlights are originated while
/// assembling critiques.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightSource {
    WrapperMarkers,
    ImplicitParenthetical,
    AliasToken,
    QuotedTarget,
}

impl HighlightSource {
    pub const EXTRACTION_PRIORITY: [HighlightSource; 3] = [
        HighlightSource::WrapperMarkers,
        HighlightSource::ImplicitParenthetical,
        HighlightSource::AliasToken,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WrapperMarkers => "wrapper_markers",
            Self::ImplicitParenthetical => "implicit_parenthetical",
            Self::AliasToken => "alias_token",
            Self::QuotedTarget => "quoted_target",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpan {
    pub sequence_index: u32,
    pub original_text: String,
    /// Bracket label the span was recognised from, if any.
    pub alias: Option<String>,
    pub source: HighlightSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CritiqueEntry {
    pub sequence_index: usize,
    pub text: String,
    pub target: Option<String>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CritiqueStrategy {
    NoEntries,
    AliasOnly,
    QuotedTarget,
    Positional,
}

impl CritiqueStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoEntries => "no_entries",
            Self::AliasOnly => "alias_only",
            Self::QuotedTarget => "quoted_target",
            Self::Positional => "positional",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub original_text: String,
    pub critique_text: String,
}

/// Reference key to `[original phrase, critique]`, ordered by key number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationMap {
    entries: BTreeMap<u32, Annotation>,
}

impl AnnotationMap {
    pub fn insert(&mut self, sequence_index: u32, annotation: Annotation) {
        self.entries.insert(sequence_index, annotation);
    }

    pub fn get(&self, key: &str) -> Option<&Annotation> {
        parse_reference_key(key).and_then(|index| self.entries.get(&index))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (String, &Annotation)> {
        self.entries
            .iter()
            .map(|(index, annotation)| (reference_key(*index), annotation))
    }
}

impl Serialize for AnnotationMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, annotation) in self.iter() {
            map.serialize_entry(
                &key,
                &[
                    annotation.original_text.as_str(),
                    annotation.critique_text.as_str(),
                ],
            )?;
        }
        map.end()
    }
}

/// Key number of a canonically spelled reference key. Zero-padded or
/// otherwise non-canonical spellings are rejected so lookups stay byte-exact
/// with what the map serializes.
pub fn parse_reference_key(key: &str) -> Option<u32> {
    key.strip_prefix('(')?
        .strip_suffix(')')?
        .strip_prefix(REFERENCE_KEY_PREFIX)?
        .parse::<u32>()
        .ok()
        .filter(|index| reference_key(*index) == key)
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedTranscript {
    pub messages: Vec<MessageRecord>,
    #[serde(rename = "highlights")]
    pub annotations: AnnotationMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Divider,
    CritiqueMarker,
    SpeakerLabel,
}

impl MarkerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Divider => "divider",
            Self::CritiqueMarker => "critique marker",
            Self::SpeakerLabel => "speaker label",
        }
    }
}

/// Non-fatal findings recorded while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    StructuralAbsence { marker: MarkerKind },
    UnresolvedReference { key: String },
    UnattachedCritique { entry: usize, reason: &'static str },
}

impl Diagnostic {
    pub fn is_warning(&self) -> bool {
        !matches!(self, Diagnostic::StructuralAbsence { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::StructuralAbsence { marker } => {
                write!(f, "structural absence: no {} found", marker.as_str())
            }
            Diagnostic::UnresolvedReference { key } => {
                write!(f, "unresolved reference: {key} has no critique")
            }
            Diagnostic::UnattachedCritique { entry, reason } => {
                write!(f, "critique entry {entry} not attached: {reason}")
            }
        }
    }
}
