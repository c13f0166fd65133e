use anyhow::{Context, Result};
use serde::Deserialize;

use crate::annotation::MessageRecord;

/// Client payloads arrive either wrapped as `{ "messages": [...] }` or as a
/// bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranscriptDocument {
    Wrapped { messages: Vec<MessageRecord> },
    Bare(Vec<MessageRecord>),
}

pub fn parse_messages_json(raw: &str) -> Result<Vec<MessageRecord>> {
    let document: TranscriptDocument =
        serde_json::from_str(raw).context("failed to parse transcript messages json")?;

    Ok(match document {
        TranscriptDocument::Wrapped { messages } => messages,
        TranscriptDocument::Bare(messages) => messages,
    })
}

/// One `sender: text` line per message, the layout the feedback prompt
/// embeds and the annotation parser reads back.
pub fn render_transcript(messages: &[MessageRecord]) -> String {
    messages
        .iter()
        .map(|message| format!("{}: {}", message.sender, message.text))
        .collect::<Vec<_>>()
        .join("\n")
}
