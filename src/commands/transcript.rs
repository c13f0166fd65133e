use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::TranscriptArgs;
use crate::transcript::{parse_messages_json, render_transcript};
use crate::util::read_input;

pub fn run(args: TranscriptArgs) -> Result<()> {
    let raw = read_input(&args.input)?;
    let messages = parse_messages_json(&raw)
        .with_context(|| format!("invalid messages in {}", args.input.display()))?;

    info!(messages = messages.len(), "rendering transcript");

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "{}", render_transcript(&messages))?;
    output.flush()?;
    Ok(())
}
