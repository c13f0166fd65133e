use anyhow::Result;
use tracing::info;

use crate::cli::SummaryArgs;
use crate::summary::SummaryParser;
use crate::util::{read_input, write_json_stdout};

pub fn run(args: SummaryArgs) -> Result<()> {
    let parser = SummaryParser::new()?;
    let response = read_input(&args.input)?;

    info!(input = %args.input.display(), chars = response.len(), "parsing session summary");

    let summary = parser.parse(&response);
    write_json_stdout(&summary, args.compact)
}
