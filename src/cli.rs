use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::annotation::{DEFAULT_CRITIQUE_KEYWORD, DEFAULT_WRAPPER_MARKER};

#[derive(Parser, Debug)]
#[command(
    name = "convo-feedback",
    version,
    about = "Turns conversation-training feedback responses into annotated transcripts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Annotate(AnnotateArgs),
    Summary(SummaryArgs),
    Transcript(TranscriptArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Annotate(_) => "annotate",
            Self::Summary(_) => "summary",
            Self::Transcript(_) => "transcript",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AnnotateArgs {
    /// Raw feedback response; `-` reads stdin.
    #[arg(long, default_value = "-")]
    pub input: PathBuf,

    /// Write the annotated transcript here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_WRAPPER_MARKER)]
    pub wrapper_marker: String,

    #[arg(long, default_value = DEFAULT_CRITIQUE_KEYWORD)]
    pub critique_keyword: String,

    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SummaryArgs {
    #[arg(long, default_value = "-")]
    pub input: PathBuf,

    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TranscriptArgs {
    /// Messages json, wrapped in `{"messages": [...]}` or a bare array.
    #[arg(long, default_value = "-")]
    pub input: PathBuf,
}
