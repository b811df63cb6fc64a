use std::fmt;

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Plain => write!(f, "plain"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Every leaf command reads the same source: an opaque source ID identifying
/// which `<id>.jsonl` / `<id>_workflow.json` pair under the data directory to load.
#[derive(clap::Args)]
pub struct SourceArgs {
    /// Source ID (matches `<source>.jsonl` and `<source>_workflow.json` under --data-path).
    pub source: String,
}

/// Shared analysis-window flags: bounds default to the full event history.
#[derive(clap::Args)]
pub struct WindowArgs {
    /// Window start (RFC 3339). Defaults to the earliest event's day.
    #[arg(long)]
    pub from: Option<String>,
    /// Window end (RFC 3339). Defaults to now.
    #[arg(long)]
    pub to: Option<String>,
    #[arg(long, value_enum, default_value = "day")]
    pub bucket: BucketArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum BucketArg {
    Day,
    Week,
    Month,
}

impl From<BucketArg> for flowcast_types::Bucket {
    fn from(b: BucketArg) -> Self {
        match b {
            BucketArg::Day => flowcast_types::Bucket::Day,
            BucketArg::Week => flowcast_types::Bucket::Week,
            BucketArg::Month => flowcast_types::Bucket::Month,
        }
    }
}
