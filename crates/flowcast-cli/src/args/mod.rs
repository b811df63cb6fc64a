// One verb per analytics operation the engine exposes, a shared `--data-path`
// and `--format` above the subcommand rather than repeated per-leaf.

mod common;

pub use common::{BucketArg, OutputFormat, SourceArgs, WindowArgs};

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "flowcast")]
#[command(about = "Probabilistic delivery forecasting and flow-diagnostic analytics for ticket-tracker event logs", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Event-log / workflow-mapping data directory.
    /// Defaults to `DATA_PATH` env, then the OS data dir, then `~/.flowcast`.
    #[arg(long, global = true)]
    pub data_path: Option<String>,

    #[arg(long, default_value = "plain", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Monte-Carlo forecast: how long to finish N items, or how many items ship in D days.
    Simulate(SimulateArgs),
    /// Bootstrap a workflow mapping (tier/role/outcome per status) purely from event history.
    Discover(DiscoverArgs),
    /// Individuals + Moving Range control chart over cycle times or a raw series.
    Xmr(XmrArgs),
    /// WIP run chart and weekly-sampled stability signals.
    WipStability(WipStabilityArgs),
    /// Aging, tier summary, yield, flow debt, CFD, and cadence over current WIP.
    FlowMetrics(FlowMetricsArgs),
    /// Backtest the forecasting engine by replaying history from past checkpoints.
    WalkForward(WalkForwardArgs),
    /// Event store inspection: per-source counts and latest timestamp.
    Store(StoreArgs),
}

#[derive(clap::Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub window: WindowArgs,

    #[arg(long, value_enum)]
    pub mode: SimulateMode,
    /// Duration mode: how many items to target (pooled across all types unless --type is given).
    #[arg(long)]
    pub target_items: Option<u32>,
    /// Duration mode: restrict the target to a single issue type.
    #[arg(long)]
    pub r#type: Option<String>,
    /// Scope mode: forecast horizon in days.
    #[arg(long)]
    pub horizon_days: Option<u32>,

    #[arg(long, default_value_t = 10_000)]
    pub trials: usize,
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Treat the backlog as an open system (types can draw from outside the target set).
    #[arg(long)]
    pub expansion: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, PartialEq, Eq)]
pub enum SimulateMode {
    Duration,
    Scope,
}

#[derive(clap::Args)]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(clap::Args)]
pub struct XmrArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub window: WindowArgs,
}

#[derive(clap::Args)]
pub struct WipStabilityArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub window: WindowArgs,
}

#[derive(clap::Args)]
pub struct FlowMetricsArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub window: WindowArgs,
    /// Service-level expectation, in days, used for the flow-debt calculation.
    #[arg(long, default_value_t = 10.0)]
    pub sle_days: f64,
}

#[derive(clap::Args)]
pub struct WalkForwardArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(long, value_enum)]
    pub mode: SimulateMode,
    #[arg(long)]
    pub target_items: Option<u32>,
    #[arg(long)]
    pub horizon_days: Option<i64>,

    #[arg(long, default_value_t = 365)]
    pub lookback_days: i64,
    #[arg(long, default_value_t = 14)]
    pub step_days: i64,
    #[arg(long, default_value_t = 2_000)]
    pub trials: usize,
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

#[derive(clap::Args)]
pub struct StoreArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}
