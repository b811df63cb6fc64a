use anyhow::{bail, Result};
use chrono::Utc;
use flowcast_engine::{run_walk_forward, WalkForwardConfig, WalkForwardMode};

use crate::args::{OutputFormat, SimulateMode, WalkForwardArgs};
use crate::context::HandlerContext;
use crate::output;

pub fn handle(ctx: &HandlerContext, args: &WalkForwardArgs, format: OutputFormat) -> Result<()> {
    let mode = match args.mode {
        SimulateMode::Duration => {
            let Some(target_items) = args.target_items else {
                bail!("--target-items is required for duration-mode walk-forward");
            };
            WalkForwardMode::Duration { target_items }
        }
        SimulateMode::Scope => {
            let Some(horizon_days) = args.horizon_days else {
                bail!("--horizon-days is required for scope-mode walk-forward");
            };
            WalkForwardMode::Scope { horizon_days }
        }
    };

    let config = WalkForwardConfig {
        mode,
        lookback_days: args.lookback_days,
        step_days: args.step_days,
        now: Utc::now(),
        trials: args.trials,
        base_seed: args.seed,
    };
    let result = run_walk_forward(&ctx.events, &ctx.mapping, &config);

    output::print_warnings(&ctx.warnings);
    output::print_warnings(&result.warnings);
    output::emit(format, &result, |r| {
        format!(
            "accuracy={:.2} over {} checkpoint(s), drift_date={}",
            r.accuracy_score,
            r.checkpoints.len(),
            r.drift_date.map(|d| d.to_rfc3339()).unwrap_or_else(|| "<none>".to_string())
        )
    })
}
