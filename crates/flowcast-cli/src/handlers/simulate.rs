use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::Utc;
use flowcast_engine::{build_histogram, is_delivered, simulate, AnalysisSession, HistogramInputs, SimulationConfig, SimulationTask};

use crate::args::{OutputFormat, SimulateArgs, SimulateMode};
use crate::context::HandlerContext;
use crate::output;

pub fn handle(ctx: &HandlerContext, args: &SimulateArgs, format: OutputFormat) -> Result<()> {
    let now = Utc::now();
    let (window, window_warnings) = ctx.window(&args.window.from, &args.window.to, args.window.bucket, now)?;

    let session = AnalysisSession::new(&ctx.events, window, &ctx.mapping);
    let finished = session.get_delivered();
    let delivered: Vec<_> = finished.iter().filter(|i| is_delivered(&ctx.mapping, i)).cloned().collect();
    let dropped_by_resolution = finished.len() - delivered.len();

    let type_filter = args.r#type.as_ref().map(|t| std::collections::HashSet::from([t.clone()]));
    let histogram = build_histogram(&HistogramInputs {
        delivered: &delivered,
        dropped_by_resolution,
        window,
        type_filter: type_filter.as_ref(),
    });

    let task = match args.mode {
        SimulateMode::Duration => {
            let Some(target_items) = args.target_items else {
                bail!("--target-items is required for duration mode");
            };
            let mut targets = BTreeMap::new();
            targets.insert(args.r#type.clone().unwrap_or_else(|| "*".to_string()), target_items);
            SimulationTask::Duration { targets }
        }
        SimulateMode::Scope => {
            let Some(horizon_days) = args.horizon_days else {
                bail!("--horizon-days is required for scope mode");
            };
            SimulationTask::Scope {
                filter: type_filter,
                days: horizon_days,
            }
        }
    };

    let config = SimulationConfig {
        expansion_enabled: args.expansion,
        trials: args.trials,
        base_seed: args.seed,
        wip_context: None,
    };
    let result = simulate(&histogram, &task, &config);

    output::print_warnings(&window_warnings);
    output::print_warnings(&ctx.warnings);
    output::print_warnings(&result.warnings);
    output::emit(format, &result, |r| {
        format!(
            "mode={:?} p50={:.1} p85={:.1} p98={:.1} predictability={:?}\nlabels: aggressive={:.1} coin_toss={:.1} almost_certain={:.1}",
            r.mode, r.percentiles.p50, r.percentiles.p85, r.percentiles.p98, r.predictability,
            r.labels.aggressive, r.labels.coin_toss, r.labels.almost_certain
        )
    })
}
