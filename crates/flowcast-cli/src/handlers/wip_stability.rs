use anyhow::Result;
use chrono::Utc;
use flowcast_engine::{wip_run_chart, wip_stability, AnalysisSession};
use flowcast_types::Tier;

use crate::args::{OutputFormat, WipStabilityArgs};
use crate::context::HandlerContext;
use crate::output;

/// Reconstruct each issue's downstream-WIP interval (entered the commitment
/// point, left at resolution or is still active) and run the weekly-sampled
/// stability check over the resulting daily run chart (§4.8).
pub fn handle(ctx: &HandlerContext, args: &WipStabilityArgs, format: OutputFormat) -> Result<()> {
    let now = Utc::now();
    let (window, window_warnings) = ctx.window(&args.window.from, &args.window.to, args.window.bucket, now)?;

    let session = AnalysisSession::new(&ctx.events, window, &ctx.mapping);
    let intervals: Vec<flowcast_engine::WipInterval> = session
        .get_all_issues()
        .into_iter()
        .filter_map(|issue| {
            let entered = issue.transitions.iter().find(|t| {
                flowcast_core::lookup_status(&ctx.mapping, t.to_status_id.as_deref(), Some(&t.to_status))
                    .map(|m| m.tier == Tier::Downstream)
                    .unwrap_or(false)
            })?;
            Some(flowcast_engine::WipInterval {
                key: issue.key.clone(),
                start: entered.timestamp,
                end: issue.resolution_date,
            })
        })
        .collect();

    let run_chart = wip_run_chart(&intervals, &window);
    let (weekly, daily_signals) = wip_stability(&run_chart);

    output::print_warnings(&window_warnings);
    output::print_warnings(&ctx.warnings);

    #[derive(serde::Serialize)]
    struct Report {
        run_chart: Vec<(chrono::DateTime<Utc>, u32)>,
        weekly: flowcast_types::XmRResult,
        daily_signals: Vec<flowcast_types::Signal>,
    }
    let report = Report { run_chart, weekly, daily_signals };

    output::emit(format, &report, |r| {
        format!(
            "WIP run chart: {} day(s), weekly average={:.1} UNPL={:.1} LNPL={:.1}, {} daily outlier signal(s)",
            r.run_chart.len(),
            r.weekly.average,
            r.weekly.unpl,
            r.weekly.lnpl,
            r.daily_signals.len()
        )
    })
}
