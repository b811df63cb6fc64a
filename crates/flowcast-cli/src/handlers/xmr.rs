use anyhow::Result;
use chrono::Utc;
use flowcast_engine::{compute_xmr, is_delivered, subgroup_averages, three_way, AnalysisSession};

use crate::args::{OutputFormat, XmrArgs};
use crate::context::HandlerContext;
use crate::output;

/// Individuals + Moving Range over per-day cycle-time averages, plus a
/// Three-Way (monthly subgroup) drift read on the same series.
pub fn handle(ctx: &HandlerContext, args: &XmrArgs, format: OutputFormat) -> Result<()> {
    let now = Utc::now();
    let (window, window_warnings) = ctx.window(&args.window.from, &args.window.to, args.window.bucket, now)?;

    let session = AnalysisSession::new(&ctx.events, window, &ctx.mapping);
    let mut daily: Vec<(chrono::DateTime<Utc>, f64)> = session
        .get_delivered()
        .iter()
        .filter(|i| is_delivered(&ctx.mapping, i))
        .filter_map(|i| {
            let date = i.resolution_date?;
            let cycle_days = (date - i.created).num_seconds() as f64 / 86_400.0;
            Some((date, cycle_days))
        })
        .collect();
    daily.sort_by_key(|(d, _)| *d);

    let values: Vec<f64> = daily.iter().map(|(_, v)| *v).collect();
    let individuals = compute_xmr(&values);

    let monthly = subgroup_averages(&daily, &window, flowcast_types::Bucket::Month, now);
    let (subgroup, status) = three_way(&monthly);

    output::print_warnings(&window_warnings);
    output::print_warnings(&ctx.warnings);

    #[derive(serde::Serialize)]
    struct XmrReport {
        individuals: flowcast_types::XmRResult,
        monthly_subgroup: flowcast_types::XmRResult,
        process_status: flowcast_types::ProcessStatus,
    }
    let report = XmrReport {
        individuals,
        monthly_subgroup: subgroup,
        process_status: status,
    };

    output::emit(format, &report, |r| {
        format!(
            "cycle-time XmR: average={:.2} UNPL={:.2} LNPL={:.2} signals={}\nmonthly subgroup: average={:.2} process_status={:?} signals={}",
            r.individuals.average,
            r.individuals.unpl,
            r.individuals.lnpl,
            r.individuals.signals.len(),
            r.monthly_subgroup.average,
            r.process_status,
            r.monthly_subgroup.signals.len()
        )
    })
}
