use anyhow::Result;
use chrono::Utc;
use flowcast_engine::{
    cadence, calculate_inventory_age, cumulative_flow_diagram, flow_debt, is_delivered, pressure, status_persistence, tier_summary,
    yield_ratio, AnalysisSession,
};

use crate::args::{FlowMetricsArgs, OutputFormat};
use crate::context::HandlerContext;
use crate::output;

pub fn handle(ctx: &HandlerContext, args: &FlowMetricsArgs, format: OutputFormat) -> Result<()> {
    let now = Utc::now();
    let (window, window_warnings) = ctx.window(&args.window.from, &args.window.to, args.window.bucket, now)?;

    let session = AnalysisSession::new(&ctx.events, window, &ctx.mapping);
    let wip: Vec<_> = session.get_wip().into_iter().cloned().collect();
    let finished = session.get_delivered();
    let all_issues: Vec<_> = session.get_all_issues().into_iter().cloned().collect();

    let aging = calculate_inventory_age(&wip, now);
    let tiers = tier_summary(&wip, &ctx.mapping, now);
    let delivered_flags: Vec<bool> = finished.iter().map(|i| is_delivered(&ctx.mapping, i)).collect();
    let yield_value = yield_ratio(finished, &delivered_flags);
    let debt = flow_debt(&wip, args.sle_days, now);
    let cfd = cumulative_flow_diagram(&all_issues, &window, now);
    let cadence_stats = cadence(finished.iter().filter_map(|i| i.resolution_date).collect());
    let persistence = status_persistence(&all_issues);

    let days = window.day_count().max(1) as f64;
    let arrivals_per_day = all_issues.iter().filter(|i| i.created >= window.start && i.created < window.end).count() as f64 / days;
    let departures_per_day = finished.len() as f64 / days;
    let pressure_value = pressure(arrivals_per_day, departures_per_day);

    output::print_warnings(&window_warnings);
    output::print_warnings(&ctx.warnings);

    #[derive(serde::Serialize)]
    struct Report {
        aging: Vec<flowcast_engine::AgingEntry>,
        tier_summary: Vec<flowcast_engine::TierSummary>,
        yield_ratio: f64,
        flow_debt_days: f64,
        cfd: Vec<flowcast_engine::CfdPoint>,
        cadence: flowcast_engine::CadenceStats,
        status_persistence: Vec<flowcast_engine::StatusPersistenceEntry>,
        pressure: f64,
    }
    let report = Report {
        aging,
        tier_summary: tiers,
        yield_ratio: yield_value,
        flow_debt_days: debt,
        cfd,
        cadence: cadence_stats,
        status_persistence: persistence,
        pressure: pressure_value,
    };

    output::emit(format, &report, |r| {
        let mut lines = vec![format!(
            "yield={:.2} flow_debt={:.1}d pressure={:.2} cadence: mean={:.1}d stddev={:.1}d",
            r.yield_ratio, r.flow_debt_days, r.pressure, r.cadence.mean_interval_days, r.cadence.stddev_interval_days
        )];
        for tier in &r.tier_summary {
            lines.push(format!(
                "  tier={:?} count={} oldest={:.1}d p50={:.1}d p85={:.1}d",
                tier.tier, tier.count, tier.oldest_age_days, tier.p50_age_days, tier.p85_age_days
            ));
        }
        for entry in &r.status_persistence {
            lines.push(format!(
                "  persistence type={} status={} mean={:.1}d (n={})",
                entry.issue_type, entry.status, entry.mean_days, entry.count
            ));
        }
        lines.push(format!("{} CFD point(s) over the window", r.cfd.len()));
        lines.join("\n")
    })
}
