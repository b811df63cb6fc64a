use anyhow::Result;
use flowcast_engine::discover;

use crate::args::{DiscoverArgs, OutputFormat};
use crate::context::HandlerContext;
use crate::output;

pub fn handle(ctx: &HandlerContext, _args: &DiscoverArgs, format: OutputFormat) -> Result<()> {
    let result = discover(&ctx.events);
    output::print_warnings(&ctx.warnings);
    output::emit(format, &result, |r| {
        let mut lines = Vec::new();
        lines.push(format!("discovered {} status(es), commitment point: {}", r.statuses.len(), r.commitment_point.as_deref().unwrap_or("<none>")));
        for status in &r.statuses {
            lines.push(format!(
                "  {:<20} tier={:?} role={:?} outcome={:?} entries={} in={} out={}",
                status.name, status.tier, status.role, status.outcome, status.entry_count, status.into, status.out
            ));
        }
        lines.push(format!("sample: {} issue(s) selected for deep inspection", r.sample_issue_keys.len()));
        lines.join("\n")
    })
}
