use anyhow::Result;

use crate::args::{OutputFormat, StoreArgs};
use crate::context::HandlerContext;
use crate::output;

#[derive(serde::Serialize)]
struct StoreReport {
    data_path: String,
    source: String,
    event_count: usize,
    latest_timestamp: Option<i64>,
    load_warnings: Vec<String>,
}

pub fn handle(ctx: &HandlerContext, args: &StoreArgs, format: OutputFormat) -> Result<()> {
    let latest_timestamp = ctx.events.last().map(|e| e.timestamp);
    let report = StoreReport {
        data_path: ctx.data_path.display().to_string(),
        source: args.source.source.clone(),
        event_count: ctx.events.len(),
        latest_timestamp,
        load_warnings: ctx.warnings.clone(),
    };

    output::emit(format, &report, |r| {
        format!(
            "source '{}' under {}: {} event(s), latest_timestamp={}",
            r.source,
            r.data_path,
            r.event_count,
            r.latest_timestamp.map(|t| t.to_string()).unwrap_or_else(|| "<none>".to_string())
        )
    })
}
