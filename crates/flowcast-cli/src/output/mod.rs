//! Plain-text vs JSON rendering, selected by `--format`: a single helper
//! instead of a layered view-model/presenter/renderer stack, since this CLI
//! has no TUI surface to share a view-model with.

use anyhow::Result;
use serde::Serialize;

use crate::args::OutputFormat;

pub fn emit<T: Serialize>(format: OutputFormat, value: &T, plain: impl FnOnce(&T) -> String) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Plain => println!("{}", plain(value)),
    }
    Ok(())
}

pub fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
}
