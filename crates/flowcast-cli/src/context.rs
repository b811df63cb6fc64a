//! Per-invocation context every handler needs: the resolved data directory,
//! the loaded event log, and the companion workflow mapping. Built once in
//! `run()`, threaded into each handler instead of re-derived per leaf.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use flowcast_store::{Config, EventStore};
use flowcast_types::{AnalysisWindow, Bucket, IssueEvent, WorkflowMapping};

use crate::args::BucketArg;

pub struct HandlerContext {
    pub data_path: PathBuf,
    pub events: Vec<IssueEvent>,
    pub mapping: WorkflowMapping,
    pub warnings: Vec<String>,
}

impl HandlerContext {
    pub fn load(data_path_override: Option<&str>, source: &str) -> Result<Self> {
        let config_path = flowcast_core::resolve_data_path(data_path_override)
            .context("resolving data path")?
            .join("config.toml");
        let config = Config::load_from(&config_path).context("loading config.toml")?;
        let data_path = match data_path_override {
            Some(p) => expand_tilde(p),
            None => config.resolve_data_path().context("resolving data path")?,
        };

        let store = EventStore::new();
        let report = store
            .load(&data_path, source)
            .with_context(|| format!("loading events for source '{source}'"))?;
        let events = store.get_events_in_range(source, 0, 0);

        let mapping = flowcast_store::load_workflow_mapping(&data_path, source)
            .with_context(|| format!("loading workflow mapping for source '{source}'"))?;

        Ok(Self {
            data_path,
            events,
            mapping,
            warnings: report.warnings,
        })
    }

    /// Build the analysis window: explicit `--from`/`--to` flags, else the
    /// full span of the loaded event history.
    pub fn window(&self, from: &Option<String>, to: &Option<String>, bucket: BucketArg, now: DateTime<Utc>) -> Result<(AnalysisWindow, Vec<String>)> {
        let start = match from {
            Some(s) => parse_timestamp(s)?,
            None => self
                .events
                .iter()
                .map(|e| micros_to_datetime(e.timestamp))
                .min()
                .unwrap_or(now),
        };
        let end = match to {
            Some(s) => parse_timestamp(s)?,
            None => now,
        };
        Ok(AnalysisWindow::new(start, end, Bucket::from(bucket), None))
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("'{raw}' is not a valid RFC 3339 timestamp"))
}

fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(micros).single().unwrap_or_else(Utc::now)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
