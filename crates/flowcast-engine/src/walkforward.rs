use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use flowcast_types::{AnalysisWindow, Bucket, DomainIssue, IssueEvent, SignalType, Tier, WorkflowMapping};
use serde::Serialize;

use crate::histogram::{build_histogram, HistogramInputs};
use crate::reconstruct::{reconstruct_all, ReconstructOptions};
use crate::session::is_delivered;
use crate::simulation::{simulate, SimulationConfig, SimulationTask};
use crate::xmr::xmr;

const SIX_MONTHS_DAYS: i64 = 182;
const ACCURACY_WARNING_THRESHOLD: f64 = 0.7;
const ACCURACY_WARNING_MIN_CHECKPOINTS: usize = 3;

pub enum WalkForwardMode {
    Scope { horizon_days: i64 },
    Duration { target_items: u32 },
}

pub struct WalkForwardConfig {
    pub mode: WalkForwardMode,
    pub lookback_days: i64,
    pub step_days: i64,
    pub now: DateTime<Utc>,
    pub trials: usize,
    pub base_seed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Checkpoint {
    pub date: DateTime<Utc>,
    pub actual: f64,
    pub cone_low: f64,
    pub cone_high: f64,
    pub within_cone: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WalkForwardResult {
    pub checkpoints: Vec<Checkpoint>,
    pub accuracy_score: f64,
    pub drift_date: Option<DateTime<Utc>>,
    pub warnings: Vec<String>,
}

fn is_finished_closure<'a>(mapping: &'a WorkflowMapping) -> impl Fn(Option<&str>, &str) -> bool + 'a {
    move |id, name| {
        flowcast_core::lookup_status(mapping, id, Some(name))
            .map(|m| m.tier == Tier::Finished)
            .unwrap_or(false)
    }
}

/// Detect a cycle-time drift boundary: monthly subgroup averages of cycle
/// time, run through Three-Way XmR; the first `Shift` signal's subgroup
/// start becomes `driftDate`, which caps how far back checkpoints look
/// (§4.9 step 1).
fn detect_drift_date(delivered: &[DomainIssue]) -> Option<DateTime<Utc>> {
    let mut pairs: Vec<(DateTime<Utc>, f64)> = delivered
        .iter()
        .filter_map(|i| {
            let date = i.resolution_date?;
            let cycle_days = (date - i.created).num_seconds() as f64 / 86_400.0;
            Some((date, cycle_days))
        })
        .collect();
    if pairs.len() < 16 {
        return None;
    }
    pairs.sort_by_key(|(d, _)| *d);

    let start = pairs.first().unwrap().0;
    let end = pairs.last().unwrap().0;
    let (window, _) = AnalysisWindow::new(start, end, Bucket::Month, None);
    let buckets = window.subdivide();

    let mut sums = vec![(0.0, 0u32); buckets.len()];
    for (d, v) in &pairs {
        if let Some(idx) = window.find_bucket_index(*d) {
            if idx < sums.len() {
                sums[idx].0 += v;
                sums[idx].1 += 1;
            }
        }
    }

    let mut indices = Vec::new();
    let mut values = Vec::new();
    for (i, (sum, n)) in sums.iter().enumerate() {
        if *n > 0 {
            indices.push(i);
            values.push(sum / *n as f64);
        }
    }

    let result = xmr(&values);
    let shift = result.signals.iter().find(|s| s.kind == SignalType::Shift)?;
    let bucket_index = *indices.get(shift.index)?;
    Some(buckets[bucket_index])
}

fn checkpoint_dates(now: DateTime<Utc>, lookback_days: i64, step_days: i64, drift_date: Option<DateTime<Utc>>) -> Vec<DateTime<Utc>> {
    let floor = match drift_date {
        Some(d) => d.max(now - Duration::days(lookback_days)),
        None => now - Duration::days(lookback_days),
    };
    let mut dates = Vec::new();
    let mut step = 1;
    loop {
        let candidate = now - Duration::days(step_days * step);
        if candidate < floor {
            break;
        }
        dates.push(candidate);
        step += 1;
    }
    dates
}

/// Backtest the forecasting engine by replaying history (§4.9): at each
/// checkpoint, forecast from what was knowable at that date, then check
/// whether what actually happened afterward fell inside the forecast cone.
pub fn run_walk_forward(events: &[IssueEvent], mapping: &WorkflowMapping, config: &WalkForwardConfig) -> WalkForwardResult {
    let is_finished = is_finished_closure(mapping);
    let now_options = ReconstructOptions {
        reference_time: config.now,
        is_finished_status: Some(&is_finished),
    };
    let all_issues_now = reconstruct_all(events, &now_options);
    let delivered_now: Vec<DomainIssue> = all_issues_now.iter().filter(|i| is_delivered(mapping, i)).cloned().collect();

    let drift_date = detect_drift_date(&delivered_now);
    let dates = checkpoint_dates(config.now, config.lookback_days, config.step_days, drift_date);

    let mut checkpoints = Vec::new();
    let mut warnings = Vec::new();

    for (i, checkpoint_date) in dates.iter().enumerate() {
        let sliced: Vec<IssueEvent> = events
            .iter()
            .filter(|e| e.timestamp <= checkpoint_date.timestamp_micros())
            .cloned()
            .collect();
        let options = ReconstructOptions {
            reference_time: *checkpoint_date,
            is_finished_status: Some(&is_finished),
        };
        let issues_at_checkpoint = reconstruct_all(&sliced, &options);
        let delivered_at_checkpoint: Vec<DomainIssue> = issues_at_checkpoint
            .iter()
            .filter(|i| is_delivered(mapping, i))
            .cloned()
            .collect();

        let (window, _) = AnalysisWindow::new(*checkpoint_date - Duration::days(SIX_MONTHS_DAYS), *checkpoint_date, Bucket::Day, None);
        let histogram = build_histogram(&HistogramInputs {
            delivered: &delivered_at_checkpoint,
            dropped_by_resolution: 0,
            window,
            type_filter: None,
        });

        let sim_config = SimulationConfig {
            trials: config.trials,
            base_seed: config.base_seed ^ i as u64,
            ..Default::default()
        };

        match &config.mode {
            WalkForwardMode::Scope { horizon_days } => {
                let task = SimulationTask::Scope { filter: None, days: *horizon_days as u32 };
                let result = simulate(&histogram, &task, &sim_config);
                let horizon_end = *checkpoint_date + Duration::days(*horizon_days);
                let actual = delivered_now
                    .iter()
                    .filter(|i| i.resolution_date.map(|d| d > *checkpoint_date && d <= horizon_end).unwrap_or(false))
                    .count() as f64;
                let low = result.labels.almost_certain.min(result.labels.aggressive);
                let high = result.labels.almost_certain.max(result.labels.aggressive);
                checkpoints.push(Checkpoint {
                    date: *checkpoint_date,
                    actual,
                    cone_low: low,
                    cone_high: high,
                    within_cone: actual >= low && actual <= high,
                });
            }
            WalkForwardMode::Duration { target_items } => {
                let mut future: Vec<DateTime<Utc>> = delivered_now
                    .iter()
                    .filter_map(|i| i.resolution_date)
                    .filter(|d| *d > *checkpoint_date)
                    .collect();
                future.sort();
                if future.len() < *target_items as usize || *target_items == 0 {
                    continue; // InsufficientData (§7): skip checkpoint silently
                }
                let nth = future[*target_items as usize - 1];
                let actual = (nth - *checkpoint_date).num_seconds() as f64 / 86_400.0;

                let mut targets = BTreeMap::new();
                targets.insert("*".to_string(), *target_items);
                let task = SimulationTask::Duration { targets };
                let result = simulate(&histogram, &task, &sim_config);
                let low = result.labels.aggressive.min(result.labels.almost_certain);
                let high = result.labels.aggressive.max(result.labels.almost_certain);
                checkpoints.push(Checkpoint {
                    date: *checkpoint_date,
                    actual,
                    cone_low: low,
                    cone_high: high,
                    within_cone: actual >= low && actual <= high,
                });
            }
        }
    }

    let total = checkpoints.len();
    let hits = checkpoints.iter().filter(|c| c.within_cone).count();
    let accuracy_score = if total > 0 { hits as f64 / total as f64 } else { 0.0 };
    if accuracy_score < ACCURACY_WARNING_THRESHOLD && total > ACCURACY_WARNING_MIN_CHECKPOINTS {
        warnings.push(format!("walk-forward accuracy {accuracy_score:.2} is below the 0.70 confidence floor over {total} checkpoints"));
    }

    WalkForwardResult { checkpoints, accuracy_score, drift_date, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flowcast_types::EventType;

    fn event(key: &str, event_type: EventType, to: Option<&str>, resolution: Option<&str>, day: i64) -> IssueEvent {
        IssueEvent {
            issue_key: key.to_string(),
            issue_type: "Story".to_string(),
            event_type,
            from_status: None,
            from_status_id: None,
            to_status: to.map(|s| s.to_string()),
            to_status_id: None,
            resolution: resolution.map(|s| s.to_string()),
            flagged: None,
            is_healed: false,
            timestamp: day * 86_400 * 1_000_000,
        }
    }

    #[test]
    fn steady_one_per_day_delivery_scores_high_accuracy() {
        let mut events = Vec::new();
        for day in 0..240 {
            let key = format!("P-{day}");
            events.push(event(&key, EventType::Created, Some("Backlog"), None, day));
            events.push(event(&key, EventType::Change, Some("Done"), Some("Fixed"), day + 1));
        }
        let mut mapping = WorkflowMapping::default();
        mapping.insert(
            None,
            "Done",
            flowcast_types::StatusMetadata {
                tier: Tier::Finished,
                role: flowcast_types::Role::Terminal,
                outcome: flowcast_types::Outcome::Delivered,
                name: "Done".to_string(),
            },
        );

        let now = Utc.timestamp_opt(0, 0).unwrap() + Duration::days(241);
        let config = WalkForwardConfig {
            mode: WalkForwardMode::Scope { horizon_days: 10 },
            lookback_days: 200,
            step_days: 20,
            now,
            trials: 300,
            base_seed: 5,
        };
        let result = run_walk_forward(&events, &mapping, &config);
        assert!(!result.checkpoints.is_empty());
        assert!(result.accuracy_score >= 0.5, "accuracy={}", result.accuracy_score);
    }
}
