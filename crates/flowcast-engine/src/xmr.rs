use chrono::{DateTime, Datelike, Utc};
use flowcast_types::{AnalysisWindow, Bucket, ProcessStatus, Signal, SignalType, XmRResult};

/// Shewhart/Wheeler natural-process-limit scaling constant for individuals
/// charts (§4.8).
const NPL_SCALE: f64 = 2.66;
/// Run length that constitutes a "shift" signal.
const SHIFT_RUN_LENGTH: usize = 8;

/// Individuals + Moving Range control chart (§4.8).
pub fn xmr(values: &[f64]) -> XmRResult {
    let average = mean(values);
    let moving_range = moving_ranges(values);
    let average_moving_range = mean(&moving_range);
    let unpl = average + NPL_SCALE * average_moving_range;
    let lnpl = (average - NPL_SCALE * average_moving_range).max(0.0);

    let mut signals = outlier_signals(values, unpl, lnpl, None);
    signals.extend(shift_signals(values, average, None));
    signals.sort_by_key(|s| s.index);

    XmRResult {
        average,
        average_moving_range,
        unpl,
        lnpl,
        values: values.to_vec(),
        moving_range,
        signals,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn moving_ranges(values: &[f64]) -> Vec<f64> {
    if values.len() < 2 {
        return Vec::new();
    }
    values.windows(2).map(|w| (w[1] - w[0]).abs()).collect()
}

fn outlier_signals(values: &[f64], unpl: f64, lnpl: f64, key: Option<&str>) -> Vec<Signal> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > unpl || **v < lnpl)
        .map(|(i, v)| Signal {
            index: i,
            key: key.map(|k| k.to_string()),
            kind: SignalType::Outlier,
            description: format!("point {v} outside natural process limits [{lnpl:.1}, {unpl:.1}]"),
        })
        .collect()
}

/// A run of 8 consecutive points on the same side of the average, emitted at
/// the index where the 8th point accrues (§4.8).
fn shift_signals(values: &[f64], average: f64, key: Option<&str>) -> Vec<Signal> {
    let mut signals = Vec::new();
    let mut run_len = 0usize;
    let mut run_side: Option<bool> = None; // true = above average

    for (i, v) in values.iter().enumerate() {
        if (*v - average).abs() < f64::EPSILON {
            run_len = 0;
            run_side = None;
            continue;
        }
        let side = *v > average;
        if Some(side) == run_side {
            run_len += 1;
        } else {
            run_side = Some(side);
            run_len = 1;
        }
        if run_len == SHIFT_RUN_LENGTH {
            signals.push(Signal {
                index: i,
                key: key.map(|k| k.to_string()),
                kind: SignalType::Shift,
                description: format!(
                    "8 consecutive points {} the average",
                    if side { "above" } else { "below" }
                ),
            });
        }
    }
    signals
}

/// Build non-overlapping subgroup averages over `daily`, excluding the
/// partial trailing bucket (the "Tuesday Problem", §4.8).
pub fn subgroup_averages(daily: &[(DateTime<Utc>, f64)], window: &AnalysisWindow, bucket: Bucket, now: DateTime<Utc>) -> Vec<f64> {
    let (subgroup_window, _) = AnalysisWindow::new(window.start, window.end, bucket, None);
    let mut sums: Vec<(f64, u32)> = vec![(0.0, 0); subgroup_window.subdivide().len()];
    for (t, v) in daily {
        if let Some(idx) = subgroup_window.find_bucket_index(*t) {
            if idx < sums.len() {
                sums[idx].0 += v;
                sums[idx].1 += 1;
            }
        }
    }
    let buckets = subgroup_window.subdivide();
    sums.into_iter()
        .enumerate()
        .filter(|(i, (_, n))| *n > 0 && !subgroup_window.is_partial(buckets[*i], now))
        .map(|(_, (sum, n))| sum / n as f64)
        .collect()
}

/// Run XmR on subgroup averages and classify drift (§4.8).
pub fn three_way(subgroup_avgs: &[f64]) -> (XmRResult, ProcessStatus) {
    let result = xmr(subgroup_avgs);
    let status = if result.signals.iter().any(|s| s.kind == SignalType::Shift) {
        ProcessStatus::Migrating
    } else if result.signals.iter().any(|s| s.kind == SignalType::Outlier) {
        ProcessStatus::Volatile
    } else {
        ProcessStatus::Stable
    };
    (result, status)
}

/// One issue's active-WIP interval: entered `start`, left at `end` (`None` =
/// still active as of the reference time the caller reconstructed at).
#[derive(Debug, Clone)]
pub struct WipInterval {
    pub key: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

fn start_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc()
}

fn end_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive().and_hms_nano_opt(23, 59, 59, 999_999_999).unwrap().and_utc()
}

/// Day-1 Kanban rule (§4.8): an interval counts as WIP on day `D` if it
/// overlaps `D` and either survives past `EOD(D)` or both started and ended
/// within `D`.
fn counts_as_wip_on_day(start: DateTime<Utc>, end: Option<DateTime<Utc>>, day_start: DateTime<Utc>, day_end: DateTime<Utc>) -> bool {
    if start > day_end {
        return false;
    }
    match end {
        None => true,
        Some(e) => {
            if e < day_start {
                return false;
            }
            let survives_past_eod = e > day_end;
            let same_day = start.date_naive() == day_start.date_naive() && e.date_naive() == day_start.date_naive();
            survives_past_eod || same_day
        }
    }
}

/// Daily active-WIP population count across the window (§4.8).
pub fn wip_run_chart(intervals: &[WipInterval], window: &AnalysisWindow) -> Vec<(DateTime<Utc>, u32)> {
    let (day_window, _) = AnalysisWindow::new(window.start, window.end, Bucket::Day, None);
    day_window
        .subdivide()
        .into_iter()
        .map(|day_start| {
            let day_end = end_of_day(day_start);
            let count = intervals
                .iter()
                .filter(|i| counts_as_wip_on_day(i.start, i.end, day_start, day_end))
                .count() as u32;
            (day_start, count)
        })
        .collect()
}

/// Sample one value per ISO week (the week's last available day), run XmR on
/// those weekly samples, then project the resulting `UNPL`/`LNPL` back over
/// every daily point to flag daily `WipOutlier` signals (§4.8).
pub fn wip_stability(daily_run_chart: &[(DateTime<Utc>, u32)]) -> (XmRResult, Vec<Signal>) {
    let mut by_week: std::collections::BTreeMap<(i32, u32), (DateTime<Utc>, u32)> = std::collections::BTreeMap::new();
    for (day, count) in daily_run_chart {
        let iso = day.iso_week();
        let key = (iso.year(), iso.week());
        by_week.insert(key, (*day, *count)); // last write per week wins (iteration is chronological)
    }
    let weekly_values: Vec<f64> = by_week.values().map(|(_, c)| *c as f64).collect();
    let weekly_result = xmr(&weekly_values);

    let mut daily_signals = Vec::new();
    for (i, (day, count)) in daily_run_chart.iter().enumerate() {
        let v = *count as f64;
        if v > weekly_result.unpl || v < weekly_result.lnpl {
            daily_signals.push(Signal {
                index: i,
                key: Some(day.format("%Y-%m-%d").to_string()),
                kind: SignalType::WipOutlier,
                description: format!("WIP of {count} on {} outside weekly natural process limits", day.format("%Y-%m-%d")),
            });
        }
    }
    (weekly_result, daily_signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn xmr_matches_benchmark_values() {
        let values = vec![
            22433.0, 22612.0, 22660.0, 22380.0, 22545.0, 22903.0, 22843.0, 22595.0, 22078.0, 21942.0,
        ];
        let result = xmr(&values);
        assert!((result.average - 22_499.1).abs() < 1.0);
        assert!((result.average_moving_range - 220.77).abs() < 1.0);
        assert!((result.unpl - (result.average + 2.66 * result.average_moving_range)).abs() < 1e-6);
        assert_eq!(result.moving_range.len(), values.len() - 1);
    }

    #[test]
    fn outlier_signal_matches_index() {
        let mut values = vec![10.0; 20];
        values[5] = 10_000.0;
        let result = xmr(&values);
        assert!(result.signals.iter().any(|s| s.index == 5 && s.kind == SignalType::Outlier));
    }

    #[test]
    fn day1_rule_counts_same_day_start_and_end() {
        let day_start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let day_end = end_of_day(day_start);
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 17, 0, 0).unwrap();
        assert!(counts_as_wip_on_day(start, Some(end), day_start, day_end));
    }

    #[test]
    fn interval_ending_before_eod_without_same_day_start_does_not_count() {
        let day_start = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let day_end = end_of_day(day_start);
        let start = Utc.with_ymd_and_hms(2024, 4, 29, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap();
        // Started on a different day, ended mid-day-D without surviving past EOD(D).
        assert!(!counts_as_wip_on_day(start, Some(end), day_start, day_end));
    }
}
