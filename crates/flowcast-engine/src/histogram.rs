use std::collections::{HashMap, HashSet};

use flowcast_types::{AnalysisWindow, DomainIssue, Histogram, HistogramMeta};

use crate::stats::{mean_u32, pearson_correlation, percentile_u32};

/// Minimum daily-sample volume for a type to be considered for stratified
/// simulation (§4.6).
const ELIGIBILITY_MIN_VOLUME: usize = 15;
const ELIGIBILITY_P85_DELTA: f64 = 0.15;
const DEPENDENCY_CORRELATION_THRESHOLD: f64 = -0.6;

pub struct HistogramInputs<'a> {
    /// Issues already classified as delivered (any date) — see
    /// `AnalysisSession::is_delivered`.
    pub delivered: &'a [DomainIssue],
    /// Resolved items that did not classify as delivered (§7 `DataSourceError`
    /// accounting, not a hard error).
    pub dropped_by_resolution: usize,
    pub window: AnalysisWindow,
    pub type_filter: Option<&'a HashSet<String>>,
}

/// Build the per-day throughput histogram and its stratification/modelling
/// metadata (§4.6).
pub fn build_histogram(inputs: &HistogramInputs) -> Histogram {
    let days = inputs.window.day_count().max(1) as usize;
    let mut counts = vec![0u32; days];
    let mut stratified_counts: HashMap<String, Vec<u32>> = HashMap::new();
    let mut total_by_type: HashMap<String, u32> = HashMap::new();
    let mut dropped_by_window = 0usize;

    for issue in inputs.delivered {
        if let Some(filter) = inputs.type_filter {
            if !filter.contains(&issue.issue_type) {
                continue;
            }
        }
        let Some(date) = issue.resolution_date else { continue };
        if date < inputs.window.start || date > inputs.window.end {
            dropped_by_window += 1;
            continue;
        }
        let offset = (date.date_naive() - inputs.window.start.date_naive()).num_days();
        let Ok(index) = usize::try_from(offset) else { continue };
        let index = index.min(days - 1);

        counts[index] += 1;
        stratified_counts
            .entry(issue.issue_type.clone())
            .or_insert_with(|| vec![0u32; days])[index] += 1;
        *total_by_type.entry(issue.issue_type.clone()).or_insert(0) += 1;
    }

    let total_delivered: u32 = counts.iter().sum();
    let type_distribution = if total_delivered > 0 {
        total_by_type
            .iter()
            .map(|(t, n)| (t.clone(), *n as f64 / total_delivered as f64))
            .collect()
    } else {
        HashMap::new()
    };

    let throughput_overall = mean_u32(&counts);
    let recent_n = days.min(30);
    let throughput_recent = mean_u32(&counts[days - recent_n..]);

    let pool_p85 = percentile_u32(&counts, 0.85);
    let mut eligible_types = HashMap::new();
    let mut fat_tail_by_type = HashMap::new();
    for (t, series) in &stratified_counts {
        let volume = *total_by_type.get(t).unwrap_or(&0) as usize;
        let type_p85 = percentile_u32(series, 0.85);
        let eligible = volume >= ELIGIBILITY_MIN_VOLUME
            && pool_p85 > 0.0
            && ((type_p85 - pool_p85).abs() / pool_p85) >= ELIGIBILITY_P85_DELTA;
        eligible_types.insert(t.clone(), eligible);

        let p50 = percentile_u32(series, 0.50);
        let p98 = percentile_u32(series, 0.98);
        let fat_tail = if p50 == 0.0 {
            if p98 > 0.0 {
                10.0
            } else {
                0.0
            }
        } else {
            p98 / p50
        };
        fat_tail_by_type.insert(t.clone(), fat_tail);
    }

    let dependencies = detect_dependencies(&stratified_counts, &total_by_type);

    let modeling_insight = build_insight(total_delivered, &eligible_types, &dependencies);

    Histogram {
        counts,
        stratified_counts,
        meta: HistogramMeta {
            type_distribution,
            throughput_overall,
            throughput_recent,
            eligible_types,
            dependencies,
            fat_tail_by_type,
            dropped_by_resolution: inputs.dropped_by_resolution,
            dropped_by_window,
            modeling_insight,
        },
    }
}

/// Pairwise Pearson correlation across stratified daily series; any pair
/// below `-0.6` is registered as a "tax" relation, the higher-throughput
/// type named as the taxer (§4.6).
fn detect_dependencies(
    stratified_counts: &HashMap<String, Vec<u32>>,
    total_by_type: &HashMap<String, u32>,
) -> Vec<(String, String)> {
    let mut types: Vec<&String> = stratified_counts.keys().collect();
    types.sort();

    let mut dependencies = Vec::new();
    for i in 0..types.len() {
        for j in (i + 1)..types.len() {
            let a = types[i];
            let b = types[j];
            let series_a: Vec<f64> = stratified_counts[a].iter().map(|v| *v as f64).collect();
            let series_b: Vec<f64> = stratified_counts[b].iter().map(|v| *v as f64).collect();
            let corr = pearson_correlation(&series_a, &series_b);
            if corr < DEPENDENCY_CORRELATION_THRESHOLD {
                let (taxer, taxed) = if total_by_type.get(a).unwrap_or(&0) >= total_by_type.get(b).unwrap_or(&0) {
                    (a.clone(), b.clone())
                } else {
                    (b.clone(), a.clone())
                };
                dependencies.push((taxer, taxed));
            }
        }
    }
    dependencies
}

fn build_insight(total_delivered: u32, eligible_types: &HashMap<String, bool>, dependencies: &[(String, String)]) -> String {
    if total_delivered == 0 {
        return "no items delivered in this window".to_string();
    }
    let mut parts = Vec::new();
    let eligible_count = eligible_types.values().filter(|v| **v).count();
    if eligible_count > 0 {
        parts.push(format!("{eligible_count} type(s) eligible for stratified simulation"));
    }
    for (taxer, taxed) in dependencies {
        parts.push(format!("{taxer} appears to tax {taxed}'s throughput"));
    }
    if parts.is_empty() {
        "delivery pattern is pooled, no type-level stratification signal".to_string()
    } else {
        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use flowcast_types::Bucket;

    fn issue(issue_type: &str, day_offset: i64, start: chrono::DateTime<Utc>) -> DomainIssue {
        DomainIssue {
            key: "P-1".to_string(),
            issue_type: issue_type.to_string(),
            status: "Done".to_string(),
            status_id: None,
            resolution: Some("Fixed".to_string()),
            resolution_date: Some(start + Duration::days(day_offset)),
            created: start,
            updated: start + Duration::days(day_offset),
            birth_status: None,
            birth_status_id: None,
            transitions: vec![],
            status_residency: Default::default(),
            blocked_residency: Default::default(),
            flagged: false,
            is_moved: false,
            has_synthetic_birth: false,
            is_subtask: false,
            project_key: None,
        }
    }

    #[test]
    fn total_counts_equal_delivered_in_window() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let (window, _) = AnalysisWindow::new(start, start + Duration::days(9), Bucket::Day, None);
        let delivered = vec![issue("Story", 0, start), issue("Story", 3, start), issue("Bug", 3, start)];
        let histogram = build_histogram(&HistogramInputs {
            delivered: &delivered,
            dropped_by_resolution: 0,
            window,
            type_filter: None,
        });
        assert_eq!(histogram.total(), 3);
        let stratified_total: u32 = histogram.stratified_counts.values().flatten().sum();
        assert_eq!(stratified_total, histogram.total());
    }

    #[test]
    fn type_distribution_sums_to_one_when_something_delivered() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let (window, _) = AnalysisWindow::new(start, start + Duration::days(9), Bucket::Day, None);
        let delivered = vec![issue("Story", 0, start), issue("Bug", 1, start)];
        let histogram = build_histogram(&HistogramInputs {
            delivered: &delivered,
            dropped_by_resolution: 0,
            window,
            type_filter: None,
        });
        let sum: f64 = histogram.meta.type_distribution.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
