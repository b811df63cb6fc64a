//! Flow-diagnostic metrics fed by the session/projection layer:
//! inventory aging, tier summaries, yield, flow debt, a simplified
//! cumulative-flow diagram, delivery cadence, arrival pressure, and
//! type-stratified status persistence (§4.9 "Flow Metrics" component, not
//! detailed further in the module's own section — grounded on standard
//! Kanban flow-metrics practice and built in the same value-type-method
//! style as `AnalysisWindow`/`DomainIssue`).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use flowcast_types::{AnalysisWindow, DomainIssue, Tier, WorkflowMapping};
use serde::Serialize;

use crate::stats::{mean, percentile};

#[derive(Debug, Clone, Serialize)]
pub struct AgingEntry {
    pub key: String,
    pub status: String,
    pub age_days: f64,
}

fn entered_current_status(issue: &DomainIssue) -> DateTime<Utc> {
    issue.transitions.last().map(|t| t.timestamp).unwrap_or(issue.created)
}

/// Age (days resident in the current status) for every WIP item, as of
/// `reference_time`. Reads `wip` only — never mutates the caller's slice
/// (§8 invariant 10).
pub fn calculate_inventory_age(wip: &[DomainIssue], reference_time: DateTime<Utc>) -> Vec<AgingEntry> {
    wip.iter()
        .map(|issue| {
            let entered = entered_current_status(issue);
            let age_days = (reference_time - entered).num_seconds() as f64 / 86_400.0;
            AgingEntry {
                key: issue.key.clone(),
                status: issue.status.clone(),
                age_days: age_days.max(0.0),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct TierSummary {
    pub tier: Tier,
    pub count: u32,
    pub oldest_age_days: f64,
    pub p50_age_days: f64,
    pub p85_age_days: f64,
}

/// Per-tier WIP aging rollup, grouping `wip` by current-status tier.
pub fn tier_summary(wip: &[DomainIssue], mapping: &WorkflowMapping, reference_time: DateTime<Utc>) -> Vec<TierSummary> {
    let aging = calculate_inventory_age(wip, reference_time);
    let mut by_tier: HashMap<Tier, Vec<f64>> = HashMap::new();
    for (issue, entry) in wip.iter().zip(aging.iter()) {
        let tier = flowcast_core::lookup_status(mapping, issue.status_id.as_deref(), Some(&issue.status))
            .map(|m| m.tier)
            .unwrap_or(Tier::Demand);
        by_tier.entry(tier).or_default().push(entry.age_days);
    }

    let mut summaries: Vec<TierSummary> = by_tier
        .into_iter()
        .map(|(tier, mut ages)| {
            ages.sort_by(|a, b| a.partial_cmp(b).unwrap());
            TierSummary {
                tier,
                count: ages.len() as u32,
                oldest_age_days: ages.last().copied().unwrap_or(0.0),
                p50_age_days: percentile(&ages, 0.5),
                p85_age_days: percentile(&ages, 0.85),
            }
        })
        .collect();
    summaries.sort_by_key(|s| tier_sort_key(s.tier));
    summaries
}

fn tier_sort_key(tier: Tier) -> u8 {
    match tier {
        Tier::Demand => 0,
        Tier::Upstream => 1,
        Tier::Downstream => 2,
        Tier::Finished => 3,
        Tier::Unknown => 4,
    }
}

/// `delivered / (delivered + abandoned)` over a set of finished issues,
/// classified via `AnalysisSession::is_delivered`'s outcome precedence.
pub fn yield_ratio(finished: &[DomainIssue], delivered_flags: &[bool]) -> f64 {
    if finished.is_empty() {
        return 0.0;
    }
    let delivered = delivered_flags.iter().filter(|d| **d).count();
    delivered as f64 / finished.len() as f64
}

/// Accumulated "interest" on WIP items that have overstayed a service-level
/// expectation: `sum(max(0, age - sle_days))` across `wip`.
pub fn flow_debt(wip: &[DomainIssue], sle_days: f64, reference_time: DateTime<Utc>) -> f64 {
    calculate_inventory_age(wip, reference_time)
        .iter()
        .map(|e| (e.age_days - sle_days).max(0.0))
        .sum()
}

#[derive(Debug, Clone, Serialize)]
pub struct CfdPoint {
    pub day: DateTime<Utc>,
    pub arrived_cumulative: u32,
    pub finished_cumulative: u32,
    pub wip: u32,
}

/// Simplified three-band cumulative flow diagram (arrived / finished / WIP)
/// over `window`'s daily buckets, excluding the partial trailing bucket.
pub fn cumulative_flow_diagram(all_issues: &[DomainIssue], window: &AnalysisWindow, now: DateTime<Utc>) -> Vec<CfdPoint> {
    let buckets = window.subdivide();
    buckets
        .iter()
        .filter(|b| !window.is_partial(**b, now))
        .map(|bucket_start| {
            let day_end = window.bucket_end(*bucket_start);
            let arrived = all_issues.iter().filter(|i| i.created <= day_end).count() as u32;
            let finished = all_issues
                .iter()
                .filter(|i| i.resolution_date.map(|d| d <= day_end).unwrap_or(false))
                .count() as u32;
            CfdPoint {
                day: *bucket_start,
                arrived_cumulative: arrived,
                finished_cumulative: finished,
                wip: arrived.saturating_sub(finished),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CadenceStats {
    pub mean_interval_days: f64,
    pub stddev_interval_days: f64,
}

/// Regularity of delivery intervals: mean and standard deviation of the
/// gaps between consecutive delivery timestamps.
pub fn cadence(mut delivery_dates: Vec<DateTime<Utc>>) -> CadenceStats {
    delivery_dates.sort();
    if delivery_dates.len() < 2 {
        return CadenceStats::default();
    }
    let intervals: Vec<f64> = delivery_dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds() as f64 / 86_400.0)
        .collect();
    let m = mean(&intervals);
    let variance = mean(&intervals.iter().map(|v| (v - m).powi(2)).collect::<Vec<_>>());
    CadenceStats {
        mean_interval_days: m,
        stddev_interval_days: variance.sqrt(),
    }
}

/// Arrival pressure: ratio of the demand arrival rate to the downstream
/// departure rate. `> 1.0` means the backlog is growing faster than it
/// drains; `f64::INFINITY` when departures are zero.
pub fn pressure(arrivals_per_day: f64, departures_per_day: f64) -> f64 {
    if departures_per_day <= 0.0 {
        f64::INFINITY
    } else {
        arrivals_per_day / departures_per_day
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusPersistenceEntry {
    pub issue_type: String,
    pub status: String,
    pub mean_days: f64,
    pub count: u32,
}

/// Population-level, type-stratified status persistence: rolls
/// `DomainIssue::status_residency` up across `issues`, grouped by
/// `(issue_type, status)`, into a mean-days-resident figure per group.
/// Statuses an issue never visited contribute nothing to that group.
pub fn status_persistence(issues: &[DomainIssue]) -> Vec<StatusPersistenceEntry> {
    let mut by_key: HashMap<(String, String), Vec<f64>> = HashMap::new();
    for issue in issues {
        for (status, seconds) in &issue.status_residency {
            if *seconds <= 0 {
                continue;
            }
            let days = *seconds as f64 / 86_400.0;
            by_key.entry((issue.issue_type.clone(), status.clone())).or_default().push(days);
        }
    }

    let mut entries: Vec<StatusPersistenceEntry> = by_key
        .into_iter()
        .map(|((issue_type, status), days)| StatusPersistenceEntry {
            mean_days: mean(&days),
            count: days.len() as u32,
            issue_type,
            status,
        })
        .collect();
    entries.sort_by(|a, b| a.issue_type.cmp(&b.issue_type).then_with(|| a.status.cmp(&b.status)));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn wip_issue(key: &str, status: &str, entered_days_ago: i64, now: DateTime<Utc>) -> DomainIssue {
        DomainIssue {
            key: key.to_string(),
            issue_type: "Story".to_string(),
            status: status.to_string(),
            status_id: None,
            resolution: None,
            resolution_date: None,
            created: now - Duration::days(entered_days_ago + 5),
            updated: now,
            birth_status: None,
            birth_status_id: None,
            transitions: vec![flowcast_types::Transition {
                from_status: None,
                from_status_id: None,
                to_status: status.to_string(),
                to_status_id: None,
                timestamp: now - Duration::days(entered_days_ago),
            }],
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
    fn inventory_age_does_not_mutate_input() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let wip = vec![wip_issue("P-1", "In Progress", 3, now)];
        let before = format!("{wip:?}");
        let _ = calculate_inventory_age(&wip, now);
        let after = format!("{wip:?}");
        assert_eq!(before, after);
    }

    #[test]
    fn aging_reflects_days_since_entering_current_status() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let wip = vec![wip_issue("P-1", "In Progress", 4, now)];
        let aging = calculate_inventory_age(&wip, now);
        assert!((aging[0].age_days - 4.0).abs() < 0.01);
    }

    #[test]
    fn flow_debt_ignores_items_within_sle() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let wip = vec![wip_issue("P-1", "In Progress", 2, now), wip_issue("P-2", "In Progress", 10, now)];
        let debt = flow_debt(&wip, 5.0, now);
        assert!((debt - 5.0).abs() < 0.01);
    }

    #[test]
    fn status_persistence_groups_by_type_and_status() {
        let mut story = wip_issue("P-1", "In Progress", 2, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        story.issue_type = "Story".to_string();
        story.status_residency.insert("Backlog".to_string(), 86_400 * 3);
        story.status_residency.insert("In Progress".to_string(), 86_400 * 2);

        let mut bug = wip_issue("P-2", "In Progress", 1, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        bug.issue_type = "Bug".to_string();
        bug.status_residency.insert("Backlog".to_string(), 86_400);

        let entries = status_persistence(&[story, bug]);
        assert_eq!(entries.len(), 3);
        let story_backlog = entries.iter().find(|e| e.issue_type == "Story" && e.status == "Backlog").unwrap();
        assert!((story_backlog.mean_days - 3.0).abs() < 0.01);
        assert_eq!(story_backlog.count, 1);
    }

    #[test]
    fn status_persistence_skips_zero_residency_entries() {
        let mut issue = wip_issue("P-1", "In Progress", 1, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        issue.status_residency.insert("Blocked".to_string(), 0);
        let entries = status_persistence(&[issue]);
        assert!(entries.is_empty());
    }
}
