use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};
use flowcast_types::{IssueEvent, Outcome, Role, Tier};
use regex::Regex;
use serde::Serialize;

const DOWNSTREAM_KEYWORDS: &[&str] = &["progress", "develop", "coding", "review", "test", "qa", "deploy", "build"];
const UPSTREAM_KEYWORDS: &[&str] = &["backlog", "triage", "analysis", "design", "refine", "ready", "spec", "groom"];
const FINISHED_KEYWORDS: &[&str] = &["done", "closed", "resolved", "complete", "released", "cancelled", "rejected", "won't fix"];

fn delivered_regex() -> Regex {
    Regex::new(r"(?i)fix|done|complete|deliver|resolve|implement|shipped").unwrap()
}

fn queue_regex() -> Regex {
    Regex::new(r"(?i)^(ready for|waiting( on| for)?|queue|to ?do|backlog)\b").unwrap()
}

fn has_keyword(name: &str, keywords: &[&str]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(micros).single().unwrap_or_else(Utc::now)
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredStatus {
    pub name: String,
    pub tier: Tier,
    pub role: Role,
    pub outcome: Outcome,
    pub entry_count: u32,
    pub into: u32,
    pub out: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryResult {
    pub statuses: Vec<DiscoveredStatus>,
    /// Total order inferred from pairwise precedence (§4.5 step 2).
    pub status_order: Vec<String>,
    pub commitment_point: Option<String>,
    /// Up to 200 issue keys selected for deep inspection (§4.5 step 7).
    pub sample_issue_keys: Vec<String>,
}

struct IssueTrace {
    key: String,
    visited_in_order: Vec<String>,
    final_status: Option<String>,
    final_resolution: Option<String>,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

fn trace_issues(events: &[IssueEvent]) -> Vec<IssueTrace> {
    let mut by_key: HashMap<&str, Vec<&IssueEvent>> = HashMap::new();
    for event in events {
        by_key.entry(event.issue_key.as_str()).or_default().push(event);
    }

    let mut traces = Vec::new();
    for (key, issue_events) in by_key {
        let mut visited = Vec::new();
        let mut seen = HashSet::new();
        let mut final_status = None;
        let mut final_resolution = None;
        for event in &issue_events {
            if let Some(to) = &event.to_status {
                if !to.is_empty() {
                    if seen.insert(to.clone()) {
                        visited.push(to.clone());
                    }
                    final_status = Some(to.clone());
                }
            }
            if event.marks_resolved() {
                final_resolution = event.resolution.clone();
            } else if event.marks_unresolved() {
                final_resolution = None;
            }
        }
        let created = micros_to_datetime(issue_events.first().unwrap().timestamp);
        let updated = micros_to_datetime(issue_events.last().unwrap().timestamp);
        traces.push(IssueTrace {
            key: key.to_string(),
            visited_in_order: visited,
            final_status,
            final_resolution,
            created,
            updated,
        });
    }
    traces
}

/// Infer a status backbone and propose per-status tier/role/outcome purely
/// from raw event history (§4.5) — this is how a new source's workflow
/// mapping gets bootstrapped before any curated mapping file exists.
pub fn discover(events: &[IssueEvent]) -> DiscoveryResult {
    let traces = trace_issues(events);

    let mut precedes: HashMap<(String, String), u32> = HashMap::new();
    let mut entry_count: HashMap<String, u32> = HashMap::new();
    let mut into: HashMap<String, u32> = HashMap::new();
    let mut out: HashMap<String, u32> = HashMap::new();
    let mut resolved_at: HashMap<String, u32> = HashMap::new();

    for trace in &traces {
        for status in &trace.visited_in_order {
            *entry_count.entry(status.clone()).or_insert(0) += 1;
        }
        for pair in trace.visited_in_order.windows(2) {
            *out.entry(pair[0].clone()).or_insert(0) += 1;
            *into.entry(pair[1].clone()).or_insert(0) += 1;
        }
        for i in 0..trace.visited_in_order.len() {
            for j in (i + 1)..trace.visited_in_order.len() {
                *precedes
                    .entry((trace.visited_in_order[i].clone(), trace.visited_in_order[j].clone()))
                    .or_insert(0) += 1;
            }
        }
        if trace.final_resolution.is_some() {
            if let Some(status) = &trace.final_status {
                *resolved_at.entry(status.clone()).or_insert(0) += 1;
            }
        }
    }

    let all_statuses: Vec<String> = entry_count.keys().cloned().collect();

    // step 2: score + deterministic total order.
    let mut scored: Vec<(String, i64)> = all_statuses
        .iter()
        .map(|s| {
            let score = all_statuses
                .iter()
                .filter(|t| *t != s)
                .filter(|t| {
                    let forward = *precedes.get(&(s.clone(), (*t).clone())).unwrap_or(&0);
                    let backward = *precedes.get(&((*t).clone(), s.clone())).unwrap_or(&0);
                    forward > backward
                })
                .count() as i64;
            (s.clone(), score)
        })
        .collect();
    scored.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| entry_count.get(&b.0).cmp(&entry_count.get(&a.0)))
            .then_with(|| a.0.cmp(&b.0))
    });
    let path_order: Vec<String> = scored.into_iter().map(|(s, _)| s).collect();

    // step 3: tier proposal, iterating in path order.
    let delivered_re = delivered_regex();
    let mut tiers: HashMap<String, Tier> = HashMap::new();
    let mut seen_downstream = false;
    let len = path_order.len();
    for (i, status) in path_order.iter().enumerate() {
        let e = *entry_count.get(status).unwrap_or(&0);
        let o = *out.get(status).unwrap_or(&0);
        let n_in = *into.get(status).unwrap_or(&0);
        let resolved = *resolved_at.get(status).unwrap_or(&0);
        let reachability = e.max(1);
        let resolution_density = resolved as f64 / reachability as f64;

        let tier = if i == 0 {
            Tier::Demand
        } else if resolution_density > 0.20
            || (n_in > 5 && n_in > 4 * o)
            || has_keyword(status, FINISHED_KEYWORDS)
        {
            Tier::Finished
        } else if has_keyword(status, DOWNSTREAM_KEYWORDS) {
            seen_downstream = true;
            Tier::Downstream
        } else if !seen_downstream && has_keyword(status, UPSTREAM_KEYWORDS) {
            Tier::Upstream
        } else if !seen_downstream && i < len / 2 {
            Tier::Upstream
        } else {
            Tier::Downstream
        };
        tiers.insert(status.clone(), tier);
    }

    // step 4: outcome refinement, "delivered" wins any conflict.
    let mut outcomes: HashMap<String, Outcome> = HashMap::new();
    for trace in &traces {
        let Some(status) = &trace.final_status else { continue };
        if tiers.get(status) != Some(&Tier::Finished) {
            continue;
        }
        let delivered = trace
            .final_resolution
            .as_deref()
            .map(|r| delivered_re.is_match(r))
            .unwrap_or(false);
        let candidate = if delivered { Outcome::Delivered } else { Outcome::Abandoned };
        let slot = outcomes.entry(status.clone()).or_insert(Outcome::Unknown);
        if *slot != Outcome::Delivered {
            *slot = candidate;
        }
    }

    // step 5: role.
    let queue_re = queue_regex();
    let active_names: HashSet<String> = path_order
        .iter()
        .filter(|s| tiers.get(*s) == Some(&Tier::Downstream))
        .cloned()
        .collect();
    let mut roles: HashMap<String, Role> = HashMap::new();
    for (i, status) in path_order.iter().enumerate() {
        let tier = tiers[status];
        let role = if tier == Tier::Finished {
            Role::Terminal
        } else if tier == Tier::Demand {
            Role::Queue
        } else if queue_re.is_match(status) && has_active_counterpart(status, &active_names) {
            Role::Queue
        } else if queue_re.is_match(status) && i > 0 {
            Role::Queue
        } else {
            Role::Active
        };
        roles.insert(status.clone(), role);
    }

    // step 6: commitment point — terminals moved to the back of path order.
    let mut refined_order: Vec<&String> = path_order
        .iter()
        .filter(|s| tiers[*s] != Tier::Finished)
        .collect();
    refined_order.extend(path_order.iter().filter(|s| tiers[*s] == Tier::Finished));
    let commitment_point = refined_order
        .iter()
        .find(|s| tiers[**s] == Tier::Downstream)
        .or_else(|| refined_order.iter().find(|s| tiers[**s] == Tier::Upstream))
        .map(|s| (*s).clone());

    let statuses = path_order
        .iter()
        .map(|s| DiscoveredStatus {
            name: s.clone(),
            tier: tiers[s],
            role: roles[s],
            outcome: outcomes.get(s).cloned().unwrap_or(Outcome::Unknown),
            entry_count: *entry_count.get(s).unwrap_or(&0),
            into: *into.get(s).unwrap_or(&0),
            out: *out.get(s).unwrap_or(&0),
        })
        .collect();

    let sample_issue_keys = select_sample(&traces);

    DiscoveryResult {
        statuses,
        status_order: path_order,
        commitment_point,
        sample_issue_keys,
    }
}

fn has_active_counterpart(queue_name: &str, active_names: &HashSet<String>) -> bool {
    let stem = queue_regex().replace(queue_name, "");
    let stem = stem.trim().to_lowercase();
    if stem.is_empty() {
        return false;
    }
    active_names.iter().any(|a| a.to_lowercase().contains(&stem))
}

/// Prefer issues created in the last year; widen to 2y then 3y if that
/// yields fewer than 100/200 items respectively; cap the sample at 200,
/// sorted by most-recently-updated first (§4.5 step 7).
fn select_sample(traces: &[IssueTrace]) -> Vec<String> {
    const TARGET: usize = 200;
    let now = traces.iter().map(|t| t.updated).max().unwrap_or_else(Utc::now);

    let mut candidates = |years: i64| -> Vec<&IssueTrace> {
        let cutoff = now - chrono::Duration::days(365 * years);
        let mut v: Vec<&IssueTrace> = traces.iter().filter(|t| t.created >= cutoff).collect();
        v.sort_by(|a, b| b.updated.cmp(&a.updated));
        v
    };

    let mut pool = candidates(1);
    if pool.len() < 100 {
        pool = candidates(2);
    }
    if pool.len() < TARGET {
        pool = candidates(3);
    }

    pool.into_iter().take(TARGET).map(|t| t.key.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcast_types::EventType;

    fn event(key: &str, event_type: EventType, to: Option<&str>, resolution: Option<&str>, ts_secs: i64) -> IssueEvent {
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
            timestamp: ts_secs * 1_000_000,
        }
    }

    #[test]
    fn first_status_in_path_is_demand() {
        let events = vec![
            event("P-1", EventType::Created, Some("Backlog"), None, 0),
            event("P-1", EventType::Change, Some("In Progress"), None, 100),
            event("P-1", EventType::Change, Some("Done"), Some("Fixed"), 200),
            event("P-2", EventType::Created, Some("Backlog"), None, 0),
            event("P-2", EventType::Change, Some("In Progress"), None, 50),
            event("P-2", EventType::Change, Some("Done"), Some("Fixed"), 150),
        ];
        let result = discover(&events);
        let first = result.status_order.first().unwrap();
        assert_eq!(first, "Backlog");
        let backlog = result.statuses.iter().find(|s| s.name == "Backlog").unwrap();
        assert_eq!(backlog.tier, Tier::Demand);
    }

    #[test]
    fn finished_status_gets_delivered_outcome_from_resolution_text() {
        let events = vec![
            event("P-1", EventType::Created, Some("Backlog"), None, 0),
            event("P-1", EventType::Change, Some("Done"), Some("Fixed"), 100),
        ];
        let result = discover(&events);
        let done = result.statuses.iter().find(|s| s.name == "Done").unwrap();
        assert_eq!(done.tier, Tier::Finished);
        assert_eq!(done.outcome, Outcome::Delivered);
    }

    #[test]
    fn commitment_point_prefers_downstream_over_upstream() {
        let events = vec![
            event("P-1", EventType::Created, Some("Backlog"), None, 0),
            event("P-1", EventType::Change, Some("In Progress"), None, 100),
            event("P-1", EventType::Change, Some("Done"), Some("Fixed"), 200),
        ];
        let result = discover(&events);
        assert_eq!(result.commitment_point.as_deref(), Some("In Progress"));
    }
}
