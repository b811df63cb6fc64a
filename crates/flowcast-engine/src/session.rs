use std::cell::OnceCell;
use std::collections::HashMap;

use flowcast_types::{AnalysisWindow, DomainIssue, IssueEvent, Outcome, Tier, WorkflowMapping};

use crate::reconstruct::{reconstruct_issue, ReconstructOptions};

/// One of the four tier-aligned partitions a projection sorts issues into
/// (§4.4 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Finished,
    Downstream,
    Upstream,
    Demand,
}

/// Output of `project` (§4.4 steps 1-3): every reconstructed issue sorted
/// into exactly one tier-aligned bucket.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub finished: Vec<DomainIssue>,
    pub downstream: Vec<DomainIssue>,
    pub upstream: Vec<DomainIssue>,
    pub demand: Vec<DomainIssue>,
}

impl Projection {
    pub fn all(&self) -> impl Iterator<Item = &DomainIssue> {
        self.finished
            .iter()
            .chain(self.downstream.iter())
            .chain(self.upstream.iter())
            .chain(self.demand.iter())
    }
}

fn status_tier(mapping: &WorkflowMapping, issue: &DomainIssue) -> Tier {
    flowcast_core::lookup_status(mapping, issue.status_id.as_deref(), Some(&issue.status))
        .map(|m| m.tier)
        .unwrap_or(Tier::Demand)
}

fn is_effectively_resolved(mapping: &WorkflowMapping, issue: &DomainIssue) -> bool {
    issue.resolution_date.is_some() || status_tier(mapping, issue) == Tier::Finished
}

/// Group raw events by `issue_key`, drop anything past `window.end`,
/// reconstruct each issue as of `window.end`, then tier-partition (§4.4).
pub fn project(events: &[IssueEvent], window: &AnalysisWindow, mapping: &WorkflowMapping) -> Projection {
    let mut by_key: HashMap<&str, Vec<&IssueEvent>> = HashMap::new();
    for event in events {
        if event.timestamp > window.end.timestamp_micros() {
            continue;
        }
        by_key.entry(event.issue_key.as_str()).or_default().push(event);
    }

    let is_finished = |id: Option<&str>, name: &str| {
        flowcast_core::lookup_status(mapping, id, Some(name))
            .map(|m| m.tier == Tier::Finished)
            .unwrap_or(false)
    };
    let options = ReconstructOptions {
        reference_time: window.end,
        is_finished_status: Some(&is_finished),
    };

    let mut projection = Projection::default();
    for issue_events in by_key.values() {
        let owned: Vec<IssueEvent> = issue_events.iter().map(|e| (*e).clone()).collect();
        let Some(issue) = reconstruct_issue(&owned, &options) else {
            continue;
        };

        let finished_in_range = issue
            .resolution_date
            .map(|d| d >= window.start && d <= window.end)
            .unwrap_or(false);

        if is_effectively_resolved(mapping, &issue) && finished_in_range {
            projection.finished.push(issue);
            continue;
        }

        match status_tier(mapping, &issue) {
            Tier::Downstream => projection.downstream.push(issue),
            Tier::Upstream => projection.upstream.push(issue),
            _ => projection.demand.push(issue),
        }
    }

    projection
}

/// Request-scoped session memoising a single projection (§4.4 step 4, §5
/// "shared-resource policy"). Must not be shared across concurrent requests —
/// callers build a fresh one per request.
pub struct AnalysisSession<'a> {
    events: &'a [IssueEvent],
    window: AnalysisWindow,
    mapping: &'a WorkflowMapping,
    projection: OnceCell<Projection>,
}

impl<'a> AnalysisSession<'a> {
    pub fn new(events: &'a [IssueEvent], window: AnalysisWindow, mapping: &'a WorkflowMapping) -> Self {
        Self {
            events,
            window,
            mapping,
            projection: OnceCell::new(),
        }
    }

    fn projection(&self) -> &Projection {
        self.projection
            .get_or_init(|| project(self.events, &self.window, self.mapping))
    }

    pub fn get_delivered(&self) -> &[DomainIssue] {
        &self.projection().finished
    }

    pub fn get_wip(&self) -> Vec<&DomainIssue> {
        self.projection()
            .downstream
            .iter()
            .chain(self.projection().upstream.iter())
            .collect()
    }

    pub fn get_all_issues(&self) -> Vec<&DomainIssue> {
        self.projection().all().collect()
    }

    /// `resolutions[r.resolution] == "delivered"`, else current-status
    /// metadata outcome, else (legacy) "has a resolution date" (§4.4 step 4).
    pub fn is_delivered(&self, issue: &DomainIssue) -> bool {
        is_delivered(self.mapping, issue)
    }
}

/// `resolutions[r.resolution] == "delivered"`, else current-status metadata
/// outcome, else (legacy) "has a resolution date" (§4.4 step 4). Free
/// function so callers without a live `AnalysisSession` (e.g. walk-forward
/// checkpoints, which reconstruct a fresh issue set per iteration) can reuse
/// the same classification.
pub fn is_delivered(mapping: &WorkflowMapping, issue: &DomainIssue) -> bool {
    if let Some(resolution) = &issue.resolution {
        if let Some(outcome) = mapping.resolutions.get(resolution) {
            return *outcome == Outcome::Delivered;
        }
    }
    if let Some(meta) = flowcast_core::lookup_status(mapping, issue.status_id.as_deref(), Some(&issue.status)) {
        if meta.outcome == Outcome::Delivered {
            return true;
        }
        if meta.outcome != Outcome::Unknown {
            return false;
        }
    }
    issue.resolution_date.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use flowcast_types::{Bucket, EventType, Role, StatusMetadata};

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

    fn mapping_with_finished(status: &str) -> WorkflowMapping {
        let mut mapping = WorkflowMapping::default();
        mapping.insert(
            None,
            status,
            StatusMetadata {
                tier: Tier::Finished,
                role: Role::Terminal,
                outcome: Outcome::Delivered,
                name: status.to_string(),
            },
        );
        mapping
    }

    #[test]
    fn finished_issues_land_in_finished_partition() {
        let events = vec![
            event("P-1", EventType::Created, Some("Backlog"), None, 0),
            event("P-1", EventType::Change, Some("Done"), Some("Fixed"), 100),
        ];
        let mapping = mapping_with_finished("Done");
        let (window, _) = AnalysisWindow::new(
            Utc.timestamp_opt(0, 0).unwrap(),
            Utc.timestamp_opt(1_000, 0).unwrap(),
            Bucket::Day,
            None,
        );
        let projection = project(&events, &window, &mapping);
        assert_eq!(projection.finished.len(), 1);
        assert!(projection.downstream.is_empty());
    }

    #[test]
    fn session_memoises_projection_across_calls() {
        let events = vec![event("P-2", EventType::Created, Some("Backlog"), None, 0)];
        let mapping = WorkflowMapping::default();
        let (window, _) = AnalysisWindow::new(
            Utc.timestamp_opt(0, 0).unwrap(),
            Utc.timestamp_opt(1_000, 0).unwrap(),
            Bucket::Day,
            None,
        );
        let session = AnalysisSession::new(&events, window, &mapping);
        assert_eq!(session.get_all_issues().len(), 1);
        assert_eq!(session.get_all_issues().len(), 1);
    }
}
