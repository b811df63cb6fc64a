use serde::{Deserialize, Serialize};

/// The kind of status-change event recorded for an issue.
///
/// Maps 1:1 to a line of the per-source JSONL log (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// First-seen event for an issue; fixes `created` and the birth status.
    Created,
    /// Any other field transition (status move, reassignment, etc).
    Change,
    /// Issue marked resolved (redundant with a non-empty `resolution`, kept
    /// as its own variant because some sources emit it without a status move).
    Resolved,
    /// Toggles the blocked/flagged interval open or closed.
    Flagged,
}

/// A single immutable status-change record for one issue (§3 `IssueEvent`).
///
/// Events for a given `issue_key` are monotonic in `timestamp`; the store
/// (§4.1) guarantees this ordering on read, the reconstructor (§4.2) assumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueEvent {
    pub issue_key: String,
    pub issue_type: String,
    pub event_type: EventType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_status_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_status_id: Option<String>,

    /// Non-empty => the issue is resolved with this resolution name.
    /// The literal value `"unresolved"` is an explicit marker that clears
    /// any previously recorded resolution (§9 Open Question #2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,

    /// Non-empty => this event opens a blocked interval; empty => closes one.
    /// `None` means the event does not touch the flagged state at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flagged: Option<String>,

    /// Set on a `Created` event that represents a project-move rebirth
    /// rather than a genuine first appearance.
    #[serde(default)]
    pub is_healed: bool,

    /// Microseconds since the Unix epoch. Monotonic per issue.
    pub timestamp: i64,
}

impl IssueEvent {
    /// True if `resolution` is present and not the explicit unresolved marker.
    pub fn marks_resolved(&self) -> bool {
        match &self.resolution {
            Some(r) if !r.is_empty() && !r.eq_ignore_ascii_case("unresolved") => true,
            _ => false,
        }
    }

    /// True if `resolution` explicitly clears a prior resolution.
    pub fn marks_unresolved(&self) -> bool {
        matches!(&self.resolution, Some(r) if r.eq_ignore_ascii_case("unresolved"))
    }

    /// True if this event opens a blocked interval.
    pub fn opens_flag(&self) -> bool {
        matches!(&self.flagged, Some(f) if !f.is_empty())
    }

    /// True if this event closes a blocked interval.
    pub fn closes_flag(&self) -> bool {
        matches!(&self.flagged, Some(f) if f.is_empty())
    }

    /// True if this event carries a status transition.
    pub fn has_transition(&self) -> bool {
        matches!(&self.to_status, Some(s) if !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_without_optional_noise() {
        let event = IssueEvent {
            issue_key: "PROJ-1".into(),
            issue_type: "Story".into(),
            event_type: EventType::Created,
            from_status: None,
            from_status_id: None,
            to_status: Some("Backlog".into()),
            to_status_id: Some("1".into()),
            resolution: None,
            flagged: None,
            is_healed: false,
            timestamp: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("resolution").is_none());
        assert!(json.get("flagged").is_none());
    }

    #[test]
    fn marks_resolved_ignores_unresolved_marker() {
        let mut event = IssueEvent {
            issue_key: "PROJ-1".into(),
            issue_type: "Story".into(),
            event_type: EventType::Change,
            from_status: None,
            from_status_id: None,
            to_status: None,
            to_status_id: None,
            resolution: Some("Done".into()),
            flagged: None,
            is_healed: false,
            timestamp: 1,
        };
        assert!(event.marks_resolved());
        event.resolution = Some("unresolved".into());
        assert!(!event.marks_resolved());
        assert!(event.marks_unresolved());
    }
}
