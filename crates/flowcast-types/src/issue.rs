use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single recorded status move inside a `DomainIssue`'s history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub from_status: Option<String>,
    pub from_status_id: Option<String>,
    pub to_status: String,
    pub to_status_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Reconstructed state of one issue, folded from its event stream by the
/// Issue Reconstructor (§4.2).
///
/// Invariants (§3, verified in `flowcast-engine::reconstruct` tests):
/// - `sum(status_residency.values())` ≈ `(resolution_date ?? reference_time) - anchor`, ±1s.
/// - `blocked_residency[s] <= status_residency[s]` for every status `s`.
/// - `transitions` is strictly chronologically ordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainIssue {
    pub key: String,
    pub issue_type: String,

    pub status: String,
    pub status_id: Option<String>,

    pub resolution: Option<String>,
    pub resolution_date: Option<DateTime<Utc>>,

    /// First `Created` event timestamp, or a synthetic value (earliest seen
    /// event) when no `Created` event exists in the slice.
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,

    pub birth_status: Option<String>,
    pub birth_status_id: Option<String>,

    pub transitions: Vec<Transition>,

    /// Total seconds spent resident in each status name.
    pub status_residency: HashMap<String, i64>,
    /// Seconds of `status_residency` that overlapped a blocked interval.
    pub blocked_residency: HashMap<String, i64>,

    pub flagged: bool,
    /// Set when a project-move (healing) event discarded earlier transitions.
    pub is_moved: bool,
    /// Set when `created` had to be synthesized rather than read from an event.
    pub has_synthetic_birth: bool,
    pub is_subtask: bool,
    pub project_key: Option<String>,
}

impl DomainIssue {
    /// Total residency across all statuses, in seconds.
    pub fn total_residency(&self) -> i64 {
        self.status_residency.values().sum()
    }

    /// True if this issue's resolution has been classified against the
    /// supplied outcome map as `delivered` (the legacy fallback, "has a
    /// resolution date", lives in `flowcast_engine::session`).
    pub fn resolution_is(&self, outcome_map: &HashMap<String, String>, wanted: &str) -> bool {
        match &self.resolution {
            Some(r) => outcome_map.get(r).map(|o| o == wanted).unwrap_or(false),
            None => false,
        }
    }
}
