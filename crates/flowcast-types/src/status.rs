use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Meta-workflow tier a status belongs to (§3 `StatusMetadata`).
///
/// Closed sum type per §9's "stringly-typed tier/role/outcome" design note:
/// unknown input maps to `Unknown`, never to an empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Demand,
    Upstream,
    Downstream,
    Finished,
    Unknown,
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Unknown
    }
}

/// Role a status plays within its tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Queue,
    Active,
    Terminal,
    Ignore,
    Unknown,
}

impl Default for Role {
    fn default() -> Self {
        Role::Unknown
    }
}

/// Terminal outcome attached to a Finished-tier status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Delivered,
    Abandoned,
    /// `abandoned_<tier>` — abandoned while still resident in `Tier`.
    AbandonedIn(Tier),
    Unknown,
}

impl Default for Outcome {
    fn default() -> Self {
        Outcome::Unknown
    }
}

impl Outcome {
    /// Parse the free-form outcome strings used in workflow files:
    /// `"delivered"`, `"abandoned"`, `"abandoned_<tier>"`, or `""`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Outcome::Unknown;
        }
        if raw.eq_ignore_ascii_case("delivered") {
            return Outcome::Delivered;
        }
        if raw.eq_ignore_ascii_case("abandoned") {
            return Outcome::Abandoned;
        }
        if let Some(tier_str) = raw.strip_prefix("abandoned_") {
            return Outcome::AbandonedIn(Tier::parse(tier_str));
        }
        Outcome::Unknown
    }
}

impl Tier {
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "demand" => Tier::Demand,
            "upstream" => Tier::Upstream,
            "downstream" => Tier::Downstream,
            "finished" => Tier::Finished,
            _ => Tier::Unknown,
        }
    }
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "queue" => Role::Queue,
            "active" => Role::Active,
            "terminal" => Role::Terminal,
            "ignore" => Role::Ignore,
            _ => Role::Unknown,
        }
    }
}

/// Per-status metadata supplied by the companion `<source>_workflow.json` (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusMetadata {
    pub tier: Tier,
    pub role: Role,
    #[serde(default)]
    pub outcome: Outcome,
    pub name: String,
}

/// The full mapping loaded from a workflow file: per-status metadata keyed
/// both by stable ID and by lower-cased display name, plus the resolution
/// outcome map, discovered status order, commitment point, and discovery
/// cutoff (§6, §4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowMapping {
    /// Metadata keyed by stable status ID, where the source provides one.
    #[serde(default)]
    pub by_id: HashMap<String, StatusMetadata>,
    /// Metadata keyed by case-insensitive (lower-cased) display name, used
    /// only when a status has no stable ID or the ID is absent on the event.
    #[serde(default)]
    pub by_name: HashMap<String, StatusMetadata>,
    /// Resolution string (e.g. "Won't Fix") -> outcome.
    #[serde(default)]
    pub resolutions: HashMap<String, Outcome>,
    /// Discovered or curated total order over statuses.
    #[serde(default)]
    pub status_order: Vec<String>,
    /// First Downstream status; start of cycle-time measurement.
    #[serde(default)]
    pub commitment_point: Option<String>,
    /// Steady-state floor below which historical data is considered unreliable.
    #[serde(default)]
    pub discovery_cutoff: Option<DateTime<Utc>>,
}

impl WorkflowMapping {
    pub fn insert(&mut self, id: Option<&str>, name: &str, metadata: StatusMetadata) {
        if let Some(id) = id {
            self.by_id.insert(id.to_string(), metadata.clone());
        }
        self.by_name.insert(name.to_lowercase(), metadata);
    }
}
