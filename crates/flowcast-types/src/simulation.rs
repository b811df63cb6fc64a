use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which dual question the simulation answers (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// "How many working days to finish N items?"
    Duration,
    /// "How many items can ship in D days?"
    Scope,
}

/// Raw percentile markers over the trial outcome distribution, always in the
/// trial unit (days for Duration, item count for Scope) and always sorted
/// ascending by probability-of-value-or-less.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PercentileSet {
    pub p10: f64,
    pub p30: f64,
    pub p50: f64,
    pub p70: f64,
    pub p85: f64,
    pub p90: f64,
    pub p95: f64,
    pub p98: f64,
}

/// Mode-aware forecast labels (§4.7 table). For Duration, longer is worse and
/// these increase monotonically; for Scope, more items is better and they
/// decrease monotonically (§8 invariant 6).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PercentileLabels {
    pub aggressive: f64,
    pub unlikely: f64,
    pub coin_toss: f64,
    pub probable: f64,
    pub likely: f64,
    pub conservative: f64,
    pub safe: f64,
    pub almost_certain: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpreadStats {
    pub iqr: f64,
    pub inner_80: f64,
}

/// Predictability classification derived from fat-tail/tail-to-median ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predictability {
    Predictable,
    HighlyVolatile,
    Unstable,
    UnstableAndVolatile,
}

/// Result of a Monte-Carlo simulation run (§3 `SimulationResult`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub mode: SimulationMode,
    pub percentiles: PercentileSet,
    pub labels: PercentileLabels,
    pub spread: SpreadStats,
    /// `P98/P50`.
    pub fat_tail_ratio: f64,
    /// `P85/P50`.
    pub tail_to_median_ratio: f64,
    pub predictability: Predictability,
    pub warnings: Vec<String>,
    pub insights: Vec<String>,
    /// Median count of non-targeted background items consumed, per type.
    pub background_by_type: HashMap<String, f64>,
    /// `currentWIP / (throughput * avgCycleTime)` from Little's Law, when WIP
    /// context was supplied to the engine.
    pub stability_ratio: Option<f64>,
    pub stale_wip_count: Option<u32>,
}
