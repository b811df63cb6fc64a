use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per-day throughput histogram over an analysis window, plus stratification
/// and modelling metadata (§3 `Histogram`, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Histogram {
    /// `counts[i]` = items delivered on day `i` of the window.
    pub counts: Vec<u32>,
    /// `stratified_counts[type][i]` = items of `type` delivered on day `i`.
    pub stratified_counts: HashMap<String, Vec<u32>>,
    pub meta: HistogramMeta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistogramMeta {
    /// Fraction of delivered items belonging to each type; sums to 1.0 when
    /// any item was delivered, empty map otherwise (§8 invariant 5).
    pub type_distribution: HashMap<String, f64>,
    pub throughput_overall: f64,
    /// Mean of the last `min(30, days)` days.
    pub throughput_recent: f64,
    /// True for a type when it qualifies for stratified simulation (§4.6).
    pub eligible_types: HashMap<String, bool>,
    /// Detected negative-correlation "tax" pairs, `taxer -> taxed`.
    pub dependencies: Vec<(String, String)>,
    /// Fat-tail ratio (`p98/p50`) per type's own daily series.
    pub fat_tail_by_type: HashMap<String, f64>,
    /// Items dropped because their resolution wasn't classified as delivered.
    pub dropped_by_resolution: usize,
    /// Items dropped because their resolution/finish date fell outside the window.
    pub dropped_by_window: usize,
    /// Free-form, non-contractual diagnostic string (§9).
    pub modeling_insight: String,
}

impl Histogram {
    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }
}
