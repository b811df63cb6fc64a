use serde::{Deserialize, Serialize};

/// Kind of statistical-control signal detected on an XmR chart (§3 `XmRResult`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// Point outside the natural process limits.
    Outlier,
    /// Eight consecutive points on the same side of the average.
    Shift,
    /// Outlier specific to the WIP run-chart (§4.8).
    WipOutlier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(rename = "type")]
    pub kind: SignalType,
    pub description: String,
}

/// Individuals + Moving Range control-chart result (§3, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmRResult {
    pub average: f64,
    pub average_moving_range: f64,
    /// `average + 2.66 * average_moving_range`.
    pub unpl: f64,
    /// `max(0, average - 2.66 * average_moving_range)`.
    pub lnpl: f64,
    pub values: Vec<f64>,
    /// `moving_range.len() == values.len() - 1` (or 0 when `values` is empty).
    pub moving_range: Vec<f64>,
    pub signals: Vec<Signal>,
}

/// Process drift classification from a Three-Way (subgroup) XmR analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Stable,
    Volatile,
    Migrating,
}
