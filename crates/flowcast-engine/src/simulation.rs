use std::collections::{BTreeMap, HashMap};

use flowcast_types::{
    Histogram, PercentileLabels, PercentileSet, Predictability, SimulationMode, SimulationResult, SpreadStats,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::stats::{percentile, round2};

const SAFETY_CAP_DAYS: u32 = 20_000;
const FAT_TAIL_UNSTABLE_THRESHOLD: f64 = 5.6;
const TAIL_TO_MEDIAN_VOLATILE_THRESHOLD: f64 = 3.0;

/// What the simulation is answering, and its targets (§4.7).
pub enum SimulationTask {
    /// "How many working days to finish these items?" Keyed by type when the
    /// backlog spans more than one type; a single `"*"` key means a pooled,
    /// type-agnostic backlog. A `BTreeMap`, not a `HashMap`: a stratified
    /// trial draws from `remaining.keys()` in map order, and that draw order
    /// must be stable across processes for a fixed seed to reproduce a
    /// bit-identical result.
    Duration { targets: BTreeMap<String, u32> },
    /// "How many items can ship in `days`?" `filter` restricts which types
    /// count toward scope; `None` means every type counts.
    Scope {
        filter: Option<std::collections::HashSet<String>>,
        days: u32,
    },
}

/// Closed-vs-open system flag, trial volume, PRNG seeding, and optional
/// Little's-Law WIP context (§4.7, §5 "no shared mutable state").
pub struct SimulationConfig {
    pub expansion_enabled: bool,
    pub trials: usize,
    pub base_seed: u64,
    pub wip_context: Option<WipContext>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            expansion_enabled: false,
            trials: 10_000,
            base_seed: 0,
            wip_context: None,
        }
    }
}

/// Inputs to the Little's-Law stability check folded into the result
/// (`analyzeWIPStability`, §4.7).
pub struct WipContext {
    pub current_wip: f64,
    pub avg_cycle_time_days: f64,
    pub stale_wip_count: u32,
}

struct TrialOutcome {
    value: f64,
    background: HashMap<String, u32>,
}

fn shard_count(trials: usize) -> usize {
    if trials < 100 {
        1
    } else {
        4
    }
}

/// Run the Monte-Carlo simulation (§4.7). Never returns an error — per §7
/// the simulator always attaches warnings/insights and returns a best-effort
/// result, even for a zero-throughput or empty histogram.
pub fn simulate(histogram: &Histogram, task: &SimulationTask, config: &SimulationConfig) -> SimulationResult {
    let shards = shard_count(config.trials);
    let trials_per_shard = config.trials.div_ceil(shards.max(1));

    let shard_results: Vec<Vec<TrialOutcome>> = (0..shards)
        .into_par_iter()
        .map(|shard_index| {
            let mut rng = ChaCha8Rng::seed_from_u64(config.base_seed ^ shard_index as u64);
            (0..trials_per_shard)
                .map(|_| run_trial(histogram, task, config.expansion_enabled, &mut rng))
                .collect()
        })
        .collect();

    let mut outcomes: Vec<TrialOutcome> = shard_results.into_iter().flatten().collect();
    outcomes.truncate(config.trials.max(outcomes.len().min(config.trials)));
    outcomes.sort_by(|a, b| a.value.partial_cmp(&b.value).unwrap());

    let values: Vec<f64> = outcomes.iter().map(|o| o.value).collect();
    let percentiles = percentile_set(&values);
    let labels = percentile_labels(&values, task_mode(task));
    let spread = SpreadStats {
        iqr: percentile(&values, 0.75) - percentile(&values, 0.25),
        inner_80: percentile(&values, 0.90) - percentile(&values, 0.10),
    };

    let fat_tail_ratio = safe_ratio(percentiles.p98, percentiles.p50);
    let tail_to_median_ratio = safe_ratio(percentiles.p85, percentiles.p50);

    let mut insights = Vec::new();
    let mut predictability = Predictability::Predictable;
    let unstable = fat_tail_ratio >= FAT_TAIL_UNSTABLE_THRESHOLD;
    let volatile = tail_to_median_ratio > TAIL_TO_MEDIAN_VOLATILE_THRESHOLD;
    if unstable {
        insights.push("Fat-Tail: a small share of trials take dramatically longer than the median".to_string());
        predictability = Predictability::Unstable;
    }
    if volatile {
        insights.push("Highly Volatile: the P85 outcome is more than 3x the median".to_string());
        predictability = if unstable {
            Predictability::UnstableAndVolatile
        } else {
            Predictability::HighlyVolatile
        };
    }

    let background_by_type = median_background(&outcomes);

    let mut warnings = build_warnings(histogram, percentiles.p50, task_mode(task));

    let (stability_ratio, stale_wip_count) = match &config.wip_context {
        Some(ctx) => {
            let ratio = little_law_stability(ctx.current_wip, histogram.meta.throughput_overall, ctx.avg_cycle_time_days);
            if let Some(ratio) = ratio {
                if ratio > 1.3 {
                    insights.push("Clogged: WIP is outrunning throughput per Little's Law".to_string());
                } else if ratio < 0.7 {
                    insights.push("Starving: throughput capacity is under-utilized".to_string());
                }
            }
            (ratio, Some(ctx.stale_wip_count))
        }
        None => (None, None),
    };
    if stale_wip_count.map(|n| n > 0).unwrap_or(false) {
        warnings.push(format!("{} WIP item(s) have been stale since before the discovery cutoff", stale_wip_count.unwrap()));
    }

    SimulationResult {
        mode: task_mode(task),
        percentiles,
        labels,
        spread,
        fat_tail_ratio,
        tail_to_median_ratio,
        predictability,
        warnings,
        insights,
        background_by_type,
        stability_ratio,
        stale_wip_count,
    }
}

fn task_mode(task: &SimulationTask) -> SimulationMode {
    match task {
        SimulationTask::Duration { .. } => SimulationMode::Duration,
        SimulationTask::Scope { .. } => SimulationMode::Scope,
    }
}

fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        round2(numerator / denominator)
    }
}

fn percentile_set(values: &[f64]) -> PercentileSet {
    PercentileSet {
        p10: percentile(values, 0.10),
        p30: percentile(values, 0.30),
        p50: percentile(values, 0.50),
        p70: percentile(values, 0.70),
        p85: percentile(values, 0.85),
        p90: percentile(values, 0.90),
        p95: percentile(values, 0.95),
        p98: percentile(values, 0.98),
    }
}

/// Mode-dependent percentile→label mapping (§4.7 table). Duration reads the
/// ascending distribution directly ("longer = worse"); Scope reads it
/// mirrored ("more items = better"), so "10% chance of ≥ X" sits at P90.
fn percentile_labels(values: &[f64], mode: SimulationMode) -> PercentileLabels {
    match mode {
        SimulationMode::Duration => PercentileLabels {
            aggressive: percentile(values, 0.10),
            unlikely: percentile(values, 0.30),
            coin_toss: percentile(values, 0.50),
            probable: percentile(values, 0.70),
            likely: percentile(values, 0.85),
            conservative: percentile(values, 0.90),
            safe: percentile(values, 0.95),
            almost_certain: percentile(values, 0.98),
        },
        SimulationMode::Scope => PercentileLabels {
            aggressive: percentile(values, 0.90),
            unlikely: percentile(values, 0.70),
            coin_toss: percentile(values, 0.50),
            probable: percentile(values, 0.30),
            likely: percentile(values, 0.15),
            conservative: percentile(values, 0.10),
            safe: percentile(values, 0.05),
            almost_certain: percentile(values, 0.02),
        },
    }
}

fn little_law_stability(current_wip: f64, throughput: f64, avg_cycle_time_days: f64) -> Option<f64> {
    if throughput <= 0.0 || avg_cycle_time_days <= 0.0 {
        return None;
    }
    Some(current_wip / (throughput * avg_cycle_time_days))
}

fn median_background(outcomes: &[TrialOutcome]) -> HashMap<String, f64> {
    let mut per_type: HashMap<String, Vec<f64>> = HashMap::new();
    for outcome in outcomes {
        for (t, n) in &outcome.background {
            per_type.entry(t.clone()).or_default().push(*n as f64);
        }
    }
    per_type
        .into_iter()
        .map(|(t, mut values)| {
            values.sort_by(|a, b| a.partial_cmp(b).unwrap());
            (t, percentile(&values, 0.5))
        })
        .collect()
}

fn build_warnings(histogram: &Histogram, median: f64, mode: SimulationMode) -> Vec<String> {
    let mut warnings = Vec::new();
    let analyzed = histogram.total();

    if histogram.meta.throughput_overall == 0.0 {
        warnings.push("No historical throughput for this selection — forecast is effectively infinite".to_string());
    } else if mode == SimulationMode::Duration && median >= 3650.0 {
        warnings.push("Throughput has collapsed relative to the backlog size".to_string());
    }

    let resolved_total = analyzed as usize + histogram.meta.dropped_by_resolution;
    if resolved_total > 0 && (analyzed as f64 / resolved_total as f64) < 0.2 {
        warnings.push("Low resolution density — most resolved items were not classified as delivered".to_string());
    }

    let window_total = analyzed as usize + histogram.meta.dropped_by_window;
    if window_total > 0 && (histogram.meta.dropped_by_window as f64 / window_total as f64) > 0.5 {
        warnings.push("More than half of delivered items fell outside the analysis window".to_string());
    }

    if histogram.meta.throughput_overall > 0.0 {
        let delta = (histogram.meta.throughput_recent - histogram.meta.throughput_overall) / histogram.meta.throughput_overall;
        if delta.abs() > 0.30 {
            let direction = if delta > 0.0 { "accelerating" } else { "slowing" };
            warnings.push(format!("Recent throughput is {direction} relative to the full window"));
        }
    }

    if analyzed < 30 {
        warnings.push("Small sample size — treat percentiles with caution".to_string());
    }

    warnings
}

fn run_trial(histogram: &Histogram, task: &SimulationTask, expansion_enabled: bool, rng: &mut ChaCha8Rng) -> TrialOutcome {
    match task {
        SimulationTask::Duration { targets } => run_duration_trial(histogram, targets, expansion_enabled, rng),
        SimulationTask::Scope { filter, days } => run_scope_trial(histogram, filter.as_ref(), *days, rng),
    }
}

fn sample_uniform_day(days: usize, rng: &mut ChaCha8Rng) -> usize {
    rng.gen_range(0..days.max(1))
}

fn sample_type_via_distribution(distribution: &[(String, f64)], rng: &mut ChaCha8Rng) -> Option<String> {
    if distribution.is_empty() {
        return None;
    }
    let total: f64 = distribution.iter().map(|(_, p)| p).sum();
    if total <= 0.0 {
        return None;
    }
    let roll = rng.r#gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (t, p) in distribution {
        cumulative += p;
        if roll <= cumulative {
            return Some(t.clone());
        }
    }
    distribution.last().map(|(t, _)| t.clone())
}

fn stochastic_round(value: f64, rng: &mut ChaCha8Rng) -> u32 {
    let floor = value.floor();
    let frac = value - floor;
    let bumped = if rng.r#gen::<f64>() < frac { floor + 1.0 } else { floor };
    bumped.max(0.0) as u32
}

fn is_stratified(histogram: &Histogram, targets: &BTreeMap<String, u32>) -> bool {
    targets
        .keys()
        .any(|t| histogram.meta.eligible_types.get(t).copied().unwrap_or(false))
}

fn run_duration_trial(
    histogram: &Histogram,
    targets: &BTreeMap<String, u32>,
    expansion_enabled: bool,
    rng: &mut ChaCha8Rng,
) -> TrialOutcome {
    let days = histogram.counts.len().max(1);
    let mut background: HashMap<String, u32> = HashMap::new();

    if targets.len() <= 1 && histogram.meta.type_distribution.len() <= 1 {
        let only_target: u32 = targets.values().sum();
        let mut remaining = only_target as i64;
        let mut day = 0u32;
        while remaining > 0 && day < SAFETY_CAP_DAYS {
            let idx = sample_uniform_day(days, rng);
            remaining -= histogram.counts[idx] as i64;
            day += 1;
        }
        return TrialOutcome { value: day as f64, background };
    }

    if is_stratified(histogram, targets) {
        return run_stratified_duration_trial(histogram, targets, rng);
    }

    // Type-mix kernel (§4.7). Closed-system (`expansion_enabled = false`)
    // renormalizes the distribution over target types only.
    let mut distribution: Vec<(String, f64)> = histogram.meta.type_distribution.iter().map(|(t, p)| (t.clone(), *p)).collect();
    distribution.sort_by(|a, b| a.0.cmp(&b.0));
    if !expansion_enabled {
        let target_total: f64 = distribution.iter().filter(|(t, _)| targets.contains_key(t)).map(|(_, p)| p).sum();
        if target_total > 0.0 {
            distribution.retain(|(t, _)| targets.contains_key(t));
            for (_, p) in distribution.iter_mut() {
                *p /= target_total;
            }
        }
    }

    let mut remaining = targets.clone();
    let mut day = 0u32;
    while remaining.values().any(|n| *n > 0) && day < SAFETY_CAP_DAYS {
        let slots = histogram.counts[sample_uniform_day(days, rng)];
        for _ in 0..slots {
            let Some(t) = sample_type_via_distribution(&distribution, rng) else { break };
            match remaining.get_mut(&t) {
                Some(n) if *n > 0 => *n -= 1,
                _ => *background.entry(t).or_insert(0) += 1,
            }
        }
        day += 1;
    }
    TrialOutcome { value: day as f64, background }
}

fn run_stratified_duration_trial(histogram: &Histogram, targets: &BTreeMap<String, u32>, rng: &mut ChaCha8Rng) -> TrialOutcome {
    let capacity_cap = crate::stats::percentile_u32(&histogram.counts, 0.95);
    let mut remaining = targets.clone();
    let mut background: HashMap<String, u32> = HashMap::new();
    let mut day = 0u32;

    while remaining.values().any(|n| *n > 0) && day < SAFETY_CAP_DAYS {
        let mut sampled: HashMap<String, u32> = HashMap::new();
        for t in remaining.keys() {
            let eligible = histogram.meta.eligible_types.get(t).copied().unwrap_or(false);
            let value = if eligible {
                let series = &histogram.stratified_counts[t];
                let n = series.len();
                if n < 30 && rng.r#gen::<f64>() < 0.30 {
                    let overall = histogram.meta.throughput_overall;
                    let share = histogram.meta.type_distribution.get(t).copied().unwrap_or(0.0);
                    (overall * share).round() as u32
                } else {
                    series[sample_uniform_day(n, rng)]
                }
            } else {
                let overall = histogram.meta.throughput_overall;
                let share = histogram.meta.type_distribution.get(t).copied().unwrap_or(0.0);
                (overall * share).round() as u32
            };
            sampled.insert(t.clone(), value);
        }

        for (taxer, taxed) in &histogram.meta.dependencies {
            if let Some(taxer_amount) = sampled.get(taxer).copied() {
                if taxer_amount > 0 {
                    if let Some(taxed_amount) = sampled.get_mut(taxed) {
                        let squeeze = (taxer_amount as f64 * 0.5).floor() as u32;
                        *taxed_amount = taxed_amount.saturating_sub(squeeze);
                    }
                }
            }
        }

        let total: u32 = sampled.values().sum();
        if capacity_cap > 0.0 && total as f64 > capacity_cap {
            let scale = capacity_cap / total as f64;
            for value in sampled.values_mut() {
                *value = stochastic_round(*value as f64 * scale, rng);
            }
        }

        for (t, amount) in sampled {
            let mut left = amount;
            if let Some(need) = remaining.get_mut(&t) {
                let consumed = left.min(*need);
                *need -= consumed;
                left -= consumed;
            }
            if left > 0 {
                *background.entry(t).or_insert(0) += left;
            }
        }
        day += 1;
    }

    TrialOutcome { value: day as f64, background }
}

fn run_scope_trial(
    histogram: &Histogram,
    filter: Option<&std::collections::HashSet<String>>,
    target_days: u32,
    rng: &mut ChaCha8Rng,
) -> TrialOutcome {
    let days = histogram.counts.len().max(1);
    let mut distribution: Vec<(String, f64)> = histogram.meta.type_distribution.iter().map(|(t, p)| (t.clone(), *p)).collect();
    distribution.sort_by(|a, b| a.0.cmp(&b.0));

    let mut scope = 0u32;
    let mut background: HashMap<String, u32> = HashMap::new();

    for _ in 0..target_days {
        let slots = histogram.counts[sample_uniform_day(days, rng)];
        for _ in 0..slots {
            match sample_type_via_distribution(&distribution, rng) {
                Some(t) if filter.map(|f| f.contains(&t)).unwrap_or(true) => scope += 1,
                Some(t) => *background.entry(t).or_insert(0) += 1,
                None => scope += 1,
            }
        }
    }

    TrialOutcome { value: scope as f64, background }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcast_types::HistogramMeta;

    fn flat_histogram(value: u32, days: usize) -> Histogram {
        Histogram {
            counts: vec![value; days],
            stratified_counts: HashMap::new(),
            meta: HistogramMeta {
                throughput_overall: value as f64,
                throughput_recent: value as f64,
                ..Default::default()
            },
        }
    }

    #[test]
    fn flat_throughput_duration_median_matches_backlog_over_rate() {
        let histogram = flat_histogram(1, 30);
        let mut targets = BTreeMap::new();
        targets.insert("*".to_string(), 5);
        let task = SimulationTask::Duration { targets };
        let config = SimulationConfig { trials: 2000, base_seed: 42, ..Default::default() };
        let result = simulate(&histogram, &task, &config);
        assert!((result.percentiles.p50 - 5.0).abs() <= 1.0);
    }

    #[test]
    fn zero_throughput_triggers_infinite_forecast_warning() {
        let histogram = flat_histogram(0, 10);
        let mut targets = BTreeMap::new();
        targets.insert("*".to_string(), 10);
        let task = SimulationTask::Duration { targets };
        let config = SimulationConfig { trials: 200, base_seed: 1, ..Default::default() };
        let result = simulate(&histogram, &task, &config);
        assert_eq!(result.percentiles.p50, SAFETY_CAP_DAYS as f64);
        assert!(result.warnings.iter().any(|w| w.contains("infinite")));
    }

    #[test]
    fn percentiles_are_monotone_in_duration_mode() {
        let histogram = flat_histogram(2, 60);
        let mut targets = BTreeMap::new();
        targets.insert("*".to_string(), 30);
        let task = SimulationTask::Duration { targets };
        let config = SimulationConfig { trials: 1000, base_seed: 7, ..Default::default() };
        let result = simulate(&histogram, &task, &config);
        let p = result.percentiles;
        assert!(p.p10 <= p.p30 && p.p30 <= p.p50 && p.p50 <= p.p70 && p.p70 <= p.p85 && p.p85 <= p.p90 && p.p90 <= p.p95 && p.p95 <= p.p98);
    }

    #[test]
    fn identical_seed_is_bit_identical_across_runs() {
        let histogram = flat_histogram(3, 45);
        let mut targets = BTreeMap::new();
        targets.insert("*".to_string(), 15);
        let task = SimulationTask::Duration { targets };
        let config = SimulationConfig { trials: 500, base_seed: 99, ..Default::default() };
        let a = simulate(&histogram, &task, &config);

        let mut targets2 = BTreeMap::new();
        targets2.insert("*".to_string(), 15);
        let task2 = SimulationTask::Duration { targets: targets2 };
        let b = simulate(&histogram, &task2, &config);
        assert_eq!(a.percentiles.p50, b.percentiles.p50);
        assert_eq!(a.percentiles.p98, b.percentiles.p98);
    }
}
