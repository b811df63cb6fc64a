use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use flowcast_types::{DomainIssue, EventType, IssueEvent, Transition};

/// Predicate answering "is this status Finished-tier", keyed ID-first with a
/// name fallback (§9). Callers typically build this from a `WorkflowMapping`
/// via `flowcast_core::lookup_status`.
pub type IsFinished<'a> = dyn Fn(Option<&str>, &str) -> bool + 'a;

pub struct ReconstructOptions<'a> {
    pub reference_time: DateTime<Utc>,
    pub is_finished_status: Option<&'a IsFinished<'a>>,
}

impl<'a> Default for ReconstructOptions<'a> {
    fn default() -> Self {
        Self {
            reference_time: Utc::now(),
            is_finished_status: None,
        }
    }
}

fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(micros).single().unwrap_or(Utc::now())
}

/// Fold one issue's chronologically-ordered event stream into a `DomainIssue`
/// (§4.2). Returns `None` if `events` is empty.
pub fn reconstruct_issue(events: &[IssueEvent], options: &ReconstructOptions) -> Option<DomainIssue> {
    let first = events.first()?;

    let mut current_status = first
        .to_status
        .clone()
        .or_else(|| first.from_status.clone())
        .unwrap_or_default();
    let mut current_status_id = first.to_status_id.clone().or_else(|| first.from_status_id.clone());

    let mut created: Option<DateTime<Utc>> = None;
    let mut has_synthetic_birth = true;
    let mut birth_status: Option<String> = None;
    let mut birth_status_id: Option<String> = None;

    let mut flagged = false;
    let mut flag_open: Option<DateTime<Utc>> = None;
    let mut flagged_intervals: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();

    let mut transitions: Vec<Transition> = Vec::new();
    let mut is_moved = false;
    let mut move_anchor: Option<DateTime<Utc>> = None;
    let mut status_at_anchor: Option<String> = None;

    // (timestamp, Some(resolution) for a resolving event, None for an
    // explicit "unresolved" marker) — kept in order and replayed in a
    // post-pass (§9 Open Question #2) rather than threaded as mutable state.
    let mut resolution_signals: Vec<(DateTime<Utc>, Option<String>)> = Vec::new();

    for event in events {
        let t = micros_to_datetime(event.timestamp);

        if event.event_type == EventType::Created {
            if created.is_none() {
                created = Some(t);
                has_synthetic_birth = false;
                birth_status = event.to_status.clone().or_else(|| event.from_status.clone());
                birth_status_id = event.to_status_id.clone().or_else(|| event.from_status_id.clone());
            }
        }

        if event.has_transition() {
            let to_status = event.to_status.clone().unwrap();
            transitions.push(Transition {
                from_status: event.from_status.clone(),
                from_status_id: event.from_status_id.clone(),
                to_status: to_status.clone(),
                to_status_id: event.to_status_id.clone(),
                timestamp: t,
            });
            current_status = to_status;
            current_status_id = event.to_status_id.clone();
        }

        if event.event_type == EventType::Created && event.is_healed {
            is_moved = true;
            move_anchor = Some(t);
            status_at_anchor = Some(current_status.clone());
        }

        if event.marks_resolved() {
            resolution_signals.push((t, event.resolution.clone()));
        } else if event.marks_unresolved() {
            resolution_signals.push((t, None));
        }

        if event.opens_flag() {
            flag_open = Some(t);
            flagged = true;
        } else if event.closes_flag() {
            if let Some(open) = flag_open.take() {
                flagged_intervals.push((open, t));
            }
            flagged = false;
        }
    }

    if let Some(open) = flag_open {
        flagged_intervals.push((open, options.reference_time));
    }

    let created = created.unwrap_or_else(|| micros_to_datetime(first.timestamp));
    if birth_status.is_none() {
        birth_status = first.to_status.clone().or_else(|| first.from_status.clone());
        birth_status_id = first.to_status_id.clone().or_else(|| first.from_status_id.clone());
    }

    let updated = micros_to_datetime(events.last().unwrap().timestamp);

    // --- resolution date (post-pass, §9 Open Question #2) ---
    let mut resolution: Option<String> = None;
    let mut resolution_date: Option<DateTime<Utc>> = None;
    for (t, value) in &resolution_signals {
        resolution = value.clone();
        resolution_date = value.as_ref().map(|_| *t);
    }

    let is_finished_now = options
        .is_finished_status
        .map(|f| f(current_status_id.as_deref(), &current_status))
        .unwrap_or(false);

    if let Some(is_finished) = options.is_finished_status {
        if !is_finished(current_status_id.as_deref(), &current_status) {
            resolution_date = None;
        } else if resolution_date.is_none() {
            resolution_date = Some(synthesize_finished_streak_start(
                &transitions,
                created,
                is_finished,
            ));
        }
    }
    let _ = is_finished_now;

    // --- residency (§4.2 step 7-8) ---
    let residency_start = move_anchor.unwrap_or(created);
    let stop_clock_at = resolution_date.unwrap_or(options.reference_time);
    let relevant_transitions: Vec<&Transition> = transitions
        .iter()
        .filter(|t| t.timestamp >= residency_start)
        .collect();

    let segments = build_segments(
        &relevant_transitions,
        status_at_anchor.clone(),
        residency_start,
        &current_status,
    );

    let (status_residency, segment_spans) =
        compute_status_residency(&segments, stop_clock_at, options.is_finished_status);
    let blocked_residency = compute_blocked_residency(&segment_spans, &flagged_intervals, &status_residency);

    Some(DomainIssue {
        key: first.issue_key.clone(),
        issue_type: first.issue_type.clone(),
        status: current_status,
        status_id: current_status_id,
        resolution,
        resolution_date,
        created,
        updated,
        birth_status,
        birth_status_id,
        transitions,
        status_residency,
        blocked_residency,
        flagged,
        is_moved,
        has_synthetic_birth,
        is_subtask: is_subtask_type(&first.issue_type),
        project_key: project_key_of(&first.issue_key),
    })
}

/// Group `events` by `issue_key` and reconstruct every issue as of
/// `options.reference_time`, without any window-based filtering. Used
/// wherever a full issue population is needed outside the tier-projection
/// pipeline (e.g. walk-forward checkpoints).
pub fn reconstruct_all(events: &[IssueEvent], options: &ReconstructOptions) -> Vec<DomainIssue> {
    let mut by_key: HashMap<&str, Vec<IssueEvent>> = HashMap::new();
    for event in events {
        by_key.entry(event.issue_key.as_str()).or_default().push(event.clone());
    }
    by_key
        .values()
        .filter_map(|issue_events| reconstruct_issue(issue_events, options))
        .collect()
}

fn is_subtask_type(issue_type: &str) -> bool {
    let lower = issue_type.to_lowercase();
    lower.contains("sub-task") || lower.contains("subtask")
}

fn project_key_of(issue_key: &str) -> Option<String> {
    issue_key.split('-').next().map(|s| s.to_string())
}

/// Walk from `created` along `transitions`, finding the start of the
/// contiguous run of finished-tier statuses ending at `current_status`.
fn synthesize_finished_streak_start(
    transitions: &[Transition],
    created: DateTime<Utc>,
    is_finished: &IsFinished,
) -> DateTime<Utc> {
    let mut streak_start = transitions.last().map(|t| t.timestamp).unwrap_or(created);
    for t in transitions.iter().rev() {
        if is_finished(t.to_status_id.as_deref(), &t.to_status) {
            streak_start = t.timestamp;
        } else {
            break;
        }
    }
    streak_start
}

struct Segment {
    status: String,
    start: DateTime<Utc>,
}

fn build_segments(
    relevant_transitions: &[&Transition],
    status_at_anchor: Option<String>,
    residency_start: DateTime<Utc>,
    fallback_status: &str,
) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor_status = status_at_anchor;
    let mut cursor_time = residency_start;

    for t in relevant_transitions {
        if let Some(status) = cursor_status.take() {
            segments.push(Segment { status, start: cursor_time });
        }
        cursor_status = Some(t.to_status.clone());
        cursor_time = t.timestamp;
    }
    if let Some(status) = cursor_status {
        segments.push(Segment { status, start: cursor_time });
    }
    if segments.is_empty() {
        segments.push(Segment {
            status: fallback_status.to_string(),
            start: residency_start,
        });
    }
    segments
}

/// Returns per-status residency seconds and the concrete `(status, start,
/// end)` spans used to compute it (needed again for blocked-residency
/// intersection).
fn compute_status_residency(
    segments: &[Segment],
    stop_clock_at: DateTime<Utc>,
    is_finished: Option<&IsFinished>,
) -> (HashMap<String, i64>, Vec<(String, DateTime<Utc>, DateTime<Utc>)>) {
    let mut residency: HashMap<String, i64> = HashMap::new();
    let mut spans = Vec::new();

    for (i, seg) in segments.iter().enumerate() {
        let mut end = segments
            .get(i + 1)
            .map(|next| next.start)
            .unwrap_or(stop_clock_at);
        if end < seg.start {
            end = seg.start;
        }
        let mut duration = (end - seg.start).num_seconds();
        if duration <= 0 {
            duration = 1;
        }
        *residency.entry(seg.status.clone()).or_insert(0) += duration;
        spans.push((seg.status.clone(), seg.start, end));

        let finished = is_finished.map(|f| f(None, &seg.status)).unwrap_or(false);
        if finished {
            break;
        }
    }

    (residency, spans)
}

fn compute_blocked_residency(
    spans: &[(String, DateTime<Utc>, DateTime<Utc>)],
    flagged_intervals: &[(DateTime<Utc>, DateTime<Utc>)],
    status_residency: &HashMap<String, i64>,
) -> HashMap<String, i64> {
    let mut blocked: HashMap<String, i64> = HashMap::new();
    for (status, start, end) in spans {
        let mut overlap = 0i64;
        for (fstart, fend) in flagged_intervals {
            let lo = (*start).max(*fstart);
            let hi = (*end).min(*fend);
            if hi > lo {
                overlap += (hi - lo).num_seconds();
            }
        }
        if overlap > 0 {
            *blocked.entry(status.clone()).or_insert(0) += overlap;
        }
    }
    // Invariant (§8-2): blocked_residency[s] <= status_residency[s].
    for (status, seconds) in blocked.iter_mut() {
        if let Some(cap) = status_residency.get(status) {
            if *seconds > *cap {
                *seconds = *cap;
            }
        }
    }
    blocked
}
