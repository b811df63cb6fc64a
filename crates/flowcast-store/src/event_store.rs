use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use flowcast_types::IssueEvent;

use crate::error::Result;

/// Outcome of loading one source's log file.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loaded: usize,
    /// One entry per skipped malformed line (§4.1 "malformed record => skip + warning").
    pub warnings: Vec<String>,
}

struct SourceLog {
    events: Vec<IssueEvent>,
    path: PathBuf,
}

/// Append-only per-source event store (§4.1).
///
/// Each source is identified by an opaque ID and backed by
/// `<dir>/<source_id>.jsonl`. A missing file is an empty source, never a
/// fatal error; a malformed line is skipped with a warning rather than
/// aborting the whole load. Per-source state is held behind its own `Mutex`
/// so appends and range queries against different sources never contend,
/// while operations on the same source serialise (§5).
pub struct EventStore {
    sources: RwLock<HashMap<String, Mutex<SourceLog>>>,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
        }
    }

    /// Load `<dir>/<source_id>.jsonl` into memory, sorted by timestamp
    /// ascending with ties broken by file order (§4.1 ordering guarantee).
    pub fn load(&self, dir: &Path, source_id: &str) -> Result<LoadReport> {
        let path = dir.join(format!("{source_id}.jsonl"));
        let mut report = LoadReport::default();
        let mut events = Vec::new();

        if path.exists() {
            let file = std::fs::File::open(&path)?;
            for (line_no, line) in BufReader::new(file).lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<IssueEvent>(&line) {
                    Ok(event) => events.push(event),
                    Err(err) => report.warnings.push(format!(
                        "{}:{}: skipped malformed event record: {}",
                        path.display(),
                        line_no + 1,
                        err
                    )),
                }
            }
        }

        stable_sort_by_timestamp(&mut events);
        report.loaded = events.len();

        let mut sources = self.sources.write().expect("event store lock poisoned");
        sources.insert(
            source_id.to_string(),
            Mutex::new(SourceLog { events, path }),
        );
        Ok(report)
    }

    /// Append `events` to the source's log file and in-memory buffer.
    pub fn append(&self, dir: &Path, source_id: &str, events: &[IssueEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut sources = self.sources.write().expect("event store lock poisoned");
        let entry = sources.entry(source_id.to_string()).or_insert_with(|| {
            Mutex::new(SourceLog {
                events: Vec::new(),
                path: dir.join(format!("{source_id}.jsonl")),
            })
        });
        let mut log = entry.lock().expect("source log lock poisoned");

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log.path)?;
        for event in events {
            let line = serde_json::to_string(event)?;
            writeln!(file, "{line}")?;
        }

        log.events.extend(events.iter().cloned());
        stable_sort_by_timestamp(&mut log.events);
        Ok(())
    }

    /// Events with `from <= timestamp < to`. Zero on either bound means
    /// unbounded on that side (§4.1).
    pub fn get_events_in_range(&self, source_id: &str, from: i64, to: i64) -> Vec<IssueEvent> {
        let sources = self.sources.read().expect("event store lock poisoned");
        let Some(log) = sources.get(source_id) else {
            return Vec::new();
        };
        let log = log.lock().expect("source log lock poisoned");
        log.events
            .iter()
            .filter(|e| (from == 0 || e.timestamp >= from) && (to == 0 || e.timestamp < to))
            .cloned()
            .collect()
    }

    pub fn get_latest_timestamp(&self, source_id: &str) -> Option<i64> {
        let sources = self.sources.read().expect("event store lock poisoned");
        let log = sources.get(source_id)?.lock().expect("source log lock poisoned");
        log.events.last().map(|e| e.timestamp)
    }

    pub fn count(&self, source_id: &str) -> usize {
        let sources = self.sources.read().expect("event store lock poisoned");
        sources
            .get(source_id)
            .map(|log| log.lock().expect("source log lock poisoned").events.len())
            .unwrap_or(0)
    }
}

/// Stable sort by timestamp — `sort_by_key` is documented stable, so equal
/// timestamps retain their relative (per-issue insertion) order.
fn stable_sort_by_timestamp(events: &mut [IssueEvent]) {
    events.sort_by_key(|e| e.timestamp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcast_types::EventType;
    use tempfile::TempDir;

    fn event(key: &str, ts: i64) -> IssueEvent {
        IssueEvent {
            issue_key: key.to_string(),
            issue_type: "Story".to_string(),
            event_type: EventType::Change,
            from_status: None,
            from_status_id: None,
            to_status: Some("In Progress".to_string()),
            to_status_id: None,
            resolution: None,
            flagged: None,
            is_healed: false,
            timestamp: ts,
        }
    }

    #[test]
    fn missing_source_loads_as_empty_not_fatal() {
        let dir = TempDir::new().unwrap();
        let store = EventStore::new();
        let report = store.load(dir.path(), "absent-source").unwrap();
        assert_eq!(report.loaded, 0);
        assert!(report.warnings.is_empty());
        assert_eq!(store.count("absent-source"), 0);
    }

    #[test]
    fn malformed_line_is_skipped_with_warning() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proj.jsonl");
        std::fs::write(
            &path,
            format!(
                "{}\nnot json\n{}\n",
                serde_json::to_string(&event("PROJ-1", 1)).unwrap(),
                serde_json::to_string(&event("PROJ-1", 2)).unwrap(),
            ),
        )
        .unwrap();

        let store = EventStore::new();
        let report = store.load(dir.path(), "proj").unwrap();
        assert_eq!(report.loaded, 2);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn range_query_is_half_open_with_zero_meaning_unbounded() {
        let dir = TempDir::new().unwrap();
        let store = EventStore::new();
        store.append(dir.path(), "proj", &[event("PROJ-1", 10), event("PROJ-1", 20), event("PROJ-1", 30)]).unwrap();

        let all = store.get_events_in_range("proj", 0, 0);
        assert_eq!(all.len(), 3);

        let mid = store.get_events_in_range("proj", 10, 30);
        assert_eq!(mid.iter().map(|e| e.timestamp).collect::<Vec<_>>(), vec![10, 20]);

        assert_eq!(store.get_latest_timestamp("proj"), Some(30));
    }

    #[test]
    fn append_persists_to_disk_for_later_load() {
        let dir = TempDir::new().unwrap();
        let store = EventStore::new();
        store.append(dir.path(), "proj", &[event("PROJ-1", 5)]).unwrap();

        let reloaded = EventStore::new();
        let report = reloaded.load(dir.path(), "proj").unwrap();
        assert_eq!(report.loaded, 1);
    }
}
