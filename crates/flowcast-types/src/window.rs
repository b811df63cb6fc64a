use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Granularity the window is subdivided into (§3 `AnalysisWindow`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Day,
    Week,
    Month,
}

/// Normalized `(start, end, bucket, cutoff)` value type (§4.3).
///
/// Construction snaps `start`/`end` to bucket boundaries and clamps `cutoff`
/// against `end` (§7 `WindowConflict`). All other behavior (`subdivide`,
/// `find_bucket_index`, `is_partial`, `bucket_label`, `active_day_count`) is
/// pure and side-effect free.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub bucket: Bucket,
    pub cutoff: Option<DateTime<Utc>>,
}

impl AnalysisWindow {
    /// Build a window, snapping `start`/`end` to bucket boundaries and
    /// clamping a `cutoff` that falls after `end`. Returns any warnings
    /// generated by the clamp (§7 `WindowConflict`).
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket: Bucket,
        cutoff: Option<DateTime<Utc>>,
    ) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();

        let snapped_end = snap_end(end, bucket);
        let mut effective_cutoff = cutoff;
        if let Some(c) = cutoff {
            if c > snapped_end {
                warnings.push(
                    "analysis window cutoff is after the window end; clamped to end".to_string(),
                );
                effective_cutoff = Some(snapped_end);
            }
        }

        let snapped_start = snap_start(start, bucket);
        let effective_start = match effective_cutoff {
            Some(c) if c > snapped_start => snap_start(c, bucket),
            _ => snapped_start,
        };

        (
            Self {
                start: effective_start,
                end: snapped_end,
                bucket,
                cutoff: effective_cutoff,
            },
            warnings,
        )
    }

    /// Number of whole calendar days spanned by `[start, end]`, inclusive.
    pub fn day_count(&self) -> i64 {
        (self.end.date_naive() - self.start.date_naive()).num_days() + 1
    }

    /// End-of-bucket instant for the bucket starting at `bucket_start`.
    pub fn bucket_end(&self, bucket_start: DateTime<Utc>) -> DateTime<Utc> {
        snap_end(bucket_start, self.bucket)
    }

    /// Exhaustive, non-overlapping list of bucket start instants covering
    /// `[start, end]`. First element is always `start`.
    pub fn subdivide(&self) -> Vec<DateTime<Utc>> {
        let mut buckets = Vec::new();
        let mut cursor = self.start;
        while cursor <= self.end {
            buckets.push(cursor);
            cursor = next_bucket_start(cursor, self.bucket);
        }
        buckets
    }

    /// Index of the bucket containing `t` within `subdivide()`'s result,
    /// computed via calendar arithmetic (never a linear scan).
    pub fn find_bucket_index(&self, t: DateTime<Utc>) -> Option<usize> {
        if t < self.start || t > self.end {
            return None;
        }
        let index = match self.bucket {
            Bucket::Day => (t.date_naive() - self.start.date_naive()).num_days(),
            Bucket::Week => {
                let weeks = (t.date_naive() - self.start.date_naive()).num_days() / 7;
                weeks
            }
            Bucket::Month => {
                let months_t = t.year() as i64 * 12 + t.month() as i64;
                let months_start = self.start.year() as i64 * 12 + self.start.month() as i64;
                months_t - months_start
            }
        };
        usize::try_from(index).ok()
    }

    /// True if `bucket_start`'s bucket has not fully elapsed as of `now`
    /// (the "Tuesday Problem" guard — a bucket in progress would otherwise
    /// dilute throughput stats).
    pub fn is_partial(&self, bucket_start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now >= bucket_start && now <= self.bucket_end(bucket_start)
    }

    /// Count of days excluding the partial trailing bucket.
    pub fn active_day_count(&self, now: DateTime<Utc>) -> i64 {
        let buckets = self.subdivide();
        let partial = buckets
            .last()
            .map(|b| self.is_partial(*b, now))
            .unwrap_or(false);
        let full_buckets = if partial {
            buckets.len().saturating_sub(1)
        } else {
            buckets.len()
        };
        match self.bucket {
            Bucket::Day => full_buckets as i64,
            Bucket::Week => full_buckets as i64 * 7,
            Bucket::Month => {
                // Approximate via actual elapsed days between bucket starts.
                if full_buckets == 0 {
                    0
                } else {
                    let last_full_start = buckets[full_buckets - 1];
                    (last_full_start.date_naive() - self.start.date_naive()).num_days()
                        + days_in_month(last_full_start)
                }
            }
        }
    }

    /// Human label for the bucket starting at `bucket_start` (`YYYY-MM-DD`,
    /// ISO `YYYY-Www`, or `YYYY-MM`).
    pub fn bucket_label(&self, bucket_start: DateTime<Utc>) -> String {
        match self.bucket {
            Bucket::Day => bucket_start.format("%Y-%m-%d").to_string(),
            Bucket::Week => {
                let iso = bucket_start.iso_week();
                format!("{}-W{:02}", iso.year(), iso.week())
            }
            Bucket::Month => bucket_start.format("%Y-%m").to_string(),
        }
    }
}

fn snap_start(t: DateTime<Utc>, bucket: Bucket) -> DateTime<Utc> {
    match bucket {
        Bucket::Day => start_of_day(t),
        Bucket::Week => start_of_day(t - Duration::days(t.weekday().num_days_from_monday() as i64)),
        Bucket::Month => {
            let naive = NaiveDate::from_ymd_opt(t.year(), t.month(), 1).expect("valid date");
            Utc.from_utc_datetime(&naive.and_hms_opt(0, 0, 0).expect("valid time"))
        }
    }
}

fn snap_end(t: DateTime<Utc>, bucket: Bucket) -> DateTime<Utc> {
    match bucket {
        Bucket::Day => end_of_day(t),
        Bucket::Week => {
            let start = snap_start(t, Bucket::Week);
            end_of_day(start + Duration::days(6))
        }
        Bucket::Month => {
            let first_of_month = snap_start(t, Bucket::Month);
            let days = days_in_month(first_of_month);
            end_of_day(first_of_month + Duration::days(days - 1))
        }
    }
}

fn next_bucket_start(t: DateTime<Utc>, bucket: Bucket) -> DateTime<Utc> {
    match bucket {
        Bucket::Day => start_of_day(t) + Duration::days(1),
        Bucket::Week => start_of_day(t) + Duration::days(7),
        Bucket::Month => {
            let days = days_in_month(snap_start(t, Bucket::Month));
            snap_start(t, Bucket::Month) + Duration::days(days)
        }
    }
}

fn start_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&t.date_naive().and_hms_opt(0, 0, 0).expect("valid time"))
}

fn end_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(
        &t.date_naive()
            .and_hms_nano_opt(23, 59, 59, 999_999_999)
            .expect("valid time"),
    )
}

fn days_in_month(first_of_month: DateTime<Utc>) -> i64 {
    let (next_year, next_month) = if first_of_month.month() == 12 {
        (first_of_month.year() + 1, 1)
    } else {
        (first_of_month.year(), first_of_month.month() + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1).expect("valid date");
    (first_of_next - first_of_month.date_naive()).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn day_bucket_snaps_to_midnight_boundaries() {
        let (w, warnings) = AnalysisWindow::new(dt(2024, 3, 5, 14), dt(2024, 3, 5, 16), Bucket::Day, None);
        assert!(warnings.is_empty());
        assert_eq!(w.start, dt(2024, 3, 5, 0));
        assert_eq!(w.end.date_naive(), dt(2024, 3, 5, 0).date_naive());
    }

    #[test]
    fn subdivide_is_exhaustive_and_non_overlapping() {
        let (w, _) = AnalysisWindow::new(dt(2024, 3, 1, 0), dt(2024, 3, 10, 0), Bucket::Day, None);
        let buckets = w.subdivide();
        assert_eq!(buckets.first().copied(), Some(w.start));
        let last = *buckets.last().unwrap();
        assert!(w.bucket_end(last) >= w.end);
        for pair in buckets.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn cutoff_past_end_is_clamped_with_warning() {
        let (w, warnings) = AnalysisWindow::new(
            dt(2024, 1, 1, 0),
            dt(2024, 1, 10, 0),
            Bucket::Day,
            Some(dt(2024, 2, 1, 0)),
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(w.cutoff, Some(w.end));
    }

    #[test]
    fn find_bucket_index_is_calendar_arithmetic() {
        let (w, _) = AnalysisWindow::new(dt(2024, 3, 1, 0), dt(2024, 3, 31, 0), Bucket::Day, None);
        assert_eq!(w.find_bucket_index(dt(2024, 3, 1, 5)), Some(0));
        assert_eq!(w.find_bucket_index(dt(2024, 3, 5, 5)), Some(4));
    }
}
