//! Request throttling.
//!
//! The [`FreshnessGate`] decides from a persisted timestamp whether remote
//! data must be fetched again or the cached snapshot may be reused. At most
//! one fetch is permitted per throttle window.
//!
//! # File format
//!
//! `request.lock` holds a single RFC 3339 timestamp with nanosecond
//! precision, e.g. `2024-03-01T09:15:02.123456789Z`. Older lock files written
//! as naive local time (`2024-03-01 09:15:02.123456`) are still accepted.
//! Anything else is treated as absent, which forces a fetch.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeDelta, TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::CacheConfig;
use crate::models::FetchState;
use crate::persist;

const LEGACY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Returns `true` when a fetch is due.
///
/// A fetch is due on first run (`last_fetch_time` absent) or once at least
/// `limit` of wall-clock time has elapsed since the last fetch. A clock that
/// went backwards counts as no time elapsed.
pub fn should_refetch(
    now: DateTime<Utc>,
    last_fetch_time: Option<DateTime<Utc>>,
    limit: Duration,
) -> bool {
    let Some(last) = last_fetch_time else {
        return true;
    };
    let limit = TimeDelta::from_std(limit).unwrap_or(TimeDelta::MAX);
    now.signed_duration_since(last) >= limit
}

/// Persistent throttle state for one cache directory.
#[derive(Debug, Clone)]
pub struct FreshnessGate {
    path: PathBuf,
    window: Duration,
}

impl FreshnessGate {
    pub fn new(path: impl Into<PathBuf>, window: Duration) -> Self {
        Self {
            path: path.into(),
            window,
        }
    }

    pub fn from_config(cache: &CacheConfig) -> Self {
        Self::new(cache.request_lock_path(), cache.throttle_window())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Read the persisted fetch state. Missing or corrupt files yield `None`.
    pub fn load(&self) -> Option<FetchState> {
        let raw = persist::read_optional(&self.path)?;
        match parse_timestamp(&raw) {
            Some(last_fetch_time) => Some(FetchState { last_fetch_time }),
            None => {
                tracing::warn!(
                    path = %self.path.display(),
                    "unparsable fetch timestamp, treating as first run"
                );
                None
            }
        }
    }

    pub fn should_refetch(&self, now: DateTime<Utc>) -> bool {
        let last = self.load().map(|s| s.last_fetch_time);
        let due = should_refetch(now, last, self.window);
        tracing::debug!(?last, %now, due, "freshness check");
        due
    }

    /// Persist `now` as the last fetch time.
    ///
    /// The stored value never moves backwards: if the file already holds a
    /// later instant, that instant is kept and returned.
    pub fn record(&self, now: DateTime<Utc>) -> Result<FetchState> {
        let last_fetch_time = match self.load() {
            Some(prev) if prev.last_fetch_time > now => prev.last_fetch_time,
            _ => now,
        };

        persist::write_atomic(&self.path, format_timestamp(last_fetch_time).as_bytes())
            .with_context(|| "Failed to record fetch time")?;

        Ok(FetchState { last_fetch_time })
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, LEGACY_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn gate(tmp: &TempDir) -> FreshnessGate {
        FreshnessGate::new(tmp.path().join("request.lock"), HOUR)
    }

    #[test]
    fn test_first_run_refetches() {
        assert!(should_refetch(Utc::now(), None, HOUR));
    }

    #[test]
    fn test_zero_elapsed_does_not_refetch() {
        let now = Utc::now();
        assert!(!should_refetch(now, Some(now), HOUR));
    }

    #[test]
    fn test_threshold_is_inclusive_and_monotonic() {
        let last = Utc::now();
        let limit = Duration::from_secs(20 * 60);
        let mut previous = false;
        for minutes in 0..=40 {
            let now = last + TimeDelta::minutes(minutes);
            let due = should_refetch(now, Some(last), limit);
            assert_eq!(due, minutes >= 20, "elapsed {} minutes", minutes);
            assert!(due || !previous, "decision must be monotonic in elapsed time");
            previous = due;
        }
    }

    #[test]
    fn test_clock_skew_does_not_refetch() {
        let last = Utc::now();
        let now = last - TimeDelta::minutes(90);
        assert!(!should_refetch(now, Some(last), HOUR));
    }

    #[test]
    fn test_gate_without_file_refetches() {
        let tmp = TempDir::new().unwrap();
        let g = gate(&tmp);
        assert!(g.load().is_none());
        assert!(g.should_refetch(Utc::now()));
    }

    #[test]
    fn test_record_then_check_same_instant() {
        let tmp = TempDir::new().unwrap();
        let g = gate(&tmp);
        let now = Utc::now();
        g.record(now).unwrap();
        assert!(!g.should_refetch(now));
        assert!(g.should_refetch(now + TimeDelta::hours(1)));
    }

    #[test]
    fn test_round_trip_preserves_timestamp() {
        let tmp = TempDir::new().unwrap();
        let g = gate(&tmp);
        let now = Utc::now();
        g.record(now).unwrap();
        assert_eq!(g.load().unwrap().last_fetch_time, now);
    }

    #[test]
    fn test_record_never_moves_backwards() {
        let tmp = TempDir::new().unwrap();
        let g = gate(&tmp);
        let later = Utc::now();
        let earlier = later - TimeDelta::minutes(5);

        g.record(later).unwrap();
        let state = g.record(earlier).unwrap();
        assert_eq!(state.last_fetch_time, later);
        assert_eq!(g.load().unwrap().last_fetch_time, later);
    }

    #[test]
    fn test_corrupt_file_treated_as_absent() {
        let tmp = TempDir::new().unwrap();
        let g = gate(&tmp);
        std::fs::write(g.path(), "not a timestamp").unwrap();
        assert!(g.load().is_none());
        assert!(g.should_refetch(Utc::now()));
    }

    #[test]
    fn test_legacy_naive_format_accepted() {
        let parsed = parse_timestamp("2020-05-17 10:31:07.123456\n");
        assert!(parsed.is_some());
    }
}
