//! Due-check bookkeeping for the six digest cadences. Tracks the instant
//! each cadence last ran and decides, tick by tick, which cadences have
//! crossed into a new window. State is kept both on local disk (atomic
//! temp-file + rename, surviving a coordination-store outage) and in the
//! coordination store (so a second daemon instance, or a dashboard, can see
//! the same history).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Timelike, Utc};
use sentinel_core::atomic::write_atomic;
use sentinel_core::config::Schedule;
use tracing::warn;

use crate::error::Result;
use crate::types::SchedulerState;

/// Truncate `at` to the start of the `period_hours`-hour window containing
/// it, anchored at midnight UTC (e.g. `period_hours=4` yields windows
/// starting at 00:00, 04:00, 08:00, ...).
fn window_start(at: DateTime<Utc>, period_hours: i64) -> DateTime<Utc> {
    let day_start = at.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
    let hour_bucket = (at.hour() as i64 / period_hours) * period_hours;
    day_start + chrono::Duration::hours(hour_bucket)
}

pub struct DigestScheduler {
    state: SchedulerState,
    state_path: PathBuf,
}

impl DigestScheduler {
    /// Load persisted state from `state_path`, tolerating a missing or
    /// corrupt file (fresh install, or a crash mid-write before the first
    /// successful `save`).
    pub fn load(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let state = std::fs::read_to_string(&state_path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self { state, state_path }
    }

    pub fn last_run(&self, schedule: Schedule) -> Option<DateTime<Utc>> {
        self.state.last_run.get(&schedule).copied()
    }

    /// Record that `schedule` ran at `at`. Callers persist immediately
    /// after (before attempting delivery) so a crash mid-send can never
    /// cause the same window to be processed twice.
    pub fn mark_run(&mut self, schedule: Schedule, at: DateTime<Utc>) {
        self.state.last_run.insert(schedule, at);
    }

    pub fn save(&self) -> Result<()> {
        let raw = serde_json::to_vec_pretty(&self.state)?;
        write_atomic(&self.state_path, &raw)?;
        Ok(())
    }

    #[cfg(test)]
    fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// True if `schedule` has crossed into a new window since its last run,
    /// given the plurality-resolved `daily_hour` / `weekly_day` /
    /// `weekly_hour` for this tick's discovery pass. A cold start (no prior
    /// run) only fires in the first few minutes of the window, so a daemon
    /// restarted mid-hour doesn't immediately re-run every cadence.
    pub fn is_due(
        &self,
        schedule: Schedule,
        now: DateTime<Utc>,
        daily_hour: u8,
        weekly_day: u8,
        weekly_hour: u8,
    ) -> bool {
        let last_run = self.last_run(schedule);
        match schedule {
            Schedule::Hourly | Schedule::Every4h | Schedule::Every6h | Schedule::Every12h => {
                let period = schedule.window_hours();
                match last_run {
                    // Cold start only fires right at an anchor hour (e.g. for
                    // every_4h: 0/4/8/12/16/20), not at every hour's first few
                    // minutes — otherwise a restart at, say, 02:03 would wrongly
                    // treat 02:00 as a window boundary.
                    None => window_start(now, period).hour() == now.hour() && now.minute() < 5,
                    Some(lr) => window_start(lr, period) < window_start(now, period),
                }
            }
            Schedule::Daily => {
                if now.hour() as u8 != daily_hour {
                    return false;
                }
                match last_run {
                    None => true,
                    Some(lr) => lr.date_naive() < now.date_naive(),
                }
            }
            Schedule::Weekly => {
                if now.weekday().num_days_from_monday() as u8 != weekly_day || now.hour() as u8 != weekly_hour {
                    return false;
                }
                match last_run {
                    None => true,
                    Some(lr) => now.signed_duration_since(lr) >= chrono::Duration::days(6),
                }
            }
            Schedule::None => false,
        }
    }
}

/// Pick the most common value in `values`, warning if more than one value
/// is present (spec's "entities disagree" case — resolved by plurality,
/// ties broken toward the smallest value for determinism).
pub fn plurality(values: impl Iterator<Item = u8>, field: &str) -> u8 {
    let mut counts: std::collections::BTreeMap<u8, usize> = std::collections::BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    if counts.len() > 1 {
        warn!(field, ?counts, "digest entities disagree on cadence parameter, picking plurality");
    }
    counts
        .into_iter()
        .max_by_key(|&(value, count)| (count, std::cmp::Reverse(value)))
        .map(|(value, _)| value)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_start_hourly_due_only_in_first_minutes() {
        let dir = tempfile::tempdir().unwrap();
        let sched = DigestScheduler::load(dir.path().join("state.json"));
        let early = "2026-01-01T09:03:00Z".parse().unwrap();
        let late = "2026-01-01T09:40:00Z".parse().unwrap();
        assert!(sched.is_due(Schedule::Hourly, early, 8, 0, 8));
        assert!(!sched.is_due(Schedule::Hourly, late, 8, 0, 8));
    }

    #[test]
    fn marking_a_run_blocks_the_same_window_but_not_the_next() {
        let dir = tempfile::tempdir().unwrap();
        let mut sched = DigestScheduler::load(dir.path().join("state.json"));
        let t0 = "2026-01-01T09:03:00Z".parse().unwrap();
        sched.mark_run(Schedule::Hourly, t0);

        let still_same_hour = "2026-01-01T09:50:00Z".parse().unwrap();
        assert!(!sched.is_due(Schedule::Hourly, still_same_hour, 8, 0, 8));

        let next_hour = "2026-01-01T10:05:00Z".parse().unwrap();
        assert!(sched.is_due(Schedule::Hourly, next_hour, 8, 0, 8));
    }

    #[test]
    fn every_4h_due_check_respects_anchor_windows() {
        let dir = tempfile::tempdir().unwrap();
        let mut sched = DigestScheduler::load(dir.path().join("state.json"));
        let first = "2026-01-01T03:30:00Z".parse().unwrap();
        assert!(!sched.is_due(Schedule::Every4h, first, 8, 0, 8));
        sched.mark_run(Schedule::Every4h, first);

        let still_window = "2026-01-01T07:59:00Z".parse().unwrap();
        assert!(!sched.is_due(Schedule::Every4h, still_window, 8, 0, 8));

        let next_window = "2026-01-01T08:01:00Z".parse().unwrap();
        assert!(sched.is_due(Schedule::Every4h, next_window, 8, 0, 8));
    }

    #[test]
    fn every_4h_cold_start_does_not_fire_off_anchor() {
        let dir = tempfile::tempdir().unwrap();
        let sched = DigestScheduler::load(dir.path().join("state.json"));
        // 02:03 is within the first-few-minutes window but 02 is not one of
        // every_4h's anchor hours (0/4/8/12/16/20).
        let off_anchor = "2026-01-01T02:03:00Z".parse().unwrap();
        assert!(!sched.is_due(Schedule::Every4h, off_anchor, 8, 0, 8));

        let on_anchor = "2026-01-01T04:03:00Z".parse().unwrap();
        assert!(sched.is_due(Schedule::Every4h, on_anchor, 8, 0, 8));
    }

    #[test]
    fn daily_requires_matching_hour_and_a_new_calendar_day() {
        let dir = tempfile::tempdir().unwrap();
        let mut sched = DigestScheduler::load(dir.path().join("state.json"));
        let wrong_hour = "2026-01-01T07:00:00Z".parse().unwrap();
        assert!(!sched.is_due(Schedule::Daily, wrong_hour, 8, 0, 8));

        let right_hour = "2026-01-01T08:02:00Z".parse().unwrap();
        assert!(sched.is_due(Schedule::Daily, right_hour, 8, 0, 8));
        sched.mark_run(Schedule::Daily, right_hour);

        let same_day_again = "2026-01-01T08:30:00Z".parse().unwrap();
        assert!(!sched.is_due(Schedule::Daily, same_day_again, 8, 0, 8));

        let next_day = "2026-01-02T08:02:00Z".parse().unwrap();
        assert!(sched.is_due(Schedule::Daily, next_day, 8, 0, 8));
    }

    #[test]
    fn save_then_load_round_trips_last_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut sched = DigestScheduler::load(&path);
        let t = "2026-01-01T08:02:00Z".parse().unwrap();
        sched.mark_run(Schedule::Daily, t);
        sched.save().unwrap();

        let reloaded = DigestScheduler::load(&path);
        assert_eq!(reloaded.last_run(Schedule::Daily), Some(t));
        assert_eq!(reloaded.state_path(), path);
    }

    #[test]
    fn plurality_picks_majority_and_breaks_ties_low() {
        assert_eq!(plurality([8u8, 8, 9].into_iter(), "daily_hour"), 8);
        assert_eq!(plurality([8u8, 9].into_iter(), "daily_hour"), 8);
        assert_eq!(plurality(std::iter::empty(), "daily_hour"), 0);
    }
}
