//! The digest engine's tick loop: due-check every cadence, discover its
//! entities, collect and rank candidates, deliver, and audit the run.
//!
//! Bootstrap (the crash-loop guard): on first encounter of a cadence with
//! no recorded `last_run`, the scheduler's state is persisted *before*
//! delivery is attempted, so a daemon that crash-loops during its first
//! digest send never re-sends it on every restart.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sentinel_core::config::{AppCfg, Schedule};
use sentinel_coord::CoordStore;
use sentinel_platform::PlatformClient;
use sentinel_store::StoreManager;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::aggregation::aggregate;
use crate::discovery::discover;
use crate::error::Result;
use crate::scheduler::{plurality, DigestScheduler};
use crate::types::{AggregatedConfig, DigestExecutionRecord, ExecutionStatus};
use crate::{collector, delivery, formatter};

/// How often the engine wakes to check every cadence's due state. Cheap
/// enough to run every few seconds without meaningfully delaying the
/// coarsest window (hourly).
const TICK_INTERVAL: Duration = Duration::from_secs(30);

pub struct DigestEngine {
    cfg: watch::Receiver<Arc<AppCfg>>,
    store: Arc<StoreManager>,
    coord: Arc<CoordStore>,
    platform: Arc<dyn PlatformClient>,
    scheduler: DigestScheduler,
}

impl DigestEngine {
    pub fn new(
        cfg: watch::Receiver<Arc<AppCfg>>,
        store: Arc<StoreManager>,
        coord: Arc<CoordStore>,
        platform: Arc<dyn PlatformClient>,
        state_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cfg,
            store,
            coord,
            platform,
            scheduler: DigestScheduler::load(state_path),
        }
    }

    /// Run until `shutdown` is cancelled: bootstrap once, then tick forever.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        self.bootstrap().await;

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("digest engine shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "digest tick failed");
                    }
                }
            }
        }
    }

    /// First-run seeding: any cadence with no prior `last_run` that has at
    /// least one discovered entity is marked run immediately (before any
    /// delivery is attempted) so a crash during the very first digest
    /// doesn't cause it to be resent indefinitely on every restart.
    async fn bootstrap(&mut self) {
        let cfg = self.cfg.borrow().clone();
        let now = Utc::now();
        for schedule in Schedule::ALL {
            if self.scheduler.last_run(schedule).is_some() {
                continue;
            }
            let discovered = discover(&cfg, schedule);
            if discovered.is_empty() {
                continue;
            }
            info!(schedule = schedule.as_str(), "bootstrapping digest cadence");
            self.scheduler.mark_run(schedule, now);
            if let Err(e) = self.scheduler.save() {
                error!(error = %e, "failed to persist bootstrap scheduler state");
            }
            let aggregated = aggregate(&cfg, &discovered);
            if let Err(e) = self.process_due_schedule(schedule, aggregated, now).await {
                error!(schedule = schedule.as_str(), error = %e, "bootstrap digest run failed");
            }
        }
    }

    async fn tick(&mut self) -> Result<()> {
        let cfg = self.cfg.borrow().clone();
        let now = Utc::now();

        for schedule in Schedule::ALL {
            let discovered = discover(&cfg, schedule);
            if discovered.is_empty() {
                continue;
            }
            let daily_hour = plurality(discovered.iter().map(|d| d.daily_hour), "daily_hour");
            let weekly_day = plurality(discovered.iter().map(|d| d.weekly_day), "weekly_day");
            let weekly_hour = plurality(discovered.iter().map(|d| d.weekly_hour), "weekly_hour");

            if !self.scheduler.is_due(schedule, now, daily_hour, weekly_day, weekly_hour) {
                continue;
            }

            // Mark the window consumed before attempting delivery: a crash
            // mid-send must never cause the same window to run twice.
            self.scheduler.mark_run(schedule, now);
            self.scheduler.save()?;

            let aggregated = aggregate(&cfg, &discovered);
            self.process_due_schedule(schedule, aggregated, now).await?;
        }
        Ok(())
    }

    async fn process_due_schedule(
        &self,
        schedule: Schedule,
        aggregated: AggregatedConfig,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        let window_start = started_at - chrono::Duration::hours(schedule.window_hours());
        let ranked = collector::collect(&self.store, schedule, window_start, aggregated.min_score, aggregated.top_n).await?;

        let (status, error) = if ranked.is_empty() {
            (ExecutionStatus::Success, None)
        } else if !aggregated.mode.includes_dm() && !aggregated.mode.includes_digest() {
            info!(schedule = schedule.as_str(), candidates = ranked.len(), "cadence due but mode does not deliver a digest");
            (ExecutionStatus::Success, None)
        } else {
            let chunks = formatter::format_digest(schedule, &ranked);
            let outcome = delivery::deliver(self.platform.as_ref(), aggregated.mode, aggregated.target_channel.as_deref(), &chunks).await;

            if outcome.all_attempted_succeeded() {
                let pairs: Vec<(i64, i64)> = ranked.iter().map(|m| (m.chat_id, m.msg_id)).collect();
                self.store.mark_digest_processed(&pairs)?;
                (ExecutionStatus::Success, None)
            } else if outcome.any_succeeded() {
                warn!(schedule = schedule.as_str(), "digest partially delivered");
                (ExecutionStatus::Partial, Some("one of dm/channel delivery failed".to_string()))
            } else {
                (ExecutionStatus::Failed, Some("digest delivery failed".to_string()))
            }
        };

        let finished_at = Utc::now();
        let record = DigestExecutionRecord {
            id: Uuid::now_v7().to_string(),
            schedule: schedule.as_str().to_string(),
            profile_group: aggregated.profile_group.clone(),
            mode: format!("{:?}", aggregated.mode).to_lowercase(),
            target: aggregated.target_channel.clone(),
            started_at: started_at.to_rfc3339(),
            finished_at: finished_at.to_rfc3339(),
            status,
            message_count: ranked.len(),
            duration_ms: (finished_at - started_at).num_milliseconds(),
            error,
        };

        self.coord.set_digest_last_run(schedule.as_str(), &started_at.to_rfc3339()).await?;
        let profiles = if record.profile_group.is_empty() {
            vec!["_unbound".to_string()]
        } else {
            record.profile_group.clone()
        };
        for profile_id in &profiles {
            self.coord.record_digest_execution(profile_id, &record).await?;
        }

        info!(
            schedule = schedule.as_str(),
            status = ?record.status,
            messages = record.message_count,
            duration_ms = record.duration_ms,
            "digest run complete"
        );
        Ok(())
    }
}
