//! Recurring scan scheduling.
//!
//! [`Schedule`] only answers "when is the next run after `t`"; the sleeping
//! loop lives in [`ScanScheduler::run`] and is stopped through a `watch`
//! channel. A failing pass is logged and the loop carries on.

use std::{str::FromStr, time::Duration};

use chrono::{DateTime, Datelike, Local};
use tokio::{sync::watch, time::sleep};
use tracing::{error, info, warn};

use crate::{
    library::LocalLibrary,
    management::StartupMarker,
    musicbrainz::ReleaseSource,
    notify::Notifier,
    scanner::{ReleaseScanner, ScanError, ScanReport},
};

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },
    #[error("startup failed: {0}")]
    Startup(#[from] ScanError),
}

/// Source of fire times for [`ScanScheduler`].
pub trait Schedule: Send + Sync {
    /// The first fire time strictly after `after`, or `None` when the
    /// schedule never fires again.
    fn next_after(&self, after: DateTime<Local>) -> Option<DateTime<Local>>;
}

/// Cron based schedule. Five-field expressions get a leading seconds field.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    inner: cron::Schedule,
}

impl CronSchedule {
    /// Parses a cron expression.
    ///
    /// Standard five-field expressions (`minute hour day month weekday`) are
    /// accepted as well as the six- and seven-field forms with seconds and
    /// year.
    ///
    /// # Arguments
    ///
    /// * `expression` - The raw expression, surrounding whitespace ignored
    ///
    /// # Returns
    ///
    /// * `Ok(CronSchedule)` - The parsed schedule
    /// * `Err(ScheduleError::InvalidCron)` - With the parser's reason
    ///
    /// # Example
    ///
    /// ```rust
    /// let every_six_hours = CronSchedule::parse("0 */6 * * *")?;
    /// let next = every_six_hours.next_after(Local::now());
    /// ```
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let trimmed = expression.trim();
        let normalized = if trimmed.split_whitespace().count() == 5 {
            format!("0 {trimmed}")
        } else {
            trimmed.to_string()
        };
        let inner = cron::Schedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidCron {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            expression: expression.to_string(),
            inner,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl Schedule for CronSchedule {
    fn next_after(&self, after: DateTime<Local>) -> Option<DateTime<Local>> {
        self.inner.after(&after).next()
    }
}

/// Fires at a fixed distance from the previous run.
#[derive(Debug, Clone, Copy)]
pub struct IntervalSchedule {
    every: Duration,
}

impl IntervalSchedule {
    pub fn new(every: Duration) -> Self {
        Self { every }
    }
}

impl Schedule for IntervalSchedule {
    fn next_after(&self, after: DateTime<Local>) -> Option<DateTime<Local>> {
        let every = chrono::Duration::from_std(self.every).ok()?;
        after.checked_add_signed(every)
    }
}

/// Long-running driver: startup sequence, then one pass per fire time until
/// shutdown.
pub struct ScanScheduler<S, N, L> {
    scanner: ReleaseScanner<S, N, L>,
    schedule: Box<dyn Schedule>,
    startup: StartupMarker,
    scan_on_startup: bool,
}

impl<S, N, L> ScanScheduler<S, N, L>
where
    S: ReleaseSource,
    N: Notifier,
    L: LocalLibrary,
{
    pub fn new(
        scanner: ReleaseScanner<S, N, L>,
        schedule: Box<dyn Schedule>,
        startup: StartupMarker,
    ) -> Self {
        Self {
            scanner,
            schedule,
            startup,
            scan_on_startup: true,
        }
    }

    /// When `false`, the startup pass only runs for a fresh install (catalog
    /// just rebuilt and no ledger partition for this year yet).
    pub fn with_scan_on_startup(mut self, scan_on_startup: bool) -> Self {
        self.scan_on_startup = scan_on_startup;
        self
    }

    pub fn scanner(&self) -> &ReleaseScanner<S, N, L> {
        &self.scanner
    }

    pub fn next_fire_time(&self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        self.schedule.next_after(now)
    }

    /// Time left until the next fire time, zero if it is already due.
    pub fn time_until_next(&self, now: DateTime<Local>) -> Option<Duration> {
        let next = self.next_fire_time(now)?;
        Some(next.signed_duration_since(now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Runs one pass; failures are logged, never propagated.
    pub async fn run_once(&self, shutdown: &watch::Receiver<bool>) -> Option<ScanReport> {
        match self.scanner.run_pass(shutdown).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = %e, "scan pass failed");
                None
            }
        }
    }

    /// Startup sequence: announce the first ever start, make sure the
    /// catalog is usable and decide whether to scan right away.
    ///
    /// Returns whether a startup pass should run. A catalog that cannot be
    /// rebuilt here is fatal.
    pub async fn startup(&self, now: DateTime<Local>) -> Result<bool, ScheduleError> {
        if self.startup.is_first_startup().await {
            if let Err(e) = self.scanner.notifier().notify_startup().await {
                error!(error = %e, "failed to send startup notification");
            }
            if let Err(e) = self.startup.mark_complete().await {
                warn!(error = %e, "cannot write startup marker");
            }
        }

        let catalog = self.scanner.catalog();
        let rebuilt = if catalog.is_valid_at(now).await {
            info!("valid artist catalog found");
            false
        } else {
            info!("artist catalog missing or invalid, performing initial scan");
            self.scanner.rebuild_catalog().await?;
            true
        };

        if self.scan_on_startup {
            return Ok(true);
        }
        let partition_exists = self.scanner.ledger().partition_exists(now.year()).await;
        Ok(rebuilt && !partition_exists)
    }

    /// Runs the startup sequence and then the schedule loop.
    ///
    /// Returns once `shutdown` flips to `true` (or its sender is dropped), or
    /// when the schedule has no further fire time. A pass in progress is
    /// allowed to reach its next artist boundary first.
    ///
    /// # Errors
    ///
    /// Only startup failures are returned; see [`startup`](Self::startup).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), ScheduleError> {
        if self.startup(Local::now()).await? {
            info!("running startup scan");
            self.run_once(&shutdown).await;
        }
        info!("startup complete");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let now = Local::now();
            let Some(next) = self.next_fire_time(now) else {
                warn!("schedule has no upcoming run, stopping");
                break;
            };
            let wait = next.signed_duration_since(now).to_std().unwrap_or(Duration::ZERO);
            info!(next_run = %next.format("%Y-%m-%d %H:%M:%S"), "sleeping until next scheduled run");

            tokio::select! {
                _ = sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            self.run_once(&shutdown).await;
        }

        info!("scheduler stopped");
        Ok(())
    }
}
