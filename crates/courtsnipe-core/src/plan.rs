//! The immutable description of one booking run.

use chrono::{NaiveTime, TimeDelta};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::model::{BookableUnit, TargetSlot};

/// Bounds for every wait and poll in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    pub scheduler_visible: Duration,
    pub date_confirm: Duration,
    pub form_visible: Duration,
    pub duration_timeout: Duration,
    pub duration_interval: Duration,
    pub duration_settle: Duration,
    pub partner_attempts: u32,
    pub partner_interval: Duration,
    pub commit_settle: Duration,
    /// Waits longer than this are flagged as risky for the session.
    pub long_wait_warning: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            scheduler_visible: Duration::from_secs(10),
            date_confirm: Duration::from_secs(6),
            form_visible: Duration::from_secs(5),
            duration_timeout: Duration::from_secs(5),
            duration_interval: Duration::from_millis(200),
            duration_settle: Duration::from_secs(1),
            partner_attempts: 40,
            partner_interval: Duration::from_millis(100),
            commit_settle: Duration::from_secs(5),
            long_wait_warning: Duration::from_secs(3600),
        }
    }
}

/// Where diagnostic artifacts of a run are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Playwright trace saved when a run fails.
    pub fn failure_trace(&self, run_id: Uuid) -> PathBuf {
        self.dir.join(format!("trace-error-{}.zip", run_id.simple()))
    }

    /// Screenshot taken after a successful commit.
    pub fn success_screenshot(&self, run_id: Uuid) -> PathBuf {
        self.dir.join(format!("booking-success-{}.png", run_id.simple()))
    }
}

/// Everything a run needs to know, built once at startup.
#[derive(Debug, Clone)]
pub struct BookingPlan {
    pub slot: TargetSlot,
    /// Courts to try first, most wanted first.
    pub preferred_units: Vec<BookableUnit>,
    pub partner: Option<String>,
    /// Time of day the booking window opens.
    pub execution_time: NaiveTime,
    /// Extra delay after `execution_time` before saving.
    pub buffer: TimeDelta,
    /// Run every stage except the final save.
    pub dry_run: bool,
    pub timings: Timings,
    pub artifacts: ArtifactPaths,
}
