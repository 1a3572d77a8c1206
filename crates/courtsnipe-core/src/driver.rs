//! The remote UI seam.
//!
//! The pipeline never talks to a browser directly. It drives a [`RemoteUi`],
//! naming controls by what they are ([`Locator`]) and option lists by what
//! they hold ([`Dataset`]). Mapping those names onto the portal's markup is
//! the implementor's job, so tests can substitute a scripted fake.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::model::{BookableUnit, ScheduleSnapshot};

/// Controls the pipeline reads or acts on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// The court scheduler widget.
    Scheduler,
    /// Header that prints the scheduler's current date.
    DateHeader,
    /// The "Reserve <time>" button of one court.
    ReserveButton {
        unit: BookableUnit,
        time_label: String,
    },
    /// Title of the reservation form dialog.
    ReservationForm,
    /// Search box of the partner selector.
    PartnerSearch,
    WaiverCheckbox,
    /// Clickable label toggling the waiver checkbox.
    WaiverLabel,
    SaveButton,
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduler => f.write_str("scheduler"),
            Self::DateHeader => f.write_str("scheduler date header"),
            Self::ReserveButton { unit, time_label } => {
                write!(f, "'Reserve {time_label}' button on {unit}")
            }
            Self::ReservationForm => f.write_str("reservation form"),
            Self::PartnerSearch => f.write_str("partner search"),
            Self::WaiverCheckbox => f.write_str("waiver checkbox"),
            Self::WaiverLabel => f.write_str("waiver label"),
            Self::SaveButton => f.write_str("save button"),
        }
    }
}

/// Option lists whose data loads asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    /// Options of the duration dropdown.
    DurationOptions,
    /// Filtered results of the partner selector.
    PartnerMatches,
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DurationOptions => f.write_str("duration options"),
            Self::PartnerMatches => f.write_str("partner matches"),
        }
    }
}

/// One authenticated browsing context on the booking portal.
///
/// Calls are made strictly one at a time by a single run.
#[async_trait]
pub trait RemoteUi: Send + Sync {
    /// Date the scheduler is showing, or `None` when it is not loaded.
    async fn read_date(&self) -> Result<Option<NaiveDate>>;

    async fn set_date(&self, date: NaiveDate) -> Result<()>;

    /// Re-fetch the scheduler's data for its current date.
    async fn reload(&self) -> Result<()>;

    /// Wait until `target` shows `text`. `Ok(false)` means the wait timed out.
    async fn wait_for_text(&self, target: &Locator, text: &str, timeout: Duration)
    -> Result<bool>;

    /// Wait until `target` is visible. `Ok(false)` means the wait timed out.
    async fn wait_for_visible(&self, target: &Locator, timeout: Duration) -> Result<bool>;

    async fn snapshot(&self) -> Result<ScheduleSnapshot>;

    /// Instant visibility check, no waiting.
    async fn is_visible(&self, target: &Locator) -> Result<bool>;

    async fn click(&self, target: &Locator) -> Result<()>;

    /// Clear `target` and type `text` into it.
    async fn type_text(&self, target: &Locator, text: &str) -> Result<()>;

    /// Current item texts of `source`; empty while it is still loading.
    async fn read_dataset(&self, source: Dataset) -> Result<Vec<String>>;

    /// Select item `index` of `source` and fire its change notification.
    async fn select_option(&self, source: Dataset, index: usize) -> Result<()>;

    /// Text the widget behind `source` currently displays.
    async fn selected_text(&self, source: Dataset) -> Result<Option<String>>;

    async fn is_checked(&self, target: &Locator) -> Result<bool>;

    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// Release the context. A `trace` path asks for the diagnostic trace to be saved.
    async fn close(&self, trace: Option<&Path>) -> Result<()>;
}
