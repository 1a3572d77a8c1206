//! Move the scheduler to the target date.

use chrono::NaiveDate;
use tracing::info;

use crate::driver::{Locator, RemoteUi};
use crate::error::Result;
use crate::journal::{RunJournal, RunWarning};
use crate::plan::Timings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The scheduler was already on the target date.
    AlreadySynced,
    /// Moved, and the date header confirmed the new day.
    Confirmed,
    /// Moved, but the header never confirmed; the run continues regardless.
    Unconfirmed,
}

/// Make the scheduler show `target`, reusing the current view when it already does.
///
/// A missing confirmation is recorded as a warning, not an error: the data
/// reload usually lands even when the header lags behind.
pub async fn navigate_to_date(
    ui: &dyn RemoteUi,
    target: NaiveDate,
    timings: &Timings,
    journal: &mut RunJournal,
) -> Result<NavigationOutcome> {
    info!(date = %target.format("%m/%d/%Y"), "navigating scheduler");

    if ui.read_date().await? == Some(target) {
        info!("already on target date");
        return Ok(NavigationOutcome::AlreadySynced);
    }

    ui.set_date(target).await?;
    ui.reload().await?;

    let weekday = target.format("%A").to_string();
    let confirmation = ui
        .wait_for_text(&Locator::DateHeader, &weekday, timings.date_confirm)
        .await;

    let reason = match confirmation {
        Ok(true) => {
            info!(weekday = %weekday, "scheduler confirmed target date");
            return Ok(NavigationOutcome::Confirmed);
        }
        Ok(false) => format!(
            "no '{weekday}' header within {}ms",
            timings.date_confirm.as_millis()
        ),
        Err(err) => format!("{err:#}"),
    };
    journal.warn(RunWarning::NavigationLag {
        date: target,
        reason,
    });
    Ok(NavigationOutcome::Unconfirmed)
}
