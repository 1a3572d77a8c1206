//! Reservation form: duration, optional partner and waiver.
//!
//! Only the duration step can fail the run. Partner and waiver problems are
//! journaled and the form is submitted without them.

use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::driver::{Dataset, Locator, RemoteUi};
use crate::error::{BookingError, Result};
use crate::journal::{RunJournal, RunWarning};
use crate::model::TargetSlot;
use crate::plan::Timings;
use crate::poll::{PollBudget, poll_dataset};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartnerOutcome {
    NotRequested,
    /// `matched` is the entry the selector picked for the typed name.
    Attached { name: String, matched: String },
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiverOutcome {
    AlreadyAccepted,
    Accepted,
    Unconfirmed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormReport {
    /// Duration text the dropdown displays after selection.
    pub duration: String,
    pub partner: PartnerOutcome,
    pub waiver: WaiverOutcome,
}

/// Fill the reservation form opened by the reserve click.
pub async fn fill_form(
    ui: &dyn RemoteUi,
    slot: &TargetSlot,
    partner: Option<&str>,
    timings: &Timings,
    journal: &mut RunJournal,
) -> Result<FormReport> {
    if !ui
        .wait_for_visible(&Locator::ReservationForm, timings.form_visible)
        .await?
    {
        return Err(BookingError::timeout(
            Locator::ReservationForm.to_string(),
            timings.form_visible,
        ));
    }
    info!("reservation form open");

    let duration = select_duration(ui, &slot.duration_label, timings).await?;

    let partner = match partner.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => attach_partner(ui, name, timings, journal).await,
        None => PartnerOutcome::NotRequested,
    };

    let waiver = accept_waiver(ui, journal).await;

    Ok(FormReport {
        duration,
        partner,
        waiver,
    })
}

/// Pick `wanted` from the duration dropdown once its options have loaded.
///
/// Options that load but never include `wanted` fail at once with
/// [`BookingError::OptionMismatch`]. A selection that does not stick is retried
/// until the duration budget runs out.
async fn select_duration(ui: &dyn RemoteUi, wanted: &str, timings: &Timings) -> Result<String> {
    let wanted = wanted.trim();
    let started = Instant::now();
    let mut selected_once = false;

    loop {
        let left = timings.duration_timeout.saturating_sub(started.elapsed());
        let Some(options) = poll_dataset(
            ui,
            Dataset::DurationOptions,
            PollBudget::Within(left),
            timings.duration_interval,
        )
        .await?
        else {
            let what = if selected_once {
                "duration selection to settle"
            } else {
                "duration options to load"
            };
            return Err(BookingError::timeout(what, timings.duration_timeout));
        };

        let Some(index) = options.iter().position(|option| option.trim() == wanted) else {
            return Err(BookingError::OptionMismatch {
                wanted: wanted.to_string(),
                available: options.iter().map(|option| option.trim().to_string()).collect(),
            });
        };

        ui.select_option(Dataset::DurationOptions, index).await?;
        selected_once = true;
        sleep(timings.duration_settle).await;

        let shown = ui.selected_text(Dataset::DurationOptions).await?;
        if shown.as_deref().map(str::trim) == Some(wanted) {
            info!(duration = wanted, "duration selected");
            return Ok(wanted.to_string());
        }
        debug!(
            wanted,
            shown = shown.as_deref().unwrap_or("<none>"),
            "duration selection did not stick"
        );

        if started.elapsed() >= timings.duration_timeout {
            return Err(BookingError::timeout(
                "duration selection to settle",
                timings.duration_timeout,
            ));
        }
        sleep(timings.duration_interval).await;
    }
}

async fn attach_partner(
    ui: &dyn RemoteUi,
    name: &str,
    timings: &Timings,
    journal: &mut RunJournal,
) -> PartnerOutcome {
    match try_attach_partner(ui, name, timings).await {
        Ok(matched) => {
            info!(partner = name, matched = %matched, "partner added");
            PartnerOutcome::Attached {
                name: name.to_string(),
                matched,
            }
        }
        Err(reason) => {
            journal.warn(RunWarning::PartnerSelection {
                partner: name.to_string(),
                reason,
            });
            PartnerOutcome::Skipped
        }
    }
}

async fn try_attach_partner(
    ui: &dyn RemoteUi,
    name: &str,
    timings: &Timings,
) -> std::result::Result<String, String> {
    ui.type_text(&Locator::PartnerSearch, name)
        .await
        .map_err(|err| format!("{err:#}"))?;

    let matches = poll_dataset(
        ui,
        Dataset::PartnerMatches,
        PollBudget::Attempts(timings.partner_attempts),
        timings.partner_interval,
    )
    .await
    .map_err(|err| format!("{err:#}"))?
    .ok_or_else(|| format!("no matches after {} attempts", timings.partner_attempts))?;

    ui.select_option(Dataset::PartnerMatches, 0)
        .await
        .map_err(|err| format!("{err:#}"))?;

    Ok(matches.into_iter().next().unwrap_or_default())
}

async fn try_accept_waiver(ui: &dyn RemoteUi) -> anyhow::Result<WaiverOutcome> {
    if ui.is_checked(&Locator::WaiverCheckbox).await? {
        return Ok(WaiverOutcome::AlreadyAccepted);
    }
    if !ui.is_visible(&Locator::WaiverLabel).await? {
        anyhow::bail!("{} is not visible", Locator::WaiverLabel);
    }
    ui.click(&Locator::WaiverLabel).await?;
    Ok(WaiverOutcome::Accepted)
}

async fn accept_waiver(ui: &dyn RemoteUi, journal: &mut RunJournal) -> WaiverOutcome {
    match try_accept_waiver(ui).await {
        Ok(outcome) => {
            debug!(?outcome, "waiver handled");
            outcome
        }
        Err(err) => {
            journal.warn(RunWarning::Waiver {
                reason: format!("{err:#}"),
            });
            WaiverOutcome::Unconfirmed
        }
    }
}
