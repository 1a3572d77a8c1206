//! Availability scan over the scheduler's units and events.

use tracing::{debug, info};

use crate::driver::{Locator, RemoteUi};
use crate::error::{BookingError, Result};
use crate::interval::Interval;
use crate::model::{BookableUnit, ReservationEvent, TargetSlot};
use crate::plan::Timings;

/// Units with no event overlapping `requested`, in discovery order.
pub fn scan(
    units: &[BookableUnit],
    events: &[ReservationEvent],
    requested: &Interval,
) -> Vec<BookableUnit> {
    units
        .iter()
        .filter(|unit| {
            let taken = events
                .iter()
                .filter(|event| &event.unit == *unit)
                .any(|event| event.interval().overlaps(requested));
            if taken {
                debug!(unit = %unit, "court taken for requested interval");
            }
            !taken
        })
        .cloned()
        .collect()
}

/// Read the scheduler and return the courts free for `slot`.
///
/// An empty result is reported as [`BookingError::NoAvailability`].
pub async fn check_availability(
    ui: &dyn RemoteUi,
    slot: &TargetSlot,
    timings: &Timings,
) -> Result<Vec<BookableUnit>> {
    info!(slot = %slot, "analyzing court availability");

    if !ui
        .wait_for_visible(&Locator::Scheduler, timings.scheduler_visible)
        .await?
    {
        return Err(BookingError::timeout(
            Locator::Scheduler.to_string(),
            timings.scheduler_visible,
        ));
    }

    let snapshot = ui.snapshot().await?;
    if let Some(shown) = snapshot.date
        && shown != slot.date
    {
        return Err(BookingError::timeout(
            format!("scheduler to show {} (still on {shown})", slot.date),
            timings.date_confirm,
        ));
    }

    let requested = slot.interval();
    let free = scan(&snapshot.units, &snapshot.events, &requested);
    debug!(
        units = snapshot.units.len(),
        events = snapshot.events.len(),
        free = free.len(),
        "availability scan finished"
    );

    if free.is_empty() {
        return Err(BookingError::NoAvailability {
            slot: slot.to_string(),
        });
    }
    Ok(free)
}
