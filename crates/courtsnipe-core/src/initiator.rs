use tracing::{debug, info};

use crate::driver::{Locator, RemoteUi};
use crate::error::{BookingError, Result};
use crate::model::{BookableUnit, TargetSlot};

/// Click the reserve button of the first ranked court that shows one for `slot`.
///
/// Returns the court whose button was clicked. When courts are free in the
/// schedule data but none has a visible button the snapshot and the page
/// disagree, which is reported as [`BookingError::DataInconsistency`].
pub async fn initiate_reservation(
    ui: &dyn RemoteUi,
    ranked: &[BookableUnit],
    slot: &TargetSlot,
) -> Result<BookableUnit> {
    if ranked.is_empty() {
        return Err(BookingError::NoAvailability {
            slot: slot.to_string(),
        });
    }

    let time_label = slot.time_label();
    for unit in ranked {
        let control = Locator::ReserveButton {
            unit: unit.clone(),
            time_label: time_label.clone(),
        };
        if ui.is_visible(&control).await? {
            info!(unit = %unit, "clicking reserve");
            ui.click(&control).await?;
            return Ok(unit.clone());
        }
        debug!(unit = %unit, "reserve button not visible");
    }

    Err(BookingError::DataInconsistency {
        control: format!("Reserve {time_label}"),
        candidates: ranked.iter().map(|unit| unit.label().to_string()).collect(),
    })
}
