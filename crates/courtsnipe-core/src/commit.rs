use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use tokio::time::sleep;
use tracing::info;

use crate::deadline::Clock;
use crate::driver::{Locator, RemoteUi};
use crate::error::{BookingError, Result};
use crate::journal::{RunJournal, RunWarning};
use crate::plan::Timings;

/// Proof that the save control was clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub clicked_at: NaiveDateTime,
    /// Screenshot taken after the settle period, if one could be saved.
    pub evidence: Option<PathBuf>,
}

/// Click save once, let the portal settle, then capture evidence.
///
/// There is no retry. Only a failed click is fatal; a missing screenshot is
/// journaled.
pub async fn commit(
    ui: &dyn RemoteUi,
    clock: &dyn Clock,
    timings: &Timings,
    evidence_path: &Path,
    journal: &mut RunJournal,
) -> Result<CommitReceipt> {
    ui.click(&Locator::SaveButton)
        .await
        .map_err(|err| BookingError::CommitFailure(format!("{err:#}")))?;
    let clicked_at = clock.now();
    info!(at = %clicked_at.format("%H:%M:%S%.3f"), "save clicked");

    sleep(timings.commit_settle).await;

    let evidence = match ui.screenshot(evidence_path).await {
        Ok(()) => {
            info!(path = %evidence_path.display(), "success screenshot saved");
            Some(evidence_path.to_path_buf())
        }
        Err(err) => {
            journal.warn(RunWarning::MissingEvidence {
                reason: format!("{err:#}"),
            });
            None
        }
    };

    Ok(CommitReceipt {
        clicked_at,
        evidence,
    })
}
