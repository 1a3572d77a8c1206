//! Bounded polling of asynchronously loading option lists.

use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::driver::{Dataset, RemoteUi};

/// How long a bounded poll may keep re-reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollBudget {
    /// At most this many reads.
    Attempts(u32),
    /// Keep reading until this much time has passed.
    Within(Duration),
}

/// Re-read `source` every `interval` until it is non-empty or the budget runs out.
///
/// Returns `Ok(None)` when the budget is exhausted. At least one read is always
/// made, even with a zero budget.
pub async fn poll_dataset(
    ui: &dyn RemoteUi,
    source: Dataset,
    budget: PollBudget,
    interval: Duration,
) -> anyhow::Result<Option<Vec<String>>> {
    let deadline = match budget {
        PollBudget::Within(limit) => Some(Instant::now() + limit),
        PollBudget::Attempts(_) => None,
    };
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let items = ui.read_dataset(source).await?;
        if !items.is_empty() {
            debug!(dataset = %source, attempt, items = items.len(), "dataset loaded");
            return Ok(Some(items));
        }

        let pause = match (budget, deadline) {
            (PollBudget::Attempts(max), _) if attempt >= max => None,
            (PollBudget::Attempts(_), _) => Some(interval),
            (PollBudget::Within(_), Some(deadline)) => {
                let left = deadline.saturating_duration_since(Instant::now());
                (!left.is_zero()).then(|| interval.min(left))
            }
            (PollBudget::Within(_), None) => None,
        };

        match pause {
            Some(pause) => sleep(pause).await,
            None => {
                debug!(dataset = %source, attempt, "dataset still empty, giving up");
                return Ok(None);
            }
        }
    }
}
