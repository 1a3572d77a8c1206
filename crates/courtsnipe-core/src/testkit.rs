//! Scripted stand-ins for the browser and the wall clock.
//!
//! Enabled for this crate's tests and, through the `test-utils` feature, for
//! downstream crates.

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{Instant, sleep};

use crate::deadline::Clock;
use crate::driver::{Dataset, Locator, RemoteUi};
use crate::model::{ScheduleSnapshot, TargetSlot};

/// One recorded call on a [`FakeUi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCall {
    ReadDate,
    SetDate(NaiveDate),
    Reload,
    WaitForText { target: Locator, text: String },
    WaitForVisible(Locator),
    Snapshot,
    IsVisible(Locator),
    Click(Locator),
    TypeText { target: Locator, text: String },
    ReadDataset(Dataset),
    SelectOption(Dataset, usize),
    SelectedText(Dataset),
    IsChecked(Locator),
    Screenshot(PathBuf),
    Close { trace: Option<PathBuf> },
}

#[derive(Debug)]
struct FakeState {
    date: Option<NaiveDate>,
    confirms_date: bool,
    snapshot: ScheduleSnapshot,
    visible: HashSet<Locator>,
    checked: HashSet<Locator>,
    readings: HashMap<Dataset, VecDeque<Vec<String>>>,
    last_read: HashMap<Dataset, Vec<String>>,
    selected: HashMap<Dataset, String>,
    sticky_selection: bool,
    failures: Vec<UiCall>,
    calls: Vec<UiCall>,
}

/// Deterministic [`RemoteUi`] that answers from a script and records every call.
///
/// Waits that cannot succeed sleep for their full timeout, so tests running on
/// paused tokio time observe the same bounds as a real portal.
#[derive(Debug)]
pub struct FakeUi {
    state: Mutex<FakeState>,
}

impl Default for FakeUi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeUi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                date: None,
                confirms_date: true,
                snapshot: ScheduleSnapshot::default(),
                visible: HashSet::new(),
                checked: HashSet::new(),
                readings: HashMap::new(),
                last_read: HashMap::new(),
                selected: HashMap::new(),
                sticky_selection: true,
                failures: Vec::new(),
                calls: Vec::new(),
            }),
        }
    }

    pub fn with_date(self, date: NaiveDate) -> Self {
        self.lock().date = Some(date);
        self
    }

    pub fn with_snapshot(self, snapshot: ScheduleSnapshot) -> Self {
        self.lock().snapshot = snapshot;
        self
    }

    pub fn with_visible(self, target: Locator) -> Self {
        self.lock().visible.insert(target);
        self
    }

    pub fn with_checked(self, target: Locator) -> Self {
        self.lock().checked.insert(target);
        self
    }

    /// Successive readings of `source`; the last one repeats forever.
    pub fn with_dataset_readings(self, source: Dataset, readings: Vec<Vec<String>>) -> Self {
        self.lock().readings.insert(source, readings.into());
        self
    }

    /// The date header never shows the expected weekday.
    pub fn without_date_confirmation(self) -> Self {
        self.lock().confirms_date = false;
        self
    }

    /// When `false`, selections are accepted but the widget keeps showing nothing.
    pub fn with_sticky_selection(self, sticky: bool) -> Self {
        self.lock().sticky_selection = sticky;
        self
    }

    /// Make exactly this call return an error.
    pub fn failing_on(self, call: UiCall) -> Self {
        self.lock().failures.push(call);
        self
    }

    pub fn calls(&self) -> Vec<UiCall> {
        self.lock().calls.clone()
    }

    /// Targets of every click, in order.
    pub fn clicked(&self) -> Vec<Locator> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                UiCall::Click(target) => Some(target.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake ui state poisoned")
    }

    /// Record `call` and hand back the state, or fail if the call was scripted to.
    fn record(&self, call: UiCall) -> Result<MutexGuard<'_, FakeState>> {
        let mut state = self.lock();
        state.calls.push(call.clone());
        if state.failures.contains(&call) {
            bail!("injected failure on {call:?}");
        }
        Ok(state)
    }
}

#[async_trait]
impl RemoteUi for FakeUi {
    async fn read_date(&self) -> Result<Option<NaiveDate>> {
        Ok(self.record(UiCall::ReadDate)?.date)
    }

    async fn set_date(&self, date: NaiveDate) -> Result<()> {
        self.record(UiCall::SetDate(date))?.date = Some(date);
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.record(UiCall::Reload)?;
        Ok(())
    }

    async fn wait_for_text(&self, target: &Locator, text: &str, timeout: Duration) -> Result<bool> {
        let shown = {
            let state = self.record(UiCall::WaitForText {
                target: target.clone(),
                text: text.to_string(),
            })?;
            state.confirms_date
                && *target == Locator::DateHeader
                && state
                    .date
                    .is_some_and(|date| date.format("%A").to_string() == text)
        };
        if !shown {
            sleep(timeout).await;
        }
        Ok(shown)
    }

    async fn wait_for_visible(&self, target: &Locator, timeout: Duration) -> Result<bool> {
        let visible = self
            .record(UiCall::WaitForVisible(target.clone()))?
            .visible
            .contains(target);
        if !visible {
            sleep(timeout).await;
        }
        Ok(visible)
    }

    async fn snapshot(&self) -> Result<ScheduleSnapshot> {
        Ok(self.record(UiCall::Snapshot)?.snapshot.clone())
    }

    async fn is_visible(&self, target: &Locator) -> Result<bool> {
        Ok(self
            .record(UiCall::IsVisible(target.clone()))?
            .visible
            .contains(target))
    }

    async fn click(&self, target: &Locator) -> Result<()> {
        let mut state = self.record(UiCall::Click(target.clone()))?;
        if *target == Locator::WaiverLabel {
            state.checked.insert(Locator::WaiverCheckbox);
        }
        Ok(())
    }

    async fn type_text(&self, target: &Locator, text: &str) -> Result<()> {
        self.record(UiCall::TypeText {
            target: target.clone(),
            text: text.to_string(),
        })?;
        Ok(())
    }

    async fn read_dataset(&self, source: Dataset) -> Result<Vec<String>> {
        let mut state = self.record(UiCall::ReadDataset(source))?;
        let items = match state.readings.get_mut(&source) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => Vec::new(),
        };
        state.last_read.insert(source, items.clone());
        Ok(items)
    }

    async fn select_option(&self, source: Dataset, index: usize) -> Result<()> {
        let mut state = self.record(UiCall::SelectOption(source, index))?;
        let Some(item) = state
            .last_read
            .get(&source)
            .and_then(|items| items.get(index))
            .cloned()
        else {
            bail!("{source} has no option {index}");
        };
        if state.sticky_selection {
            state.selected.insert(source, item);
        }
        Ok(())
    }

    async fn selected_text(&self, source: Dataset) -> Result<Option<String>> {
        Ok(self
            .record(UiCall::SelectedText(source))?
            .selected
            .get(&source)
            .cloned())
    }

    async fn is_checked(&self, target: &Locator) -> Result<bool> {
        Ok(self
            .record(UiCall::IsChecked(target.clone()))?
            .checked
            .contains(target))
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.record(UiCall::Screenshot(path.to_path_buf()))?;
        Ok(())
    }

    async fn close(&self, trace: Option<&Path>) -> Result<()> {
        self.record(UiCall::Close {
            trace: trace.map(Path::to_path_buf),
        })?;
        Ok(())
    }
}

/// Wall clock driven by tokio's (possibly paused) timer.
///
/// Reads `origin` plus the timer time elapsed since creation. A stall makes the
/// wall clock stand still for the first `stall` of timer time, which is how a
/// timer that fires ahead of the wall clock looks from the outside.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    origin: NaiveDateTime,
    started: Instant,
    stall: TimeDelta,
}

impl VirtualClock {
    pub fn starting_at(origin: NaiveDateTime) -> Self {
        Self {
            origin,
            started: Instant::now(),
            stall: TimeDelta::zero(),
        }
    }

    pub fn with_stall(mut self, stall: TimeDelta) -> Self {
        self.stall = stall;
        self
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = TimeDelta::from_std(self.started.elapsed()).unwrap_or(TimeDelta::MAX);
        self.origin + (elapsed - self.stall).max(TimeDelta::zero())
    }
}

/// Sunday 01/11/2026, 6:00 PM, two hours.
pub fn sample_slot() -> TargetSlot {
    TargetSlot::new(
        NaiveDate::from_ymd_opt(2026, 1, 11).expect("valid date"),
        NaiveTime::from_hms_opt(18, 0, 0).expect("valid time"),
        "2 hours",
    )
    .expect("valid duration")
}
