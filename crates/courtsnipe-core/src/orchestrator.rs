//! Run the booking stages in order and own the single failure boundary.
//!
//! Stages: navigate, scan, rank, initiate, fill form, wait for the deadline,
//! commit. Each stage starts only after its predecessor succeeded. Whatever
//! happens, the browsing context is closed exactly once at the end; on
//! failure a trace is requested first.

use std::path::PathBuf;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::availability::check_availability;
use crate::commit::{CommitReceipt, commit};
use crate::deadline::{Clock, Deadline, WaitOutcome, wait_until};
use crate::driver::RemoteUi;
use crate::error::Result;
use crate::form::{FormReport, fill_form};
use crate::initiator::initiate_reservation;
use crate::journal::{RunJournal, RunWarning};
use crate::model::{BookableUnit, TargetSlot};
use crate::navigator::{NavigationOutcome, navigate_to_date};
use crate::plan::BookingPlan;
use crate::ranking::rank;

/// What a finished run did.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub slot: TargetSlot,
    pub navigation: NavigationOutcome,
    pub unit: BookableUnit,
    pub form: FormReport,
    /// `None` on dry runs.
    pub wait: Option<WaitOutcome>,
    /// `None` on dry runs.
    pub commit: Option<CommitReceipt>,
    pub dry_run: bool,
    pub warnings: Vec<RunWarning>,
}

impl RunReport {
    /// Screenshot proving the booking, if one was taken.
    pub fn evidence(&self) -> Option<&PathBuf> {
        self.commit.as_ref().and_then(|receipt| receipt.evidence.as_ref())
    }
}

pub struct Orchestrator<'a> {
    ui: &'a dyn RemoteUi,
    clock: &'a dyn Clock,
    plan: &'a BookingPlan,
    run_id: Uuid,
}

impl<'a> Orchestrator<'a> {
    pub fn new(ui: &'a dyn RemoteUi, clock: &'a dyn Clock, plan: &'a BookingPlan) -> Self {
        Self {
            ui,
            clock,
            plan,
            run_id: Uuid::new_v4(),
        }
    }

    /// Use a fixed run id instead of a random one.
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Run every stage, then release the browsing context.
    ///
    /// Consumes the orchestrator: a context is driven by one run only.
    pub async fn execute(self) -> Result<RunReport> {
        info!(
            run_id = %self.run_id,
            slot = %self.plan.slot,
            dry_run = self.plan.dry_run,
            "booking run started"
        );

        let mut journal = RunJournal::new();
        let outcome = self.run_stages(&mut journal).await;

        let trace = match &outcome {
            Ok(_) => None,
            Err(err) => {
                error!(
                    run_id = %self.run_id,
                    kind = err.kind().as_str(),
                    "booking run failed: {err}"
                );
                Some(self.plan.artifacts.failure_trace(self.run_id))
            }
        };

        if let Err(close_err) = self.ui.close(trace.as_deref()).await {
            warn!(run_id = %self.run_id, "closing browser context failed: {close_err:#}");
        } else if let Some(path) = &trace {
            info!(path = %path.display(), "failure trace saved");
        }

        let stages = outcome?;
        info!(run_id = %self.run_id, unit = %stages.unit, "booking run finished");
        Ok(RunReport {
            run_id: self.run_id,
            slot: self.plan.slot.clone(),
            navigation: stages.navigation,
            unit: stages.unit,
            form: stages.form,
            wait: stages.wait,
            commit: stages.commit,
            dry_run: self.plan.dry_run,
            warnings: journal.into_warnings(),
        })
    }

    async fn run_stages(&self, journal: &mut RunJournal) -> Result<Stages> {
        let plan = self.plan;
        let timings = &plan.timings;

        let navigation = navigate_to_date(self.ui, plan.slot.date, timings, journal).await?;

        let free = check_availability(self.ui, &plan.slot, timings).await?;
        let ranked = rank(&free, &plan.preferred_units);
        info!(
            free = %join_labels(&free),
            ranked = %join_labels(&ranked),
            "courts ranked"
        );

        let unit = initiate_reservation(self.ui, &ranked, &plan.slot).await?;
        let form = fill_form(
            self.ui,
            &plan.slot,
            plan.partner.as_deref(),
            timings,
            journal,
        )
        .await?;

        if plan.dry_run {
            info!("dry run: form filled, skipping deadline wait and save");
            return Ok(Stages {
                navigation,
                unit,
                form,
                wait: None,
                commit: None,
            });
        }

        let deadline = Deadline::for_today(plan.execution_time, plan.buffer, self.clock.now())?;
        let wait = wait_until(&deadline, self.clock, timings.long_wait_warning, journal).await;

        let evidence = plan.artifacts.success_screenshot(self.run_id);
        let receipt = commit(self.ui, self.clock, timings, &evidence, journal).await?;

        Ok(Stages {
            navigation,
            unit,
            form,
            wait: Some(wait),
            commit: Some(receipt),
        })
    }
}

struct Stages {
    navigation: NavigationOutcome,
    unit: BookableUnit,
    form: FormReport,
    wait: Option<WaitOutcome>,
    commit: Option<CommitReceipt>,
}

fn join_labels(units: &[BookableUnit]) -> String {
    units
        .iter()
        .map(BookableUnit::label)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Dataset, Locator};
    use crate::error::BookingError;
    use crate::form::{PartnerOutcome, WaiverOutcome};
    use crate::model::{ReservationEvent, ScheduleSnapshot};
    use crate::plan::{ArtifactPaths, Timings};
    use crate::testkit::{FakeUi, UiCall, VirtualClock, sample_slot};
    use chrono::{NaiveDateTime, NaiveTime, TimeDelta};

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        at_hms(hour, minute, 0)
    }

    fn at_hms(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        sample_slot().date.and_hms_opt(hour, minute, second).unwrap()
    }

    fn plan(preferred: &[&str], dry_run: bool) -> BookingPlan {
        BookingPlan {
            slot: sample_slot(),
            preferred_units: preferred.iter().map(|label| BookableUnit::new(*label)).collect(),
            partner: None,
            execution_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            buffer: TimeDelta::seconds(20),
            dry_run,
            timings: Timings::default(),
            artifacts: ArtifactPaths::new("/tmp/courtsnipe"),
        }
    }

    fn reserve(unit: &str) -> Locator {
        Locator::ReserveButton {
            unit: BookableUnit::new(unit),
            time_label: "6:00 PM".to_string(),
        }
    }

    /// Courts A and B are taken at 6 PM, C is free.
    fn portal(duration_options: &[&str]) -> FakeUi {
        let slot = sample_slot();
        FakeUi::new()
            .with_date(slot.date)
            .with_visible(Locator::Scheduler)
            .with_visible(Locator::ReservationForm)
            .with_visible(Locator::WaiverLabel)
            .with_visible(reserve("A"))
            .with_visible(reserve("B"))
            .with_visible(reserve("C"))
            .with_snapshot(ScheduleSnapshot {
                date: Some(slot.date),
                units: vec!["A".into(), "B".into(), "C".into()],
                events: vec![
                    ReservationEvent {
                        unit: "A".into(),
                        start: at(17, 0),
                        end: at(18, 30),
                    },
                    ReservationEvent {
                        unit: "B".into(),
                        start: at(19, 0),
                        end: at(21, 0),
                    },
                ],
            })
            .with_dataset_readings(
                Dataset::DurationOptions,
                vec![duration_options.iter().map(|s| s.to_string()).collect()],
            )
    }

    #[tokio::test(start_paused = true)]
    async fn books_the_preferred_free_court_at_the_deadline() {
        let ui = portal(&["1 hour", "2 hours"]);
        let clock = VirtualClock::starting_at(at_hms(17, 59, 50));
        let plan = plan(&["B", "C"], false);

        let report = Orchestrator::new(&ui, &clock, &plan)
            .with_run_id(Uuid::nil())
            .execute()
            .await
            .unwrap();

        assert_eq!(report.unit.label(), "C");
        assert_eq!(report.navigation, NavigationOutcome::AlreadySynced);
        assert_eq!(report.form.duration, "2 hours");
        assert_eq!(report.form.partner, PartnerOutcome::NotRequested);
        assert_eq!(report.form.waiver, WaiverOutcome::Accepted);
        assert!(matches!(report.wait, Some(WaitOutcome::Fired { .. })));

        let receipt = report.commit.as_ref().unwrap();
        assert!(receipt.clicked_at >= at_hms(18, 0, 20));
        assert_eq!(
            report.evidence(),
            Some(&plan.artifacts.success_screenshot(Uuid::nil()))
        );

        assert_eq!(ui.clicked(), vec![reserve("C"), Locator::WaiverLabel, Locator::SaveButton]);
        assert_eq!(ui.calls().last(), Some(&UiCall::Close { trace: None }));
    }

    #[tokio::test(start_paused = true)]
    async fn option_mismatch_aborts_with_a_trace() {
        let ui = portal(&["1 hour", "1 hour & 30 minutes"]);
        let clock = VirtualClock::starting_at(at(17, 0));
        let plan = plan(&["C"], false);

        let err = Orchestrator::new(&ui, &clock, &plan)
            .with_run_id(Uuid::nil())
            .execute()
            .await
            .unwrap_err();

        match err {
            BookingError::OptionMismatch { available, .. } => {
                assert_eq!(available, vec!["1 hour", "1 hour & 30 minutes"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!ui.clicked().contains(&Locator::SaveButton));
        assert_eq!(
            ui.calls().last(),
            Some(&UiCall::Close {
                trace: Some(plan.artifacts.failure_trace(Uuid::nil())),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_deadline_aborts_with_a_trace_before_saving() {
        let ui = portal(&["2 hours"]);
        let clock = VirtualClock::starting_at(at(17, 0));
        let mut plan = plan(&["C"], false);
        plan.buffer = TimeDelta::MAX;

        let err = Orchestrator::new(&ui, &clock, &plan)
            .with_run_id(Uuid::nil())
            .execute()
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::InvalidPlan(_)));
        assert!(!ui.clicked().contains(&Locator::SaveButton));
        assert_eq!(
            ui.calls().last(),
            Some(&UiCall::Close {
                trace: Some(plan.artifacts.failure_trace(Uuid::nil())),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dry_run_never_saves() {
        let ui = portal(&["2 hours"]);
        let clock = VirtualClock::starting_at(at(9, 0));
        let plan = plan(&[], true);
        let started = tokio::time::Instant::now();

        let report = Orchestrator::new(&ui, &clock, &plan)
            .execute()
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.wait, None);
        assert!(report.commit.is_none());
        assert_eq!(report.unit.label(), "C");
        assert!(!ui.clicked().contains(&Locator::SaveButton));
        assert!(started.elapsed() < std::time::Duration::from_secs(60));
        assert_eq!(ui.calls().last(), Some(&UiCall::Close { trace: None }));
    }

    #[tokio::test(start_paused = true)]
    async fn close_failure_does_not_mask_the_run_error() {
        let ui = FakeUi::new()
            .with_date(sample_slot().date)
            .failing_on(UiCall::Close {
                trace: Some(plan(&[], false).artifacts.failure_trace(Uuid::nil())),
            });
        let clock = VirtualClock::starting_at(at(9, 0));
        let plan = plan(&[], false);

        let err = Orchestrator::new(&ui, &clock, &plan)
            .with_run_id(Uuid::nil())
            .execute()
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::UiStateTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn warnings_are_carried_into_the_report() {
        let ui = portal(&["2 hours"]).without_date_confirmation();
        let ui = ui.with_date(sample_slot().date.pred_opt().unwrap());
        let clock = VirtualClock::starting_at(at(9, 0));
        let mut plan = plan(&["C"], true);
        plan.partner = Some("Nobody".to_string());

        let report = Orchestrator::new(&ui, &clock, &plan)
            .execute()
            .await
            .unwrap();

        let kinds: Vec<_> = report.warnings.iter().map(RunWarning::kind).collect();
        assert_eq!(kinds, vec!["navigation_lag", "partner_selection"]);
    }
}
