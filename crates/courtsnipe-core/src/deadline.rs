//! Deadline scheduler: hold the flow until the booking window opens.
//!
//! The wait is a single timer sleep. If the timer fires before the wall clock
//! reaches the fire instant (clock adjustment, coarse timer) it is re-armed
//! for the difference, so the flow never resumes early.

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::error::{BookingError, Result};
use crate::journal::{RunJournal, RunWarning};

/// Wall-clock source, in the venue's local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The machine's local clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// The instant the commit should fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub fire_at: NaiveDateTime,
}

impl Deadline {
    /// `execution_time` on the day of `now`, plus `buffer`.
    pub fn for_today(
        execution_time: NaiveTime,
        buffer: TimeDelta,
        now: NaiveDateTime,
    ) -> Result<Self> {
        let fire_at = now
            .date()
            .and_time(execution_time)
            .checked_add_signed(buffer)
            .ok_or_else(|| {
                BookingError::InvalidPlan(format!(
                    "buffer of {}s puts the deadline out of range",
                    buffer.num_seconds()
                ))
            })?;
        Ok(Self { fire_at })
    }

    /// Negative once the deadline has passed.
    pub fn remaining(&self, now: NaiveDateTime) -> TimeDelta {
        self.fire_at - now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Slept until the deadline.
    Fired { waited: Duration, late_by: TimeDelta },
    /// The deadline was already behind us; no wait.
    AlreadyPassed { late_by: TimeDelta },
}

/// Suspend until `deadline`, or return at once if it has passed.
pub async fn wait_until(
    deadline: &Deadline,
    clock: &dyn Clock,
    long_wait_warning: Duration,
    journal: &mut RunJournal,
) -> WaitOutcome {
    let remaining = deadline.remaining(clock.now());

    if remaining < TimeDelta::zero() {
        let late_by = -remaining;
        journal.warn(RunWarning::DeadlinePassed {
            late_ms: late_by.num_milliseconds(),
        });
        return WaitOutcome::AlreadyPassed { late_by };
    }

    if remaining.to_std().is_ok_and(|left| left > long_wait_warning) {
        journal.warn(RunWarning::LongWait {
            seconds: remaining.num_seconds(),
        });
    }

    info!(
        "sleeping {:.2}s until {}",
        remaining.num_milliseconds() as f64 / 1000.0,
        deadline.fire_at.format("%H:%M:%S")
    );

    let started = Instant::now();
    let mut left = remaining;
    while let Ok(span) = left.to_std() {
        if span.is_zero() {
            break;
        }
        sleep(span).await;
        left = deadline.remaining(clock.now());
        if left > TimeDelta::zero() {
            debug!(
                early_ms = left.num_milliseconds(),
                "timer fired before the deadline, re-arming"
            );
        }
    }

    let now = clock.now();
    let late_by = now - deadline.fire_at;
    info!(time = %now.format("%H:%M:%S%.3f"), "deadline reached, firing");
    WaitOutcome::Fired {
        waited: started.elapsed(),
        late_by,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::VirtualClock;
    use chrono::NaiveDate;

    fn today_at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    fn six_pm() -> NaiveTime {
        NaiveTime::from_hms_opt(18, 0, 0).unwrap()
    }

    #[test]
    fn deadline_adds_buffer_to_execution_time() {
        let deadline =
            Deadline::for_today(six_pm(), TimeDelta::seconds(20), today_at(17, 59, 50)).unwrap();

        assert_eq!(deadline.fire_at, today_at(18, 0, 20));
        assert_eq!(deadline.remaining(today_at(17, 59, 50)), TimeDelta::seconds(30));
        assert!(deadline.remaining(today_at(18, 0, 25)) < TimeDelta::zero());
    }

    #[test]
    fn oversized_buffer_is_an_invalid_plan() {
        let err =
            Deadline::for_today(six_pm(), TimeDelta::MAX, today_at(17, 0, 0)).unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::InvalidPlan);
        assert!(err.to_string().contains("out of range"));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_exactly_until_the_fire_instant() {
        let clock = VirtualClock::starting_at(today_at(17, 59, 50));
        let deadline =
            Deadline::for_today(six_pm(), TimeDelta::seconds(20), clock.now()).unwrap();
        let mut journal = RunJournal::new();

        let outcome = wait_until(&deadline, &clock, Duration::from_secs(3600), &mut journal).await;

        let WaitOutcome::Fired { waited, late_by } = outcome else {
            panic!("expected the wait to fire, got {outcome:?}");
        };
        assert!(waited >= Duration::from_secs(30));
        assert!(waited < Duration::from_millis(30_010));
        assert!(late_by >= TimeDelta::zero());
        assert!(late_by < TimeDelta::milliseconds(10));
        assert!(clock.now() >= deadline.fire_at);
        assert!(journal.warnings().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn returns_immediately_when_deadline_passed() {
        let clock = VirtualClock::starting_at(today_at(18, 0, 25));
        let deadline =
            Deadline::for_today(six_pm(), TimeDelta::seconds(20), clock.now()).unwrap();
        let mut journal = RunJournal::new();
        let started = Instant::now();

        let outcome = wait_until(&deadline, &clock, Duration::from_secs(3600), &mut journal).await;

        assert_eq!(
            outcome,
            WaitOutcome::AlreadyPassed {
                late_by: TimeDelta::seconds(5)
            }
        );
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(journal.warnings()[0].kind(), "deadline_passed");
    }

    #[tokio::test(start_paused = true)]
    async fn long_waits_are_flagged_but_still_honoured() {
        let clock = VirtualClock::starting_at(today_at(16, 0, 0));
        let deadline =
            Deadline::for_today(six_pm(), TimeDelta::zero(), clock.now()).unwrap();
        let mut journal = RunJournal::new();

        let outcome = wait_until(&deadline, &clock, Duration::from_secs(3600), &mut journal).await;

        assert!(
            matches!(outcome, WaitOutcome::Fired { waited, .. } if waited >= Duration::from_secs(7200))
        );
        assert_eq!(
            journal.warnings(),
            &[RunWarning::LongWait { seconds: 7200 }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn re_arms_when_the_wall_clock_lags_the_timer() {
        // Wall clock stands still for the first 2s: the first sleep ends early.
        let clock =
            VirtualClock::starting_at(today_at(17, 59, 50)).with_stall(TimeDelta::seconds(2));
        let deadline =
            Deadline::for_today(six_pm(), TimeDelta::seconds(20), today_at(17, 59, 50)).unwrap();
        let mut journal = RunJournal::new();

        let outcome = wait_until(&deadline, &clock, Duration::from_secs(3600), &mut journal).await;

        assert!(clock.now() >= deadline.fire_at);
        assert!(
            matches!(outcome, WaitOutcome::Fired { late_by, .. } if late_by >= TimeDelta::zero())
        );
    }
}
