//! courtsnipe core - the booking pipeline.
//!
//! This crate holds everything that decides *what* to do during a booking run
//! and none of the browser plumbing:
//! - Interval model, availability scan and preference ranking
//! - The `RemoteUi` seam the pipeline drives (implemented by courtsnipe-browser)
//! - Navigator, reservation initiator, form filler, deadline scheduler, commit
//! - The orchestrator that sequences the stages and owns the failure path

pub mod availability;
pub mod commit;
pub mod deadline;
pub mod driver;
pub mod duration;
pub mod error;
pub mod form;
pub mod initiator;
pub mod interval;
pub mod journal;
pub mod model;
pub mod navigator;
pub mod orchestrator;
pub mod plan;
pub mod poll;
pub mod ranking;
#[cfg(any(test, feature = "test-utils"))]
pub mod testkit;

// ── Top-level re-exports ─────────────────────────────────────────────

pub use availability::{check_availability, scan};
pub use commit::{CommitReceipt, commit};
pub use deadline::{Clock, Deadline, SystemClock, WaitOutcome, wait_until};
pub use driver::{Dataset, Locator, RemoteUi};
pub use duration::parse_duration_minutes;
pub use error::{BookingError, ErrorKind, Result};
pub use form::{FormReport, PartnerOutcome, WaiverOutcome, fill_form};
pub use initiator::initiate_reservation;
pub use interval::Interval;
pub use journal::{RunJournal, RunWarning};
pub use model::{
    BookableUnit, ReservationEvent, ScheduleSnapshot, TargetSlot, parse_target_date,
    parse_time_label,
};
pub use navigator::{NavigationOutcome, navigate_to_date};
pub use orchestrator::{Orchestrator, RunReport};
pub use plan::{ArtifactPaths, BookingPlan, Timings};
pub use poll::{PollBudget, poll_dataset};
pub use ranking::rank;
