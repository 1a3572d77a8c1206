//! Schedule data as read from the portal, and the slot being sought.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::duration::parse_duration_minutes;
use crate::error::{BookingError, Result};
use crate::interval::Interval;

/// One of the interchangeable reservable resources at a venue (a court).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookableUnit(String);

impl BookableUnit {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookableUnit {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// An existing booking on one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationEvent {
    pub unit: BookableUnit,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ReservationEvent {
    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start,
            end: self.end,
        }
    }
}

/// Units and events currently loaded by the portal's scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    /// Date the scheduler is showing, when the portal reports one.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub units: Vec<BookableUnit>,
    pub events: Vec<ReservationEvent>,
}

/// The reservation being sought: date, start time and duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSlot {
    pub date: NaiveDate,
    pub start: NaiveTime,
    /// Duration exactly as the portal's dropdown spells it.
    pub duration_label: String,
    pub duration_minutes: u32,
}

impl TargetSlot {
    pub fn new(date: NaiveDate, start: NaiveTime, duration_label: &str) -> Result<Self> {
        let duration_label = duration_label.trim().to_string();
        let duration_minutes = parse_duration_minutes(&duration_label)?;
        Ok(Self {
            date,
            start,
            duration_label,
            duration_minutes,
        })
    }

    pub fn interval(&self) -> Interval {
        Interval::starting_at(self.date.and_time(self.start), self.duration_minutes)
    }

    /// Start time as the portal prints it on reserve buttons, e.g. `6:00 PM`.
    pub fn time_label(&self) -> String {
        self.start.format("%-I:%M %p").to_string()
    }
}

impl fmt::Display for TargetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.date.format("%m/%d/%Y"),
            self.time_label(),
            self.duration_label
        )
    }
}

/// Parse a target date given as `MM/DD/YYYY` or `YYYY-MM-DD`.
pub fn parse_target_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .map_err(|_| {
            BookingError::InvalidPlan(format!(
                "unrecognised date '{text}' (expected MM/DD/YYYY)"
            ))
        })
}

/// Parse a start time given as `6:00 PM` or `18:00`.
pub fn parse_time_label(text: &str) -> Result<NaiveTime> {
    let normalized = text.trim().to_uppercase();
    NaiveTime::parse_from_str(&normalized, "%I:%M %p")
        .or_else(|_| NaiveTime::parse_from_str(&normalized, "%H:%M"))
        .map_err(|_| {
            BookingError::InvalidPlan(format!(
                "unrecognised time '{}' (expected e.g. '6:00 PM')",
                text.trim()
            ))
        })
}
