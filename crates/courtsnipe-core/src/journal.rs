//! Per-run record of non-fatal incidents.

use chrono::NaiveDate;
use std::fmt;
use tracing::warn;

/// Something went wrong but the run carries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunWarning {
    /// The scheduler never confirmed the new date.
    NavigationLag { date: NaiveDate, reason: String },
    /// The optional partner could not be attached.
    PartnerSelection { partner: String, reason: String },
    /// The waiver could not be confirmed or clicked.
    Waiver { reason: String },
    /// The deadline is far enough away that the session may expire.
    LongWait { seconds: i64 },
    /// The deadline had already passed when the wait began.
    DeadlinePassed { late_ms: i64 },
    /// The success screenshot could not be taken.
    MissingEvidence { reason: String },
}

impl RunWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NavigationLag { .. } => "navigation_lag",
            Self::PartnerSelection { .. } => "partner_selection",
            Self::Waiver { .. } => "waiver",
            Self::LongWait { .. } => "long_wait",
            Self::DeadlinePassed { .. } => "deadline_passed",
            Self::MissingEvidence { .. } => "missing_evidence",
        }
    }
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NavigationLag { date, reason } => {
                write!(f, "scheduler did not confirm {date}: {reason}")
            }
            Self::PartnerSelection { partner, reason } => {
                write!(f, "could not add partner '{partner}': {reason}")
            }
            Self::Waiver { reason } => write!(f, "waiver not confirmed: {reason}"),
            Self::LongWait { seconds } => write!(
                f,
                "{:.1} minutes until the deadline; make sure the session does not time out",
                *seconds as f64 / 60.0
            ),
            Self::DeadlinePassed { late_ms } => write!(
                f,
                "deadline passed {:.2}s ago; saving immediately",
                *late_ms as f64 / 1000.0
            ),
            Self::MissingEvidence { reason } => {
                write!(f, "no success screenshot: {reason}")
            }
        }
    }
}

/// Collects warnings as the stages run and logs each one as it arrives.
#[derive(Debug, Default)]
pub struct RunJournal {
    warnings: Vec<RunWarning>,
}

impl RunJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, warning: RunWarning) {
        warn!(kind = warning.kind(), "{warning}");
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[RunWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<RunWarning> {
        self.warnings
    }
}
