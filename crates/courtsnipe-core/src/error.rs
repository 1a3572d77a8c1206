//! Error types for the booking pipeline

use std::time::Duration;
use thiserror::Error;

/// Fatal outcomes of a booking run.
///
/// Every variant aborts the run. Non-fatal incidents are recorded as
/// [`crate::RunWarning`] instead.
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("timed out after {}ms waiting for {what}", .waited.as_millis())]
    UiStateTimeout { what: String, waited: Duration },

    #[error("duration option '{wanted}' is not offered (available: {})", .available.join(", "))]
    OptionMismatch {
        wanted: String,
        available: Vec<String>,
    },

    #[error("no court is free for {slot}")]
    NoAvailability { slot: String },

    #[error(
        "schedule lists free courts ({}) but no '{control}' control is visible",
        .candidates.join(", ")
    )]
    DataInconsistency {
        control: String,
        candidates: Vec<String>,
    },

    #[error("commit failed: {0}")]
    CommitFailure(String),

    #[error("invalid booking plan: {0}")]
    InvalidPlan(String),

    #[error("browser driver error: {0:#}")]
    Driver(#[from] anyhow::Error),
}

/// Stable names for [`BookingError`] variants, used in structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UiStateTimeout,
    OptionMismatch,
    NoAvailability,
    DataInconsistency,
    CommitFailure,
    InvalidPlan,
    Driver,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UiStateTimeout => "ui_state_timeout",
            Self::OptionMismatch => "option_mismatch",
            Self::NoAvailability => "no_availability",
            Self::DataInconsistency => "data_inconsistency",
            Self::CommitFailure => "commit_failure",
            Self::InvalidPlan => "invalid_plan",
            Self::Driver => "driver",
        }
    }
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UiStateTimeout { .. } => ErrorKind::UiStateTimeout,
            Self::OptionMismatch { .. } => ErrorKind::OptionMismatch,
            Self::NoAvailability { .. } => ErrorKind::NoAvailability,
            Self::DataInconsistency { .. } => ErrorKind::DataInconsistency,
            Self::CommitFailure(_) => ErrorKind::CommitFailure,
            Self::InvalidPlan(_) => ErrorKind::InvalidPlan,
            Self::Driver(_) => ErrorKind::Driver,
        }
    }

    pub(crate) fn timeout(what: impl Into<String>, waited: Duration) -> Self {
        Self::UiStateTimeout {
            what: what.into(),
            waited,
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_mismatch_lists_available_options() {
        let err = BookingError::OptionMismatch {
            wanted: "2 hours".to_string(),
            available: vec!["1 hour".to_string(), "1 hour & 30 minutes".to_string()],
        };

        assert_eq!(err.kind(), ErrorKind::OptionMismatch);
        assert_eq!(
            err.to_string(),
            "duration option '2 hours' is not offered (available: 1 hour, 1 hour & 30 minutes)"
        );
    }

    #[test]
    fn driver_errors_keep_their_context_chain() {
        let source = anyhow::anyhow!("socket closed").context("bridge request 'click' failed");
        let err = BookingError::from(source);

        assert_eq!(err.kind(), ErrorKind::Driver);
        assert!(err.to_string().contains("socket closed"));
        assert!(err.to_string().contains("bridge request 'click' failed"));
    }

    #[test]
    fn timeout_reports_waited_millis() {
        let err = BookingError::timeout("reservation form", Duration::from_millis(5000));
        assert_eq!(
            err.to_string(),
            "timed out after 5000ms waiting for reservation form"
        );
        assert_eq!(err.kind().as_str(), "ui_state_timeout");
    }
}
