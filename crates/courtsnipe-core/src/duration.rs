//! Parsing of the portal's duration labels (`2 hours`, `1 hour & 30 minutes`).

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{BookingError, Result};

static DURATION_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?P<hours>\d+)\s*hours?)?\s*(?P<joined>&)?\s*(?:(?P<minutes>\d+)\s*minutes?)?$",
    )
    .expect("duration label regex must compile")
});

/// Convert a duration label into whole minutes.
///
/// Accepted shapes are `<N> hour[s]`, `<N> hour[s] & <M> minutes` and
/// `<M> minutes`. Anything else, or a total of zero, is rejected.
pub fn parse_duration_minutes(label: &str) -> Result<u32> {
    let label = label.trim();
    let invalid = || BookingError::InvalidPlan(format!("unrecognised duration '{label}'"));

    let captures = DURATION_LABEL.captures(label).ok_or_else(invalid)?;
    let number = |name: &str| -> Result<Option<u32>> {
        captures
            .name(name)
            .map(|m| m.as_str().parse::<u32>().map_err(|_| invalid()))
            .transpose()
    };
    let hours = number("hours")?;
    let minutes = number("minutes")?;
    let joined = captures.name("joined").is_some();

    let total = match (hours, minutes, joined) {
        (Some(h), Some(m), true) => h.checked_mul(60).and_then(|h| h.checked_add(m)),
        (Some(h), None, false) => h.checked_mul(60),
        (None, Some(m), false) => Some(m),
        _ => None,
    };

    match total {
        Some(total) if total > 0 => Ok(total),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_dropdown_shape() {
        assert_eq!(parse_duration_minutes("2 hours").unwrap(), 120);
        assert_eq!(parse_duration_minutes("1 hour").unwrap(), 60);
        assert_eq!(parse_duration_minutes("1 hour & 30 minutes").unwrap(), 90);
        assert_eq!(parse_duration_minutes("2 hours & 30 minutes").unwrap(), 150);
        assert_eq!(parse_duration_minutes("45 minutes").unwrap(), 45);
        assert_eq!(parse_duration_minutes("  30 Minutes ").unwrap(), 30);
    }

    #[test]
    fn rejects_malformed_labels() {
        for label in [
            "",
            "hours",
            "two hours",
            "1 hour 30 minutes",
            "& 30 minutes",
            "1 hour &",
            "90",
            "1.5 hours",
        ] {
            assert!(
                parse_duration_minutes(label).is_err(),
                "'{label}' should be rejected"
            );
        }
    }

    #[test]
    fn rejects_non_positive_totals() {
        assert!(parse_duration_minutes("0 minutes").is_err());
        assert!(parse_duration_minutes("0 hours").is_err());
        assert!(parse_duration_minutes("0 hours & 0 minutes").is_err());
    }

    #[test]
    fn rejects_overflowing_totals() {
        assert!(parse_duration_minutes("99999999999 hours").is_err());
        assert!(parse_duration_minutes("4294967295 hours").is_err());
    }
}
