//! Turns the config file plus command line overrides into a run plan.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Days, NaiveDate, NaiveTime, TimeDelta};
use courtsnipe_browser::LaunchOptions;
use courtsnipe_core::{
    ArtifactPaths, BookableUnit, BookingPlan, TargetSlot, parse_target_date, parse_time_label,
};

use super::file::LoadedConfig;
use crate::cli::BookArgs;

const MAX_BUFFER_SECS: f64 = 86_400.0;

impl LoadedConfig {
    /// Build the immutable plan for one `book` run.
    pub fn booking_plan(&self, args: &BookArgs, today: NaiveDate) -> Result<BookingPlan> {
        let booking = &self.file.booking;

        let date = match (args.offset, args.date.as_deref().or(booking.date.as_deref())) {
            (Some(offset), _) => today
                .checked_add_days(Days::new(u64::from(offset)))
                .ok_or_else(|| anyhow!("--offset {offset} is out of range"))?,
            (None, Some(text)) => parse_target_date(text)?,
            (None, None) => {
                bail!("No target date: pass --date or --offset, or set [booking].date")
            }
        };

        let time_text = args
            .time
            .as_deref()
            .or(booking.time.as_deref())
            .ok_or_else(|| anyhow!("No target time: pass --time or set [booking].time"))?;
        let start = parse_time_label(time_text)?;

        let slot = TargetSlot::new(date, start, &booking.duration)?;

        let partner = booking
            .partner
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        Ok(BookingPlan {
            slot,
            preferred_units: booking
                .preferred_courts
                .iter()
                .map(BookableUnit::new)
                .collect(),
            partner,
            execution_time: self.execution_time()?,
            buffer: self.buffer()?,
            dry_run: args.dry_run,
            timings: self.file.timing.to_timings()?,
            artifacts: ArtifactPaths::new(self.artifacts_dir()),
        })
    }

    /// Scheduler page for the chosen location.
    pub fn scheduler_url(&self, location: Option<&str>) -> Result<String> {
        let portal = &self.file.portal;
        let name = location
            .or(portal.location.as_deref())
            .ok_or_else(|| anyhow!("No location: pass --location or set [portal].location"))?;
        let Some(id) = portal.locations.get(name) else {
            let known: Vec<&str> = portal.locations.keys().map(String::as_str).collect();
            bail!(
                "Unknown location '{name}' (configured: {})",
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            );
        };
        Ok(format!("{}?sId={id}", portal.scheduler_url))
    }

    /// Browser launch settings for `book`.
    pub fn launch_options(&self, args: &BookArgs, password: Option<String>) -> Result<LaunchOptions> {
        let browser = &self.file.browser;
        let mut options = LaunchOptions::new(self.scheduler_url(args.location.as_deref())?);
        options.headless = browser.headless && !args.headed;
        options.user_agent = browser.user_agent.clone();
        options.post_login_pattern = self.file.portal.post_login_pattern.clone();
        options.username = self.file.account.username.clone();
        options.password = password;
        options.selectors = browser.selectors.clone();
        options.cwd = self.node_dir();

        let auth_file = self.auth_file();
        if auth_file.exists() {
            options.storage_state = Some(auth_file);
        }
        Ok(options)
    }

    fn execution_time(&self) -> Result<NaiveTime> {
        let text = self.file.snipe.execution_time.trim();
        NaiveTime::parse_from_str(text, "%H:%M:%S")
            .with_context(|| format!("[snipe].execution_time '{text}' is not HH:MM:SS"))
    }

    fn buffer(&self) -> Result<TimeDelta> {
        let seconds = self.file.snipe.buffer_seconds;
        if !seconds.is_finite() || seconds < 0.0 {
            bail!("[snipe].buffer_seconds must be a non-negative number, got {seconds}");
        }
        if seconds > MAX_BUFFER_SECS {
            bail!(
                "[snipe].buffer_seconds must be at most {MAX_BUFFER_SECS} (one day), got {seconds}"
            );
        }
        Ok(TimeDelta::milliseconds((seconds * 1000.0).round() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TEMPLATE;
    use std::path::{Path, PathBuf};

    fn template() -> LoadedConfig {
        LoadedConfig::parse(Path::new("/home/me/courtsnipe/config.toml"), TEMPLATE).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 14).unwrap()
    }

    #[test]
    fn template_defaults_build_a_plan() {
        let plan = template().booking_plan(&BookArgs::default(), today()).unwrap();

        assert_eq!(plan.slot.date, NaiveDate::from_ymd_opt(2026, 1, 11).unwrap());
        assert_eq!(plan.slot.time_label(), "6:00 PM");
        assert_eq!(plan.slot.duration_minutes, 120);
        assert_eq!(plan.preferred_units[0], BookableUnit::new("Redmond 4"));
        assert_eq!(plan.partner, None);
        assert_eq!(plan.execution_time, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
        assert_eq!(plan.buffer, TimeDelta::seconds(20));
        assert!(!plan.dry_run);
    }

    #[test]
    fn offset_wins_over_date() {
        let args = BookArgs {
            date: Some("02/01/2026".to_string()),
            offset: Some(28),
            ..BookArgs::default()
        };
        let plan = template().booking_plan(&args, today()).unwrap();

        assert_eq!(plan.slot.date, NaiveDate::from_ymd_opt(2026, 1, 11).unwrap());
    }

    #[test]
    fn command_line_time_overrides_config() {
        let args = BookArgs {
            time: Some("7:30 pm".to_string()),
            dry_run: true,
            ..BookArgs::default()
        };
        let plan = template().booking_plan(&args, today()).unwrap();

        assert_eq!(plan.slot.time_label(), "7:30 PM");
        assert!(plan.dry_run);
    }

    #[test]
    fn missing_date_is_explained() {
        let mut config = template();
        config.file.booking.date = None;

        let err = config
            .booking_plan(&BookArgs::default(), today())
            .unwrap_err();
        assert!(err.to_string().contains("--offset"));
    }

    #[test]
    fn unknown_duration_fails_before_any_browser_work() {
        let mut config = template();
        config.file.booking.duration = "forever".to_string();

        assert!(config.booking_plan(&BookArgs::default(), today()).is_err());
    }

    #[test]
    fn bad_execution_time_is_rejected() {
        let mut config = template();
        config.file.snipe.execution_time = "6pm".to_string();

        let err = config
            .booking_plan(&BookArgs::default(), today())
            .unwrap_err();
        assert!(err.to_string().contains("HH:MM:SS"));
    }

    #[test]
    fn fractional_buffer_is_kept() {
        let mut config = template();
        config.file.snipe.buffer_seconds = 0.25;

        let plan = config.booking_plan(&BookArgs::default(), today()).unwrap();
        assert_eq!(plan.buffer, TimeDelta::milliseconds(250));
    }

    #[test]
    fn buffer_longer_than_a_day_is_rejected() {
        let mut config = template();
        config.file.snipe.buffer_seconds = 1e14;

        let err = config
            .booking_plan(&BookArgs::default(), today())
            .unwrap_err();
        assert!(err.to_string().contains("[snipe].buffer_seconds must be at most 86400"));

        config.file.snipe.buffer_seconds = 86_400.0;
        let plan = config.booking_plan(&BookArgs::default(), today()).unwrap();
        assert_eq!(plan.buffer, TimeDelta::days(1));
    }

    #[test]
    fn partner_is_trimmed() {
        let mut config = template();
        config.file.booking.partner = Some("  Jane Doe ".to_string());

        let plan = config.booking_plan(&BookArgs::default(), today()).unwrap();
        assert_eq!(plan.partner.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn scheduler_url_carries_the_location_id() {
        let config = template();

        assert_eq!(
            config.scheduler_url(None).unwrap(),
            "https://app.courtreserve.com/Online/Reservations/Bookings/7031?sId=17109"
        );
        assert_eq!(
            config.scheduler_url(Some("Mukilteo")).unwrap(),
            "https://app.courtreserve.com/Online/Reservations/Bookings/7031?sId=1478"
        );
    }

    #[test]
    fn unknown_location_lists_the_known_ones() {
        let err = template().scheduler_url(Some("Bellevue")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown location 'Bellevue' (configured: Mukilteo, Redmond)"
        );
    }

    #[test]
    fn headed_flag_forces_a_visible_browser() {
        let args = BookArgs {
            headed: true,
            ..BookArgs::default()
        };
        let options = template().launch_options(&args, None).unwrap();

        assert!(!options.headless);
        assert_eq!(options.username.as_deref(), Some("you@example.com"));
        assert_eq!(options.storage_state, None);
        assert_eq!(options.cwd, None::<PathBuf>);
    }
}
