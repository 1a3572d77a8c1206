//! TOML configuration file.
//!
//! Loaded from `<config dir>/courtsnipe/config.toml` unless `--config` or
//! `COURTSNIPE_CONFIG` points elsewhere.

use anyhow::{Context, Result, bail};
use courtsnipe_browser::SiteSelectors;
use courtsnipe_core::Timings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub account: AccountConfig,
    pub portal: PortalConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub snipe: SnipeConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Portal login e-mail. The password is never stored here.
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    pub login_url: String,
    /// Scheduler page without the location query.
    pub scheduler_url: String,
    /// Friendly location name to the portal's `sId`.
    #[serde(default)]
    pub locations: BTreeMap<String, String>,
    /// Default entry of `locations`.
    pub location: Option<String>,
    #[serde(default = "default_post_login_pattern")]
    pub post_login_pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    #[serde(default)]
    pub preferred_courts: Vec<String>,
    /// Must match the duration dropdown text exactly.
    #[serde(default = "default_duration")]
    pub duration: String,
    /// Empty or missing books alone.
    pub partner: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            preferred_courts: Vec::new(),
            duration: default_duration(),
            partner: None,
            date: None,
            time: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnipeConfig {
    /// When the booking window opens, `HH:MM:SS` local time.
    #[serde(default = "default_execution_time")]
    pub execution_time: String,
    #[serde(default = "default_buffer_seconds")]
    pub buffer_seconds: f64,
}

impl Default for SnipeConfig {
    fn default() -> Self {
        Self {
            execution_time: default_execution_time(),
            buffer_seconds: default_buffer_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,
    pub user_agent: Option<String>,
    /// Stored session; relative paths are resolved against the config file.
    pub auth_file: Option<PathBuf>,
    pub artifacts_dir: Option<PathBuf>,
    /// Directory whose node_modules provides playwright.
    pub node_dir: Option<PathBuf>,
    #[serde(default)]
    pub selectors: SiteSelectors,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: None,
            auth_file: None,
            artifacts_dir: None,
            node_dir: None,
            selectors: SiteSelectors::default(),
        }
    }
}

/// Poll and wait bounds, in milliseconds unless named otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub scheduler_visible_ms: u64,
    pub date_confirm_ms: u64,
    pub form_visible_ms: u64,
    pub duration_timeout_ms: u64,
    pub duration_interval_ms: u64,
    pub duration_settle_ms: u64,
    pub partner_attempts: u32,
    pub partner_interval_ms: u64,
    pub commit_settle_ms: u64,
    pub long_wait_warning_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::from(&Timings::default())
    }
}

impl From<&Timings> for TimingConfig {
    fn from(timings: &Timings) -> Self {
        let ms = |d: Duration| d.as_millis() as u64;
        Self {
            scheduler_visible_ms: ms(timings.scheduler_visible),
            date_confirm_ms: ms(timings.date_confirm),
            form_visible_ms: ms(timings.form_visible),
            duration_timeout_ms: ms(timings.duration_timeout),
            duration_interval_ms: ms(timings.duration_interval),
            duration_settle_ms: ms(timings.duration_settle),
            partner_attempts: timings.partner_attempts,
            partner_interval_ms: ms(timings.partner_interval),
            commit_settle_ms: ms(timings.commit_settle),
            long_wait_warning_secs: timings.long_wait_warning.as_secs(),
        }
    }
}

impl TimingConfig {
    pub fn to_timings(&self) -> Result<Timings> {
        if self.duration_interval_ms == 0 || self.partner_interval_ms == 0 {
            bail!("[timing] poll intervals must be greater than zero");
        }
        if self.partner_attempts == 0 {
            bail!("[timing] partner_attempts must be at least 1");
        }
        Ok(Timings {
            scheduler_visible: Duration::from_millis(self.scheduler_visible_ms),
            date_confirm: Duration::from_millis(self.date_confirm_ms),
            form_visible: Duration::from_millis(self.form_visible_ms),
            duration_timeout: Duration::from_millis(self.duration_timeout_ms),
            duration_interval: Duration::from_millis(self.duration_interval_ms),
            duration_settle: Duration::from_millis(self.duration_settle_ms),
            partner_attempts: self.partner_attempts,
            partner_interval: Duration::from_millis(self.partner_interval_ms),
            commit_settle: Duration::from_millis(self.commit_settle_ms),
            long_wait_warning: Duration::from_secs(self.long_wait_warning_secs),
        })
    }
}

fn default_post_login_pattern() -> String {
    "**/Online/Portal/**".to_string()
}

fn default_duration() -> String {
    "2 hours".to_string()
}

fn default_execution_time() -> String {
    "18:00:00".to_string()
}

fn default_buffer_seconds() -> f64 {
    20.0
}

fn default_true() -> bool {
    true
}

/// A parsed config file together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub file: ConfigFile,
}

impl LoadedConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Config file not found: {}", path.display());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let file = toml::from_str(content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Directory relative paths in the file are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn auth_file(&self) -> PathBuf {
        match &self.file.browser.auth_file {
            Some(path) => self.resolve(path),
            None => data_dir().join("auth.json"),
        }
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        match &self.file.browser.artifacts_dir {
            Some(path) => self.resolve(path),
            None => data_dir().join("artifacts"),
        }
    }

    pub fn node_dir(&self) -> Option<PathBuf> {
        self.file.browser.node_dir.as_ref().map(|path| self.resolve(path))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }
}

/// Config path from `--config`/`COURTSNIPE_CONFIG`, else the platform default.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("courtsnipe")
            .join("config.toml"),
    }
}

/// Per-user data directory holding the session, artifacts and logs.
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("courtsnipe")
}

pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Written by `courtsnipe config init`.
pub const TEMPLATE: &str = r#"# courtsnipe configuration

[account]
# Portal login e-mail. The password comes from COURTSNIPE_PASSWORD or a prompt.
username = "you@example.com"

[portal]
login_url = "https://app.courtreserve.com/Online/Account/Login/7031"
scheduler_url = "https://app.courtreserve.com/Online/Reservations/Bookings/7031"
location = "Redmond"
# post_login_pattern = "**/Online/Portal/**"

[portal.locations]
Mukilteo = "1478"
Redmond = "17109"

[booking]
# Tried in this order; any other free court is used after these.
preferred_courts = ["Redmond 4", "Redmond 5", "Redmond 6"]
# Must match the dropdown text exactly, e.g. "1 hour & 30 minutes".
duration = "2 hours"
# Leave empty to book alone.
partner = ""
# Used when neither --date nor --offset is given.
date = "01/11/2026"
time = "6:00 PM"

[snipe]
# When the booking window opens (24h, local time).
execution_time = "18:00:00"
# Seconds after execution_time before clicking save.
buffer_seconds = 20.0

[browser]
headless = true
# user_agent = "Mozilla/5.0 ..."
# auth_file = "auth.json"
# artifacts_dir = "artifacts"
# node_dir = "."

# [browser.selectors]
# save_button = 'button[data-testid="save-btn"]'

# [timing]
# date_confirm_ms = 6000
# partner_attempts = 40
# commit_settle_ms = 5000
"#;

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[portal]
login_url = "https://portal.example/Online/Account/Login/1"
scheduler_url = "https://portal.example/Online/Reservations/Bookings/1"
"#;

    #[test]
    fn minimal_file_takes_defaults() {
        let config = LoadedConfig::parse(Path::new("/etc/courtsnipe/config.toml"), MINIMAL).unwrap();

        assert_eq!(config.file.booking.duration, "2 hours");
        assert_eq!(config.file.snipe.execution_time, "18:00:00");
        assert_eq!(config.file.snipe.buffer_seconds, 20.0);
        assert!(config.file.browser.headless);
        assert_eq!(config.file.portal.post_login_pattern, "**/Online/Portal/**");
        assert_eq!(config.file.timing.to_timings().unwrap(), Timings::default());
    }

    #[test]
    fn missing_portal_section_is_an_error() {
        let err = LoadedConfig::parse(Path::new("config.toml"), "[account]\nusername = \"a\"\n")
            .unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file config.toml"));
    }

    #[test]
    fn missing_file_is_reported_by_path() {
        let err = LoadedConfig::load(Path::new("/nonexistent/courtsnipe.toml")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Config file not found: /nonexistent/courtsnipe.toml"
        );
    }

    #[test]
    fn relative_paths_follow_the_config_file() {
        let content = format!(
            "{MINIMAL}\n[browser]\nauth_file = \"auth.json\"\nartifacts_dir = \"/var/courtsnipe\"\n"
        );
        let config = LoadedConfig::parse(Path::new("/home/me/snipe/config.toml"), &content).unwrap();

        assert_eq!(config.auth_file(), PathBuf::from("/home/me/snipe/auth.json"));
        assert_eq!(config.artifacts_dir(), PathBuf::from("/var/courtsnipe"));
        assert_eq!(config.node_dir(), None);
    }

    #[test]
    fn selector_overrides_keep_other_defaults() {
        let content = format!("{MINIMAL}\n[browser.selectors]\nsave_button = \"#save\"\n");
        let config = LoadedConfig::parse(Path::new("config.toml"), &content).unwrap();

        assert_eq!(config.file.browser.selectors.save_button, "#save");
        assert_eq!(
            config.file.browser.selectors.scheduler,
            SiteSelectors::default().scheduler
        );
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let timing = TimingConfig {
            duration_interval_ms: 0,
            ..TimingConfig::default()
        };
        assert!(timing.to_timings().is_err());
    }

    #[test]
    fn template_parses() {
        let config = LoadedConfig::parse(Path::new("config.toml"), TEMPLATE).unwrap();

        assert_eq!(config.file.portal.locations["Redmond"], "17109");
        assert_eq!(config.file.booking.preferred_courts.len(), 3);
        assert_eq!(config.file.booking.partner.as_deref(), Some(""));
    }
}
