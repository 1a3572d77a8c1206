//! Production [`RemoteUi`]: a persistent Node.js + Playwright bridge process.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use courtsnipe_core::{Dataset, Locator, RemoteUi, ScheduleSnapshot};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, warn};

use crate::protocol::{BridgeOp, BridgeRequest, READY_ID, parse_reply_line};
use crate::runtime::{ensure_probe_ready, node_command, probe_runtime};
use crate::script::{BridgeLaunch, LoginSelectors, build_bridge_script};
use crate::selectors::SiteSelectors;

/// Extra time allowed on top of an op's own budget before the transport gives up.
const TRANSPORT_GRACE: Duration = Duration::from_secs(5);

/// How long a closing bridge gets to save its trace and exit.
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub scheduler_url: String,
    pub headless: bool,
    pub user_agent: Option<String>,
    /// Playwright storage state written by `courtsnipe auth`.
    pub storage_state: Option<PathBuf>,
    /// URL fragment that identifies the login page.
    pub login_path_marker: String,
    /// Glob the portal redirects to after signing in.
    pub post_login_pattern: String,
    /// When both are set, an expired session is renewed in place.
    pub username: Option<String>,
    pub password: Option<String>,
    pub selectors: SiteSelectors,
    /// Directory whose node_modules provides playwright.
    pub cwd: Option<PathBuf>,
    pub launch_timeout: Duration,
    /// Default budget of ops without their own timeout.
    pub op_timeout: Duration,
    /// Delay between keystrokes when typing.
    pub type_delay: Duration,
    /// Trace saved when the launch itself fails after the browser opened.
    pub failure_trace: Option<PathBuf>,
}

impl LaunchOptions {
    pub fn new(scheduler_url: impl Into<String>) -> Self {
        Self {
            scheduler_url: scheduler_url.into(),
            headless: true,
            user_agent: None,
            storage_state: None,
            login_path_marker: "/Account/Login".to_string(),
            post_login_pattern: "**/Online/Portal/**".to_string(),
            username: None,
            password: None,
            selectors: SiteSelectors::default(),
            cwd: None,
            launch_timeout: Duration::from_secs(90),
            op_timeout: Duration::from_secs(30),
            type_delay: Duration::from_millis(100),
            failure_trace: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Landing {
    url: String,
    #[serde(default)]
    signed_in: bool,
}

struct BridgeIo {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl BridgeIo {
    /// Read stdout until the reply for `id` arrives or `budget` runs out.
    async fn read_reply(&mut self, id: u64, budget: Duration) -> Result<Value> {
        let deadline = Instant::now() + budget;
        loop {
            let line = match timeout_at(deadline, self.stdout.next_line()).await {
                Err(_) => bail!(
                    "No reply from the browser bridge within {}ms",
                    budget.as_millis()
                ),
                Ok(Err(err)) => return Err(err).context("Failed to read from the browser bridge"),
                Ok(Ok(None)) => {
                    let status = self
                        .child
                        .try_wait()
                        .ok()
                        .flatten()
                        .map(|status| status.to_string())
                        .unwrap_or_else(|| "output closed".to_string());
                    bail!("Browser bridge exited ({status})");
                }
                Ok(Ok(Some(line))) => line,
            };

            match parse_reply_line(&line) {
                Some(Ok(reply)) if reply.id == id => return reply.into_result(),
                Some(Ok(reply)) => {
                    warn!(expected = id, got = reply.id, "discarding stale bridge reply")
                }
                Some(Err(err)) => warn!("{err:#}"),
                None => debug!(target: "courtsnipe::bridge", "{line}"),
            }
        }
    }

    async fn send(&mut self, id: u64, op: &BridgeOp) -> Result<()> {
        let line = BridgeRequest { id, op }.to_line()?;
        debug!(id, op = op.name(), "bridge request");
        self.stdin
            .write_all(line.as_bytes())
            .await
            .context("Failed to write to the browser bridge")?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Wait for the bridge process to exit, killing it after `budget`.
    async fn reap(&mut self, budget: Duration) {
        match timeout(budget, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "browser bridge exited"),
            Ok(Err(err)) => warn!("Failed to wait for the browser bridge: {err}"),
            Err(_) => {
                warn!("Browser bridge did not exit, killing it");
                self.child.start_kill().ok();
            }
        }
    }

    /// Close the browser of a bridge that will not be used, saving `trace`.
    async fn shut_down(&mut self, id: u64, trace: Option<&Path>) {
        if let Some(path) = trace
            && let Err(err) = ensure_parent(path).await
        {
            warn!("{err:#}");
        }
        let op = BridgeOp::Close {
            trace_path: trace.map(|path| path.display().to_string()),
        };
        let closed = match self.send(id, &op).await {
            Ok(()) => self.read_reply(id, SHUTDOWN_BUDGET).await.map(|_| ()),
            Err(err) => Err(err),
        };
        match closed {
            Ok(()) => {
                if let Some(path) = trace {
                    info!(trace = %path.display(), "launch trace saved");
                }
            }
            Err(err) => debug!("bridge shutdown after failed launch: {err:#}"),
        }
        self.reap(SHUTDOWN_BUDGET).await;
    }
}

/// Drives one browser context through the bridge. Requests are serialized.
pub struct PlaywrightDriver {
    selectors: SiteSelectors,
    io: Mutex<BridgeIo>,
    next_id: AtomicU64,
    op_timeout: Duration,
    type_delay: Duration,
    landed_url: String,
    _script_dir: Option<TempDir>,
}

impl PlaywrightDriver {
    /// Probe the runtime, start the bridge and open the scheduler.
    ///
    /// Fails when the portal answers with its login page and the session
    /// could not be renewed.
    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        let probe = probe_runtime(options.cwd.as_deref()).await;
        ensure_probe_ready(&probe)?;

        let script = build_bridge_script(&BridgeLaunch {
            headless: options.headless,
            user_agent: options.user_agent.clone(),
            storage_state: options
                .storage_state
                .as_ref()
                .map(|path| path.display().to_string()),
            scheduler_url: options.scheduler_url.clone(),
            login_marker: options.login_path_marker.clone(),
            post_login_pattern: options.post_login_pattern.clone(),
            username: options.username.clone(),
            action_timeout_ms: options.op_timeout.as_millis() as u64,
            selectors: LoginSelectors {
                email: options.selectors.email.clone(),
                password: options.selectors.password.clone(),
                login_button: options.selectors.login_button.clone(),
                scheduler: options.selectors.scheduler.clone(),
            },
        })?;

        let script_dir = tempfile::Builder::new()
            .prefix("courtsnipe-bridge-")
            .tempdir()?;
        let script_path = script_dir.path().join("bridge.mjs");
        std::fs::write(&script_path, script)?;

        let mut command = node_command(options.cwd.as_deref(), options.password.as_deref());
        command.arg(&script_path);

        let mut driver = Self::start(command, &options).await?;
        driver._script_dir = Some(script_dir);
        Ok(driver)
    }

    async fn start(mut command: Command, options: &LaunchOptions) -> Result<Self> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().context("Failed to start the browser bridge")?;
        let stdin = child.stdin.take().context("Browser bridge stdin unavailable")?;
        let stdout = child
            .stdout
            .take()
            .context("Browser bridge stdout unavailable")?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }

        let mut io = BridgeIo {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };
        let landing = io
            .read_reply(READY_ID, options.launch_timeout)
            .await
            .context("Browser bridge failed to open the scheduler")
            .and_then(|ready| {
                serde_json::from_value::<Landing>(ready).context("Unexpected bridge startup reply")
            });
        let landing = match landing {
            Ok(landing) => landing,
            Err(err) => {
                io.shut_down(READY_ID + 1, options.failure_trace.as_deref())
                    .await;
                return Err(err);
            }
        };

        if landing.url.contains(&options.login_path_marker) {
            io.shut_down(READY_ID + 1, options.failure_trace.as_deref())
                .await;
            bail!(
                "Session expired: the portal redirected to its login page ({})",
                landing.url
            );
        }
        info!(url = %landing.url, signed_in = landing.signed_in, "scheduler opened");

        Ok(Self {
            selectors: options.selectors.clone(),
            io: Mutex::new(io),
            next_id: AtomicU64::new(READY_ID + 1),
            op_timeout: options.op_timeout,
            type_delay: options.type_delay,
            landed_url: landing.url,
            _script_dir: None,
        })
    }

    /// URL the scheduler page ended up on after launch.
    pub fn landed_url(&self) -> &str {
        &self.landed_url
    }

    async fn request(&self, op: BridgeOp) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let budget = op.budget(self.op_timeout) + TRANSPORT_GRACE;

        let mut io = self.io.lock().await;
        io.send(id, &op).await?;
        io.read_reply(id, budget)
            .await
            .with_context(|| format!("Browser op '{}' failed", op.name()))
    }

    async fn request_as<T: DeserializeOwned>(&self, op: BridgeOp) -> Result<T> {
        let name = op.name();
        let value = self.request(op).await?;
        serde_json::from_value(value).with_context(|| format!("Unexpected reply to '{name}'"))
    }
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "courtsnipe::bridge", "stderr: {line}");
    }
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

#[async_trait]
impl RemoteUi for PlaywrightDriver {
    async fn read_date(&self) -> Result<Option<NaiveDate>> {
        self.request_as(BridgeOp::ReadDate).await
    }

    async fn set_date(&self, date: NaiveDate) -> Result<()> {
        self.request(BridgeOp::SetDate { date }).await?;
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.request(BridgeOp::Reload).await?;
        Ok(())
    }

    async fn wait_for_text(&self, target: &Locator, text: &str, timeout: Duration) -> Result<bool> {
        self.request_as(BridgeOp::WaitForText {
            selector: self.selectors.resolve(target),
            text: text.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })
        .await
    }

    async fn wait_for_visible(&self, target: &Locator, timeout: Duration) -> Result<bool> {
        self.request_as(BridgeOp::WaitForVisible {
            selector: self.selectors.resolve(target),
            timeout_ms: timeout.as_millis() as u64,
        })
        .await
    }

    async fn snapshot(&self) -> Result<ScheduleSnapshot> {
        self.request_as(BridgeOp::Snapshot).await
    }

    async fn is_visible(&self, target: &Locator) -> Result<bool> {
        self.request_as(BridgeOp::IsVisible {
            selector: self.selectors.resolve(target),
        })
        .await
    }

    async fn click(&self, target: &Locator) -> Result<()> {
        self.request(BridgeOp::Click {
            selector: self.selectors.resolve(target),
        })
        .await?;
        Ok(())
    }

    async fn type_text(&self, target: &Locator, text: &str) -> Result<()> {
        self.request(BridgeOp::Type {
            selector: self.selectors.resolve(target),
            text: text.to_string(),
            delay_ms: self.type_delay.as_millis() as u64,
        })
        .await?;
        Ok(())
    }

    async fn read_dataset(&self, source: Dataset) -> Result<Vec<String>> {
        self.request_as(BridgeOp::ReadDataset {
            widget: self.selectors.widget(source),
        })
        .await
    }

    async fn select_option(&self, source: Dataset, index: usize) -> Result<()> {
        self.request(BridgeOp::SelectOption {
            widget: self.selectors.widget(source),
            index,
        })
        .await?;
        Ok(())
    }

    async fn selected_text(&self, source: Dataset) -> Result<Option<String>> {
        self.request_as(BridgeOp::SelectedText {
            widget: self.selectors.widget(source),
        })
        .await
    }

    async fn is_checked(&self, target: &Locator) -> Result<bool> {
        self.request_as(BridgeOp::IsChecked {
            selector: self.selectors.resolve(target),
        })
        .await
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        ensure_parent(path).await?;
        self.request(BridgeOp::Screenshot {
            path: path.display().to_string(),
        })
        .await?;
        Ok(())
    }

    async fn close(&self, trace: Option<&Path>) -> Result<()> {
        if let Some(path) = trace {
            ensure_parent(path).await?;
        }
        let result = self
            .request(BridgeOp::Close {
                trace_path: trace.map(|path| path.display().to_string()),
            })
            .await;

        self.io.lock().await.reap(Duration::from_secs(10)).await;
        result.map(|_| ())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use courtsnipe_core::BookableUnit;

    /// A shell stand-in for the bridge: announces a landing URL, then answers
    /// every request with `value`, exiting after `close`.
    fn fake_bridge(landing: &str, value: &str) -> Command {
        recording_bridge(landing, value, Path::new("/dev/null"))
    }

    /// [`fake_bridge`] that also appends every request line to `log`.
    fn recording_bridge(landing: &str, value: &str, log: &Path) -> Command {
        let log = log.display();
        let program = format!(
            r#"echo '__COURTSNIPE_REPLY__={{"id":0,"ok":true,"value":{{"url":"{landing}"}}}}'
echo 'page console noise'
while IFS= read -r line; do
  printf '%s\n' "$line" >> '{log}'
  id=$(printf '%s' "$line" | sed 's/^{{"id":\([0-9]*\).*/\1/')
  echo "__COURTSNIPE_REPLY__={{\"id\":$id,\"ok\":true,\"value\":{value}}}"
  case "$line" in *'"op":"close"'*) exit 0;; esac
done"#
        );
        let mut command = Command::new("sh");
        command.arg("-c").arg(program);
        command
    }

    fn options() -> LaunchOptions {
        let mut options = LaunchOptions::new("https://portal.example/Bookings/1?sId=2");
        options.launch_timeout = Duration::from_secs(10);
        options.op_timeout = Duration::from_secs(5);
        options
    }

    #[tokio::test]
    async fn requests_round_trip_through_the_bridge() {
        let driver = PlaywrightDriver::start(
            fake_bridge("https://portal.example/Bookings/1?sId=2", "true"),
            &options(),
        )
        .await
        .unwrap();

        assert_eq!(driver.landed_url(), "https://portal.example/Bookings/1?sId=2");
        let button = Locator::ReserveButton {
            unit: BookableUnit::new("Redmond 4"),
            time_label: "6:00 PM".to_string(),
        };
        assert!(driver.is_visible(&button).await.unwrap());
        assert!(driver.is_checked(&Locator::WaiverCheckbox).await.unwrap());
        driver.click(&button).await.unwrap();
    }

    #[tokio::test]
    async fn login_page_landing_means_the_session_expired() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("requests.log");
        let trace = dir.path().join("artifacts").join("trace-error-launch.zip");
        let mut options = options();
        options.failure_trace = Some(trace.clone());

        let result = PlaywrightDriver::start(
            recording_bridge(
                "https://portal.example/Online/Account/Login/7031",
                "null",
                &log,
            ),
            &options,
        )
        .await;

        let err = result.err().expect("launch should fail");
        assert!(err.to_string().contains("Session expired"));

        let requests = std::fs::read_to_string(&log).unwrap();
        assert_eq!(requests.lines().count(), 1);
        assert!(requests.contains(r#""op":"close""#));
        assert!(requests.contains(&trace.display().to_string()));
        assert!(trace.parent().unwrap().is_dir());
    }

    #[tokio::test]
    async fn unreadable_startup_reply_still_closes_the_browser() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("requests.log");
        let program = format!(
            r#"echo '__COURTSNIPE_REPLY__={{"id":0,"ok":true,"value":7}}'
while IFS= read -r line; do
  printf '%s\n' "$line" >> '{}'
  echo '__COURTSNIPE_REPLY__={{"id":1,"ok":true,"value":null}}'
  exit 0
done"#,
            log.display()
        );
        let mut command = Command::new("sh");
        command.arg("-c").arg(program);

        let err = PlaywrightDriver::start(command, &options())
            .await
            .err()
            .expect("launch should fail");

        assert!(format!("{err:#}").contains("Unexpected bridge startup reply"));
        let requests = std::fs::read_to_string(&log).unwrap();
        assert!(requests.starts_with(r#"{"id":1,"op":"close""#));
    }

    #[tokio::test]
    async fn close_saves_the_trace_and_waits_for_exit() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("requests.log");
        let trace = dir.path().join("trace.zip");
        let driver = PlaywrightDriver::start(
            recording_bridge("https://portal.example/Bookings/1", "null", &log),
            &options(),
        )
        .await
        .unwrap();

        driver.close(Some(&trace)).await.unwrap();

        let requests = std::fs::read_to_string(&log).unwrap();
        assert!(requests.contains(r#""op":"close""#));
        assert!(requests.contains("trace.zip"));
    }

    #[tokio::test]
    async fn replies_of_the_wrong_shape_are_errors() {
        let driver = PlaywrightDriver::start(
            fake_bridge("https://portal.example/Bookings/1", "42"),
            &options(),
        )
        .await
        .unwrap();

        let err = driver
            .read_dataset(Dataset::DurationOptions)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("readDataset"));
    }

    #[tokio::test]
    async fn a_dead_bridge_fails_fast() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("exit 3");

        let err = PlaywrightDriver::start(command, &options())
            .await
            .err()
            .expect("launch should fail");
        assert!(format!("{err:#}").contains("Browser bridge exited"));
    }
}
