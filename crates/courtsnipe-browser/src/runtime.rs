//! Node.js / Playwright runtime discovery and one-shot node jobs.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

pub(crate) const RESULT_MARKER: &str = "__COURTSNIPE_RESULT__=";

/// Environment variable the page scripts read the portal password from.
pub(crate) const PASSWORD_VAR: &str = "COURTSNIPE_PASSWORD";

/// Snippet that loads Playwright from the working directory's node_modules,
/// falling back to a global install.
pub(crate) const LOAD_PLAYWRIGHT_JS: &str = "\
import { createRequire } from 'node:module';
import path from 'node:path';

async function loadChromium() {
  try {
    const require = createRequire(path.join(process.cwd(), 'courtsnipe.cjs'));
    return require('playwright').chromium;
  } catch (_) {
    return (await import('playwright')).chromium;
  }
}
";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeProbe {
    pub node_available: bool,
    pub node_version: Option<String>,
    pub playwright_package_available: bool,
    pub chromium_cache_detected: bool,
    pub ready: bool,
    pub notes: Vec<String>,
}

/// Check for node, the playwright package (resolved from `cwd`) and a Chromium download.
pub async fn probe_runtime(cwd: Option<&Path>) -> RuntimeProbe {
    let mut probe = RuntimeProbe::default();

    if let Ok(output) = NodeJob::version().in_dir(cwd).run().await
        && output.succeeded()
    {
        probe.node_available = true;
        probe.node_version = Some(output.stdout.trim().to_string());
    }

    if probe.node_available {
        probe.playwright_package_available =
            NodeJob::with_playwright("await loadChromium();\n")
                .in_dir(cwd)
                .limit(Duration::from_secs(15))
                .run()
                .await
                .is_ok_and(|output| output.succeeded());
    }

    probe.chromium_cache_detected = playwright_cache_roots()
        .iter()
        .any(|root| holds_chromium(root));
    probe.ready = probe.node_available && probe.playwright_package_available;

    if !probe.node_available {
        probe
            .notes
            .push("Node.js not found. Install Node.js 20+ to drive the browser.".to_string());
    }
    if probe.node_available && !probe.playwright_package_available {
        probe
            .notes
            .push("Playwright npm package not found. Run: npm i -D playwright".to_string());
    }
    if probe.ready && !probe.chromium_cache_detected {
        probe.notes.push(
            "Chromium not found in the Playwright cache. Run: npx playwright install chromium"
                .to_string(),
        );
    }

    debug!(?probe, "runtime probe finished");
    probe
}

pub fn ensure_probe_ready(probe: &RuntimeProbe) -> Result<()> {
    if !probe.node_available {
        bail!("Node.js is required to drive the browser");
    }
    if !probe.playwright_package_available {
        bail!("Playwright npm package is not available. Install it with: npm i -D playwright");
    }
    Ok(())
}

/// `node` started in `cwd` with the portal password, if any, in its environment.
pub(crate) fn node_command(cwd: Option<&Path>, password: Option<&str>) -> Command {
    let mut command = Command::new("node");
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    if let Some(password) = password {
        command.env(PASSWORD_VAR, password);
    }
    command
}

/// A short-lived `node` run whose output is collected once it exits.
pub(crate) struct NodeJob<'a> {
    args: Vec<OsString>,
    cwd: Option<&'a Path>,
    password: Option<&'a str>,
    limit: Duration,
}

impl<'a> NodeJob<'a> {
    fn new(args: Vec<OsString>) -> Self {
        Self {
            args,
            cwd: None,
            password: None,
            limit: Duration::from_secs(10),
        }
    }

    pub fn version() -> Self {
        Self::new(vec!["--version".into()])
    }

    /// Run an ES module written to disk.
    pub fn module(path: &Path) -> Self {
        Self::new(vec![path.as_os_str().to_owned()])
    }

    /// Run `body` as an inline ES module with `loadChromium()` in scope.
    pub fn with_playwright(body: &str) -> Self {
        Self::new(vec![
            "--input-type=module".into(),
            "-e".into(),
            format!("{LOAD_PLAYWRIGHT_JS}{body}").into(),
        ])
    }

    pub fn in_dir(mut self, cwd: Option<&'a Path>) -> Self {
        self.cwd = cwd;
        self
    }

    pub fn password(mut self, password: &'a str) -> Self {
        self.password = Some(password);
        self
    }

    pub fn limit(mut self, limit: Duration) -> Self {
        self.limit = limit;
        self
    }

    pub async fn run(self) -> Result<NodeOutput> {
        let mut command = node_command(self.cwd, self.password);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(self.limit, command.output())
            .await
            .map_err(|_| anyhow!("node ran past {}s and was stopped", self.limit.as_secs()))?
            .context("Could not run node")?;

        Ok(NodeOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

pub(crate) struct NodeOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl NodeOutput {
    pub fn succeeded(&self) -> bool {
        self.status.success()
    }

    /// The job's tagged result (the last parseable one wins) and the rest of stdout.
    pub fn split_result(&self) -> (Option<Value>, String) {
        split_result(&self.stdout)
    }
}

fn split_result(stdout: &str) -> (Option<Value>, String) {
    let (tagged, plain): (Vec<&str>, Vec<&str>) = stdout
        .lines()
        .partition(|line| line.starts_with(RESULT_MARKER));
    let result = tagged
        .iter()
        .rev()
        .filter_map(|line| line.strip_prefix(RESULT_MARKER))
        .find_map(|json| serde_json::from_str::<Value>(json.trim()).ok());
    (result, plain.join("\n"))
}

/// Directories Playwright may have downloaded browsers into.
fn playwright_cache_roots() -> Vec<PathBuf> {
    if let Some(custom) = std::env::var_os("PLAYWRIGHT_BROWSERS_PATH") {
        return vec![PathBuf::from(custom)];
    }
    let home = std::env::var_os("HOME").map(PathBuf::from);
    [
        home.as_ref().map(|home| home.join(".cache").join("ms-playwright")),
        home.as_ref()
            .map(|home| home.join("Library").join("Caches").join("ms-playwright")),
        std::env::var_os("LOCALAPPDATA").map(|local| PathBuf::from(local).join("ms-playwright")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// True when `root` holds a `chromium-<revision>` download.
fn holds_chromium(root: &Path) -> bool {
    std::fs::read_dir(root).is_ok_and(|entries| {
        entries
            .flatten()
            .any(|entry| entry.file_name().to_string_lossy().starts_with("chromium"))
    })
}
