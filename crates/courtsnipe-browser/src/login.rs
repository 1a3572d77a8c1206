//! One-shot sign-in that produces the stored browser session.

use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::runtime::{NodeJob, ensure_probe_ready, probe_runtime};
use crate::script::{LoginJob, LoginSelectors, build_login_script};
use crate::selectors::SiteSelectors;

#[derive(Debug, Clone)]
pub struct SignInRequest {
    pub login_url: String,
    pub post_login_pattern: String,
    pub username: String,
    pub password: String,
    /// Where the Playwright storage state is written.
    pub storage_state: PathBuf,
    pub headless: bool,
    pub user_agent: Option<String>,
    pub selectors: SiteSelectors,
    pub cwd: Option<PathBuf>,
    /// How long to wait for the post-login redirect.
    pub redirect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SignInOutcome {
    pub landed_url: String,
    pub storage_state: PathBuf,
    pub duration_ms: u64,
}

/// Sign in through the portal's login form and save the session.
pub async fn sign_in(request: &SignInRequest) -> Result<SignInOutcome> {
    let probe = probe_runtime(request.cwd.as_deref()).await;
    ensure_probe_ready(&probe)?;

    let script = build_login_script(&LoginJob {
        headless: request.headless,
        user_agent: request.user_agent.clone(),
        login_url: request.login_url.clone(),
        post_login_pattern: request.post_login_pattern.clone(),
        username: request.username.clone(),
        storage_state: request.storage_state.display().to_string(),
        timeout_ms: request.redirect_timeout.as_millis() as u64,
        selectors: LoginSelectors {
            email: request.selectors.email.clone(),
            password: request.selectors.password.clone(),
            login_button: request.selectors.login_button.clone(),
            scheduler: request.selectors.scheduler.clone(),
        },
    })?;

    let temp_dir = tempfile::Builder::new()
        .prefix("courtsnipe-login-")
        .tempdir()?;
    let script_path = temp_dir.path().join("login.mjs");
    std::fs::write(&script_path, script)?;

    info!(url = %request.login_url, user = %request.username, "signing in");
    let started = Instant::now();
    let output = NodeJob::module(&script_path)
        .in_dir(request.cwd.as_deref())
        .password(&request.password)
        .limit(request.redirect_timeout + Duration::from_secs(60))
        .run()
        .await
        .context("Sign-in job did not finish")?;
    let duration_ms = started.elapsed().as_millis() as u64;

    let (payload, stdout) = output.split_result();
    if !stdout.trim().is_empty() {
        debug!(target: "courtsnipe::bridge", "{}", stdout.trim());
    }

    let Some(payload) = payload else {
        let stderr = output.stderr.trim();
        if stderr.is_empty() {
            bail!("Sign-in job ended with {}", output.status);
        }
        bail!("Sign-in failed: {stderr}");
    };
    interpret_payload(payload, &request.storage_state, duration_ms)
}

fn interpret_payload(
    payload: Value,
    storage_state: &std::path::Path,
    duration_ms: u64,
) -> Result<SignInOutcome> {
    let landed_url = payload
        .get("url")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if payload.get("success").and_then(Value::as_bool) != Some(true) {
        let error = payload
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        let first_line = error.lines().next().unwrap_or(error);
        bail!("Sign-in failed at {landed_url}: {first_line}");
    }

    info!(url = %landed_url, duration_ms, "signed in, session saved");
    Ok(SignInOutcome {
        landed_url,
        storage_state: storage_state.to_path_buf(),
        duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;

    #[test]
    fn successful_payload_reports_the_landing() {
        let outcome = interpret_payload(
            json!({"success": true, "url": "https://portal.example/Online/Portal/Index/1"}),
            Path::new("/tmp/auth.json"),
            1200,
        )
        .unwrap();

        assert_eq!(outcome.landed_url, "https://portal.example/Online/Portal/Index/1");
        assert_eq!(outcome.storage_state, PathBuf::from("/tmp/auth.json"));
    }

    #[test]
    fn failed_payload_keeps_only_the_headline() {
        let err = interpret_payload(
            json!({
                "success": false,
                "url": "https://portal.example/Online/Account/Login/1",
                "error": "TimeoutError: page.waitForURL: Timeout 30000ms exceeded.\n    at login.mjs:40"
            }),
            Path::new("/tmp/auth.json"),
            30_000,
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Timeout 30000ms exceeded"));
        assert!(message.contains("/Account/Login"));
        assert!(!message.contains("login.mjs:40"));
    }
}
