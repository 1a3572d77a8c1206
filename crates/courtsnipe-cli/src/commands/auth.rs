use anyhow::{Context, Result, anyhow, bail};
use colored::Colorize;
use courtsnipe_browser::{SignInRequest, sign_in};
use std::path::Path;
use std::time::Duration;

use super::password_from_env;
use crate::config::LoadedConfig;

/// How long the portal gets to redirect after the login click.
const REDIRECT_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn run(config_path: &Path) -> Result<()> {
    let config = LoadedConfig::load(config_path)?;
    let username = config
        .file
        .account
        .username
        .clone()
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| anyhow!("No username configured: set [account].username"))?;

    let password = match password_from_env() {
        Some(password) => password,
        None => prompt_password(&username).await?,
    };
    if password.is_empty() {
        bail!("A password is required to sign in");
    }

    let storage_state = config.auth_file();
    if let Some(parent) = storage_state.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let request = SignInRequest {
        login_url: config.file.portal.login_url.clone(),
        post_login_pattern: config.file.portal.post_login_pattern.clone(),
        username,
        password,
        storage_state,
        headless: false,
        user_agent: config.file.browser.user_agent.clone(),
        selectors: config.file.browser.selectors.clone(),
        cwd: config.node_dir(),
        redirect_timeout: REDIRECT_TIMEOUT,
    };

    println!("Opening the login page; the browser window closes once signed in.");
    let outcome = sign_in(&request).await?;
    println!(
        "{} Signed in ({:.1}s). Session saved to {}",
        "✓".green().bold(),
        outcome.duration_ms as f64 / 1000.0,
        outcome.storage_state.display()
    );
    Ok(())
}

async fn prompt_password(username: &str) -> Result<String> {
    let prompt = format!("Password for {username}: ");
    tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
        .await
        .context("Password prompt was interrupted")?
        .context("Failed to read password")
}
