use anyhow::Result;
use colored::Colorize;
use courtsnipe_browser::{ensure_probe_ready, probe_runtime};
use std::path::Path;

use crate::config::{LoadedConfig, config_path, log_dir};

pub async fn run(explicit_config: Option<&Path>) -> Result<()> {
    let path = config_path(explicit_config);

    let config = if path.exists() {
        match LoadedConfig::load(&path) {
            Ok(config) => {
                check(true, &format!("config {}", path.display()));
                Some(config)
            }
            Err(err) => {
                check(false, &format!("config {}: {err:#}", path.display()));
                None
            }
        }
    } else {
        check(
            false,
            &format!("config {} (run `courtsnipe config init`)", path.display()),
        );
        None
    };

    let node_dir = config.as_ref().and_then(LoadedConfig::node_dir);
    let probe = probe_runtime(node_dir.as_deref()).await;

    let node = match &probe.node_version {
        Some(version) => format!("node {version}"),
        None => "node".to_string(),
    };
    check(probe.node_available, &node);
    check(probe.playwright_package_available, "playwright package");
    check(probe.chromium_cache_detected, "chromium download");

    if let Some(config) = &config {
        let auth_file = config.auth_file();
        if auth_file.exists() {
            check(true, &format!("session {}", auth_file.display()));
        } else {
            check(
                false,
                &format!("session {} (run `courtsnipe auth`)", auth_file.display()),
            );
        }
        println!("  artifacts: {}", config.artifacts_dir().display());
    }
    println!("  logs:      {}", log_dir().display());

    for note in &probe.notes {
        println!("  {} {note}", "note:".dimmed());
    }

    ensure_probe_ready(&probe)
}

fn check(ok: bool, label: &str) {
    if ok {
        println!("{} {label}", "✓".green());
    } else {
        println!("{} {label}", "✗".red());
    }
}
