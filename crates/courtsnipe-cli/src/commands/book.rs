use anyhow::Result;
use chrono::Local;
use colored::Colorize;
use courtsnipe_browser::PlaywrightDriver;
use courtsnipe_core::{
    NavigationOutcome, Orchestrator, PartnerOutcome, RunReport, SystemClock, WaitOutcome,
    WaiverOutcome,
};
use std::fmt::Write;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use super::password_from_env;
use crate::cli::BookArgs;
use crate::config::LoadedConfig;

pub async fn run(config_path: &Path, args: BookArgs) -> Result<()> {
    let config = LoadedConfig::load(config_path)?;
    let plan = config.booking_plan(&args, Local::now().date_naive())?;
    let run_id = Uuid::new_v4();
    let mut options = config.launch_options(&args, password_from_env())?;
    options.failure_trace = Some(plan.artifacts.failure_trace(run_id));

    if options.storage_state.is_none() {
        warn!(
            auth_file = %config.auth_file().display(),
            "no stored session found; run `courtsnipe auth` first"
        );
    }

    info!(
        run_id = %run_id.simple(),
        slot = %plan.slot,
        location = args.location.as_deref().or(config.file.portal.location.as_deref()).unwrap_or_default(),
        dry_run = plan.dry_run,
        "starting booking run"
    );
    let driver = PlaywrightDriver::launch(options).await?;
    let report = Orchestrator::new(&driver, &SystemClock, &plan)
        .with_run_id(run_id)
        .execute()
        .await?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    print!("{}", summary(report));
}

fn summary(report: &RunReport) -> String {
    let mut out = String::new();
    let headline = if report.dry_run {
        format!(
            "{} Dry run complete: {} is ready on {} (not saved)",
            "✓".green().bold(),
            report.slot,
            report.unit.to_string().cyan()
        )
    } else {
        format!(
            "{} Booked {} for {}",
            "✓".green().bold(),
            report.unit.to_string().cyan(),
            report.slot
        )
    };
    let _ = writeln!(out, "{headline}");

    let _ = writeln!(out, "  Run:        {}", report.run_id.simple());
    let _ = writeln!(out, "  Navigation: {}", navigation_text(report.navigation));
    let _ = writeln!(out, "  Duration:   {}", report.form.duration);
    let _ = writeln!(out, "  Partner:    {}", partner_text(&report.form.partner));
    let _ = writeln!(out, "  Waiver:     {}", waiver_text(report.form.waiver));
    if let Some(wait) = &report.wait {
        let _ = writeln!(out, "  Wait:       {}", wait_text(wait));
    }
    if let Some(commit) = &report.commit {
        let _ = writeln!(out, "  Saved at:   {}", commit.clicked_at.format("%H:%M:%S%.3f"));
    }
    if let Some(evidence) = report.evidence() {
        let _ = writeln!(out, "  Evidence:   {}", evidence.display());
    }

    if !report.warnings.is_empty() {
        let _ = writeln!(out, "\n{}", "Warnings:".yellow().bold());
        for warning in &report.warnings {
            let _ = writeln!(out, "  - {warning}");
        }
    }
    out
}

fn navigation_text(outcome: NavigationOutcome) -> &'static str {
    match outcome {
        NavigationOutcome::AlreadySynced => "already on the target date",
        NavigationOutcome::Confirmed => "moved to the target date",
        NavigationOutcome::Unconfirmed => "moved, date not confirmed",
    }
}

fn partner_text(outcome: &PartnerOutcome) -> String {
    match outcome {
        PartnerOutcome::NotRequested => "none".to_string(),
        PartnerOutcome::Attached { name, matched } if name == matched => name.clone(),
        PartnerOutcome::Attached { name, matched } => format!("{matched} (searched '{name}')"),
        PartnerOutcome::Skipped => "skipped".to_string(),
    }
}

fn waiver_text(outcome: WaiverOutcome) -> &'static str {
    match outcome {
        WaiverOutcome::AlreadyAccepted => "already accepted",
        WaiverOutcome::Accepted => "accepted",
        WaiverOutcome::Unconfirmed => "not confirmed",
    }
}

fn wait_text(outcome: &WaitOutcome) -> String {
    match outcome {
        WaitOutcome::Fired { waited, late_by } => format!(
            "{:.1}s until the deadline, fired {}ms late",
            waited.as_secs_f64(),
            late_by.num_milliseconds()
        ),
        WaitOutcome::AlreadyPassed { late_by } => format!(
            "deadline already passed by {:.1}s",
            late_by.num_milliseconds() as f64 / 1000.0
        ),
    }
}
