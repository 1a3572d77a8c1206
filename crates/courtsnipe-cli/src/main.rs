mod cli;
mod commands;
mod completions;
mod config;
mod error;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        completions::generate_completions(shell);
        return;
    }

    let guard = init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        drop(guard);
        error::handle_error(err);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = config::config_path(cli.config.as_deref());
    match cli.command {
        Commands::Book(args) => commands::book::run(&config_path, args).await,
        Commands::Auth => commands::auth::run(&config_path).await,
        Commands::Doctor => commands::doctor::run(cli.config.as_deref()).await,
        Commands::Config { command } => commands::config::run(&config_path, command),
        Commands::Completions { .. } => Ok(()),
    }
}

/// Console plus daily-rolling file logging. The returned guard flushes the
/// file writer and must live until exit.
fn init_logging(verbose: bool) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("info,courtsnipe=debug,courtsnipe_core=debug,courtsnipe_browser=debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let console = fmt::layer()
        .with_target(false)
        .with_timer(ChronoLocal::new("%H:%M:%S".to_string()));

    let log_dir = config::log_dir();
    let (file, guard) = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&log_dir, "courtsnipe.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    guard
}
