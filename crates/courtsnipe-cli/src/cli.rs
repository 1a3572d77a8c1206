use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "courtsnipe")]
#[command(
    version,
    about = "courtsnipe - book a court the moment the booking window opens"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to <config dir>/courtsnipe/config.toml)
    #[arg(long, global = true, env = "COURTSNIPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reserve the configured slot, saving right after the window opens
    Book(BookArgs),

    /// Sign in once and store the browser session
    Auth,

    /// Check that node, playwright and the stored session are usable
    Doctor,

    /// Configuration file helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Default)]
pub struct BookArgs {
    /// Target date (MM/DD/YYYY)
    #[arg(long)]
    pub date: Option<String>,

    /// Days from today to book; wins over --date
    #[arg(long)]
    pub offset: Option<u32>,

    /// Start time, e.g. "6:00 PM"
    #[arg(long)]
    pub time: Option<String>,

    /// Location name from [portal.locations]
    #[arg(long)]
    pub location: Option<String>,

    /// Run every step except the final save
    #[arg(long)]
    pub dry_run: bool,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the config file location
    Path,

    /// Write a commented config template
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
