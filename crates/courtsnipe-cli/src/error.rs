use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = format!("{err:#}").to_lowercase();

    if msg.contains("session expired") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Sign in again to refresh the stored session:");
        eprintln!("  {} courtsnipe auth", "$".dimmed());
        eprintln!("  or set COURTSNIPE_PASSWORD so the session is renewed during the run.");
    }

    if msg.contains("config file not found") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Create a config file with:");
        eprintln!("  {} courtsnipe config init", "$".dimmed());
    }

    if msg.contains("playwright") || msg.contains("node.js") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Install the browser runtime next to your config:");
        eprintln!("  {} npm i -D playwright && npx playwright install chromium", "$".dimmed());
        eprintln!("  {} courtsnipe doctor", "$".dimmed());
    }

    if msg.contains("no court is free") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Every court is taken at that time; try another --time or --location.");
    }

    if msg.contains("connection refused") || msg.contains("net::err") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check your internet connection and try again.");
    }

    std::process::exit(1);
}
