//! JustPremium adapter CLI.
//!
//! Commands:
//! - `conditions`: compiled zone conditions for a partner config
//! - `request`: bid request(s) the adapter would send
//! - `parse`: slot results for a recorded bid response
//! - `settings`: effective settings after environment overrides

use clap::Parser;

use jphtb::error::CliError;
use jphtb::{commands, execute, logging, Cli};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let settings = commands::load_settings(cli.settings.as_deref())?;
    logging::init(logging::level(cli.verbose, &settings.logging.level))?;

    let output = execute(&cli.command, &settings)?;
    println!("{}", output);
    Ok(())
}
