//! Offline driver for the JustPremium adapter.
//!
//! Compiles zone conditions, builds bid requests and replays recorded bid
//! responses against a publisher partner config, printing JSON. Wrapper
//! services are replaced by recording doubles whose calls are included in the
//! output.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod error;
pub mod logging;

use error::CliError;
use justpremium_htb_common::settings::Settings;

#[derive(Parser)]
#[command(name = "jphtb")]
#[command(about = "Compile JustPremium zone conditions and replay bid responses")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings TOML (defaults to the embedded settings)
    #[arg(long, short, global = true, env = "JPHTB_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the compiled zone conditions for a partner config
    Conditions {
        /// Partner config JSON (`xSlots`, `mapping`, optional `bidTransformer`)
        #[arg(long, short)]
        partner_config: PathBuf,
    },

    /// Build the bid request(s) for a partner config
    Request {
        #[arg(long, short)]
        partner_config: PathBuf,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Match a recorded bid response onto a partner config's slots
    Parse {
        #[arg(long, short)]
        partner_config: PathBuf,

        /// Recorded response body
        #[arg(long, short)]
        response: PathBuf,

        #[arg(long, default_value = "jphtb")]
        session_id: String,
    },

    /// Print the effective settings after environment overrides
    Settings,
}

/// Page facts normally read from the browser.
#[derive(clap::Args, Debug, Clone)]
pub struct PageArgs {
    #[arg(long, default_value = "localhost")]
    pub hostname: String,

    /// Page protocol including the colon
    #[arg(long, default_value = "https:")]
    pub protocol: String,

    /// Raw page `Cookie` header
    #[arg(long)]
    pub cookie: Option<String>,

    #[arg(long, default_value_t = 1920)]
    pub screen_width: u32,

    #[arg(long, default_value_t = 1080)]
    pub screen_height: u32,

    #[arg(long, default_value_t = 1280)]
    pub viewport_width: u32,

    #[arg(long, default_value_t = 720)]
    pub viewport_height: u32,
}

/// Run a command against loaded settings, returning what to print.
///
/// # Errors
///
/// Returns an error if an input file cannot be read or decoded, or the
/// adapter is disabled.
pub fn execute(command: &Commands, settings: &Settings) -> Result<String, CliError> {
    match command {
        Commands::Conditions { partner_config } => commands::conditions(partner_config),
        Commands::Request {
            partner_config,
            page,
        } => commands::request(settings, partner_config, &page.to_page_context()),
        Commands::Parse {
            partner_config,
            response,
            session_id,
        } => commands::parse(settings, partner_config, response, session_id),
        Commands::Settings => commands::settings(settings),
    }
}

impl PageArgs {
    #[must_use]
    pub fn to_page_context(&self) -> justpremium_htb_common::auction::PageContext {
        justpremium_htb_common::auction::PageContext {
            protocol: self.protocol.clone(),
            hostname: self.hostname.clone(),
            screen_width: self.screen_width,
            screen_height: self.screen_height,
            viewport_width: self.viewport_width,
            viewport_height: self.viewport_height,
            cookie_header: self.cookie.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_request_command() {
        let cli = Cli::try_parse_from([
            "jphtb",
            "request",
            "--partner-config",
            "partner.json",
            "--hostname",
            "publisher.example",
            "--cookie",
            "jpxhbjs=v2/",
            "-v",
        ])
        .expect("should parse");

        assert!(cli.verbose);
        let Commands::Request {
            partner_config,
            page,
        } = cli.command
        else {
            panic!("expected request command");
        };
        assert_eq!(partner_config, PathBuf::from("partner.json"));

        let page = page.to_page_context();
        assert_eq!(page.hostname, "publisher.example");
        assert_eq!(page.protocol, "https:");
        assert_eq!(page.cookie("jpxhbjs").as_deref(), Some("v2/"));
        assert_eq!(page.screen_width, 1920);
    }

    #[test]
    fn test_cli_requires_partner_config() {
        assert!(Cli::try_parse_from(["jphtb", "conditions"]).is_err());
    }

    #[test]
    fn test_cli_parse_defaults_session() {
        let cli = Cli::try_parse_from([
            "jphtb",
            "parse",
            "-p",
            "partner.json",
            "-r",
            "response.json",
        ])
        .expect("should parse");

        assert!(matches!(
            cli.command,
            Commands::Parse { ref session_id, .. } if session_id == "jphtb"
        ));
    }
}
