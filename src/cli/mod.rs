pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "agency")]
#[command(about = "Agency CRM CLI - inspect roles and permissions, mint tokens, screen input")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "List roles in hierarchy order")]
    Roles,

    #[command(about = "List the permissions a role holds")]
    Permissions {
        #[arg(help = "Role name (agent, manager, admin, owner)")]
        role: String,
    },

    #[command(about = "Evaluate a role-hierarchy decision")]
    Check {
        #[command(subcommand)]
        cmd: commands::check::CheckCommands,
    },

    #[command(about = "Mint a signed bearer token for local testing")]
    Token {
        #[arg(help = "Role to embed in the token")]
        role: String,

        #[arg(long, help = "User id (default: a fresh UUID)")]
        user: Option<String>,

        #[arg(long, help = "User email", default_value = "cli@agency.local")]
        email: String,

        #[arg(long, help = "Hours until expiry (default: configured jwt_expiry_hours)")]
        hours: Option<u64>,
    },

    #[command(about = "Screen text for attack signatures")]
    Scan {
        #[arg(help = "Text to screen")]
        text: String,
    },

    #[command(about = "Permission catalog maintenance")]
    Catalog {
        #[command(subcommand)]
        cmd: commands::catalog::CatalogCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Roles => commands::roles::list(output_format),
        Commands::Permissions { role } => commands::roles::permissions(&role, output_format),
        Commands::Check { cmd } => commands::check::handle(cmd, output_format),
        Commands::Token { role, user, email, hours } => {
            commands::token::handle(&role, user, &email, hours, output_format)
        }
        Commands::Scan { text } => commands::scan::handle(&text, output_format),
        Commands::Catalog { cmd } => commands::catalog::handle(cmd, output_format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_command_with_defaults() {
        let cli = Cli::try_parse_from(["agency", "--json", "token", "manager", "--hours", "2"]).unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        match cli.command {
            Commands::Token { role, user, email, hours } => {
                assert_eq!(role, "manager");
                assert_eq!(user, None);
                assert_eq!(email, "cli@agency.local");
                assert_eq!(hours, Some(2));
            }
            _ => panic!("expected token command"),
        }
    }

    #[test]
    fn global_format_flag_follows_subcommand() {
        let cli = Cli::try_parse_from(["agency", "scan", "hello", "--text"]).unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Text));
    }
}
