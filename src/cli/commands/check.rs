use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_json, parse_role};
use crate::cli::OutputFormat;
use crate::permissions::{can_access_role_content, can_manage_user, Role};

#[derive(Subcommand)]
pub enum CheckCommands {
    #[command(about = "Can <role> view content owned by <target>?")]
    Access {
        #[arg(help = "Acting role")]
        role: String,
        #[arg(help = "Target role")]
        target: String,
    },

    #[command(about = "Can <role> manage accounts holding <target>?")]
    Manage {
        #[arg(help = "Acting role")]
        role: String,
        #[arg(help = "Target role")]
        target: String,
    },
}

pub fn handle(cmd: CheckCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let (check, role, target, decide): (&str, String, String, fn(Option<Role>, Role) -> bool) = match cmd {
        CheckCommands::Access { role, target } => ("access", role, target, can_access_role_content),
        CheckCommands::Manage { role, target } => ("manage", role, target, can_manage_user),
    };
    let acting = parse_role(&role)?;
    let target = parse_role(&target)?;
    let allowed = decide(Some(acting), target);

    match output_format {
        OutputFormat::Json => output_json(&json!({
            "check": check,
            "role": acting,
            "target": target,
            "allowed": allowed,
        })),
        OutputFormat::Text => {
            let verdict = if allowed { "ALLOWED" } else { "DENIED" };
            println!("{}: {} -> {} ({})", verdict, acting, target, check);
            Ok(())
        }
    }
}
