use serde_json::json;

use crate::cli::utils::{output_json, parse_role};
use crate::cli::OutputFormat;
use crate::permissions::{catalog, role_permissions, Role};

pub fn list(output_format: OutputFormat) -> anyhow::Result<()> {
    let catalog = catalog();

    match output_format {
        OutputFormat::Json => {
            let roles: Vec<_> = Role::ALL
                .iter()
                .map(|role| {
                    json!({
                        "role": role,
                        "name": role.display_name(),
                        "level": role.level(),
                        "permissions": catalog.definition(*role).map_or(0, |d| d.permissions.len()),
                    })
                })
                .collect();
            output_json(&json!({ "roles": roles }))
        }
        OutputFormat::Text => {
            println!("{:<10} {:<16} {:<6} {}", "ROLE", "NAME", "LEVEL", "PERMISSIONS");
            println!("{}", "-".repeat(48));
            for role in Role::ALL {
                let count = catalog.definition(role).map_or(0, |d| d.permissions.len());
                println!("{:<10} {:<16} {:<6} {}", role.as_str(), role.display_name(), role.level(), count);
            }
            Ok(())
        }
    }
}

pub fn permissions(role: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let role = parse_role(role)?;
    let permissions = role_permissions(Some(role));

    match output_format {
        OutputFormat::Json => output_json(&json!({
            "role": role,
            "permissions": permissions,
        })),
        OutputFormat::Text => {
            println!("{} ({} permissions)", role.display_name(), permissions.len());
            for permission in permissions {
                println!("  {:<28} {}", permission.id, permission.description);
            }
            Ok(())
        }
    }
}
