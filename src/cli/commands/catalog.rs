use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::permissions::catalog;

#[derive(Subcommand)]
pub enum CatalogCommands {
    #[command(about = "Check role definitions against the permission catalog")]
    Validate,
}

pub fn handle(cmd: CatalogCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        CatalogCommands::Validate => {
            let catalog = catalog();
            match catalog.validate() {
                Ok(()) => output_success(
                    &output_format,
                    "Permission catalog is consistent",
                    Some(json!({ "permissions": catalog.permissions().len() })),
                ),
                Err(e) => {
                    output_error(&output_format, &e.to_string(), Some("CATALOG_INVALID"))?;
                    Err(e.into())
                }
            }
        }
    }
}
