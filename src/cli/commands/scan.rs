use serde_json::json;

use crate::cli::utils::output_json;
use crate::cli::OutputFormat;
use crate::validation::detect;

pub fn handle(text: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let hit = detect(text);

    match output_format {
        OutputFormat::Json => output_json(&json!({
            "suspicious": hit.is_some(),
            "pattern": hit.map(|kind| kind.as_str()),
        })),
        OutputFormat::Text => {
            match hit {
                Some(kind) => println!("SUSPICIOUS: {}", kind),
                None => println!("clean"),
            }
            Ok(())
        }
    }
}
