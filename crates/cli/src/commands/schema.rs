//! Model schema inspection

use anyhow::Result;
use colored::Colorize;
use flight_lib::{ModelInfo, ModelVariant};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct FeatureRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Feature")]
    name: String,
}

/// Show the ordered feature list a served model expects
pub async fn show_schema(client: &ApiClient, variant: ModelVariant, format: OutputFormat) -> Result<()> {
    let info: ModelInfo = client.get(&format!("schema/{}", variant)).await?;

    match format {
        OutputFormat::Json => print_json(&info)?,
        OutputFormat::Table => {
            println!("{}", format!("{} model", info.variant).bold());
            println!("{}", "=".repeat(40));
            println!("Version:  {}", info.model_version.cyan());
            println!("Family:   {}", info.model_family.to_string().cyan());
            println!("Features: {}", info.features.len());
            println!();

            let rows: Vec<FeatureRow> = info
                .features
                .into_iter()
                .enumerate()
                .map(|(position, name)| FeatureRow { position, name })
                .collect();
            print_table(&rows, "Model reports no features");
        }
    }
    Ok(())
}
