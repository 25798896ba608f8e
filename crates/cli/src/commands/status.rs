//! Server health and readiness

use anyhow::Result;
use colored::Colorize;
use flight_lib::{HealthResponse, ReadinessResponse};
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, print_json, print_success, print_table, print_warning, OutputFormat};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Serialize)]
struct StatusReport {
    health: HealthResponse,
    readiness: ReadinessResponse,
}

pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, health): (_, HealthResponse) = client.get_probe("healthz").await?;
    let (_, readiness): (_, ReadinessResponse) = client.get_probe("readyz").await?;

    match format {
        OutputFormat::Json => print_json(&StatusReport { health, readiness })?,
        OutputFormat::Table => {
            println!(
                "{} {}",
                "Server health:".bold(),
                color_status(health.status.as_str())
            );

            let mut rows: Vec<ComponentRow> = health
                .components
                .into_iter()
                .map(|(name, component)| ComponentRow {
                    name,
                    status: color_status(component.status.as_str()),
                    message: component.message.unwrap_or_default(),
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            print_table(&rows, "No components registered");

            if readiness.ready {
                print_success("Ready to serve predictions");
            } else {
                print_warning(&format!(
                    "Not ready: {}",
                    readiness.reason.as_deref().unwrap_or("no reason given")
                ));
            }
        }
    }
    Ok(())
}
