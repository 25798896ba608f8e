//! Flight Prediction CLI
//!
//! A command-line client for the flight price and delay prediction API.
//! Flight details are turned into model attributes locally, the same way
//! the training data was prepared.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{predict, schema, status};
use flight_lib::ModelVariant;

/// Flight Prediction CLI
#[derive(Parser)]
#[command(name = "flightctl")]
#[command(author, version, about = "CLI for the Flight Prediction API", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via FLIGHTCTL_API_URL env var)
    #[arg(long, env = "FLIGHTCTL_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict the ticket price of a flight
    Price(predict::FlightArgs),

    /// Predict whether a flight departs 15 minutes late or more
    Delay(predict::FlightArgs),

    /// Show the ordered features a model expects
    Schema {
        /// Model variant (price or delay)
        variant: ModelVariant,
    },

    /// Show server health and readiness
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = client::ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Price(args) => {
            predict::predict(&client, ModelVariant::Price, &args, cli.format).await?;
        }
        Commands::Delay(args) => {
            predict::predict(&client, ModelVariant::Delay, &args, cli.format).await?;
        }
        Commands::Schema { variant } => {
            schema::show_schema(&client, variant, cli.format).await?;
        }
        Commands::Status => {
            status::show_status(&client, cli.format).await?;
        }
    }

    Ok(())
}
