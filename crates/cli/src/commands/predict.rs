//! Price and delay prediction commands

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::Args;
use colored::Colorize;
use flight_lib::itinerary::{parse_clock, parse_date};
use flight_lib::{
    Itinerary, ModelVariant, PredictionResponse, PredictionResult, RequestAttributes,
};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_delay, format_price, print_info, print_json, print_table, print_warning, OutputFormat,
};

/// Flight description shared by `price` and `delay`
#[derive(Debug, Clone, Args)]
pub struct FlightArgs {
    /// Departure date (YYYY-MM-DD or "22 Oct 2024")
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Departure time ("8:00 AM" or "08:00")
    #[arg(long, value_parser = parse_clock)]
    pub time: Option<u32>,

    /// Airline name, e.g. "Virgin Australia"
    #[arg(long)]
    pub airline: Option<String>,

    /// Aircraft code, e.g. QF402
    #[arg(long)]
    pub aircraft: Option<String>,

    /// Raw model attribute, repeatable (e.g. --attr day_of_week=4)
    #[arg(long = "attr", value_name = "NAME=VALUE", value_parser = parse_attr)]
    pub attrs: Vec<(String, f64)>,

    /// Ask the server which features were zero-filled or ignored
    #[arg(long)]
    pub strict: bool,
}

impl FlightArgs {
    /// Itinerary-derived attributes, with explicit --attr values taking
    /// precedence
    pub fn to_attributes(&self) -> RequestAttributes {
        let itinerary = Itinerary {
            date: self.date,
            departure_minutes: self.time,
            airline: self.airline.clone(),
            aircraft: self.aircraft.clone(),
        };
        let mut attrs = itinerary.to_attributes();
        for (name, value) in &self.attrs {
            attrs.insert(name.clone(), *value);
        }
        attrs
    }
}

fn parse_attr(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing attribute name in '{}'", raw));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", value.trim()))?;
    if !value.is_finite() {
        return Err(format!("'{}' is not a finite number", value));
    }
    Ok((name.to_string(), value))
}

#[derive(Tabled)]
struct AttributeRow {
    #[tabled(rename = "Attribute")]
    name: String,
    #[tabled(rename = "Value")]
    value: f64,
}

pub async fn predict(
    client: &ApiClient,
    variant: ModelVariant,
    args: &FlightArgs,
    format: OutputFormat,
) -> Result<()> {
    let attrs = args.to_attributes();
    if attrs.is_empty() {
        bail!("no flight details given; pass --date, --time, --airline, --aircraft or --attr");
    }

    let mut path = format!("predict_{}", variant);
    if args.strict {
        path.push_str("?strict=true");
    }
    let response: PredictionResponse = client.post(&path, &attrs).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => print_response(&attrs, &response),
    }
    Ok(())
}

fn print_response(attrs: &RequestAttributes, response: &PredictionResponse) {
    let mut rows: Vec<AttributeRow> = attrs
        .iter()
        .map(|(name, value)| AttributeRow {
            name: name.to_string(),
            value,
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));

    println!("{}", "Request".bold());
    print_table(&rows, "No attributes sent");
    println!();

    match &response.result {
        PredictionResult::Price { predicted_price } => {
            println!("{} {}", "Predicted price:".bold(), format_price(*predicted_price).cyan());
        }
        PredictionResult::Delay { delay_prediction } => {
            println!("{} {}", "Delay prediction:".bold(), color_delay(*delay_prediction));
        }
    }

    if let Some(diagnostics) = &response.diagnostics {
        println!();
        if diagnostics.is_clean() {
            print_info("Every model feature was supplied");
            return;
        }
        if !diagnostics.defaulted_features.is_empty() {
            print_warning(&format!(
                "{} feature(s) defaulted to 0: {}",
                diagnostics.defaulted_features.len(),
                diagnostics.defaulted_features.join(", ")
            ));
        }
        if !diagnostics.unknown_attributes.is_empty() {
            print_warning(&format!(
                "Ignored by the model: {}",
                diagnostics.unknown_attributes.join(", ")
            ));
        }
    }
}
