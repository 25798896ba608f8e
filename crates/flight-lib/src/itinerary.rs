//! Itinerary feature derivation
//!
//! Rebuilds model attributes from human inputs the same way the training data
//! was prepared: departure clock time to minutes after midnight, minutes to a
//! time-of-day bin, calendar date to weekday (Monday = 0), and categorical
//! names to one-hot column names.

use crate::models::RequestAttributes;
use chrono::{Datelike, NaiveDate};
use thiserror::Error;

/// Categories dropped as one-hot baselines during training
pub const BASELINE_AIRLINE: &str = "Jetstar";
pub const BASELINE_AIRCRAFT: &str = "JQ501";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItineraryError {
    #[error("invalid departure time '{0}', expected 'h:mm AM|PM' or 'HH:MM'")]
    InvalidClock(String),
    #[error("invalid date '{0}', expected YYYY-MM-DD or 'DD Mon YYYY'")]
    InvalidDate(String),
}

/// Time-of-day bin used by both models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePeriod {
    Morning,
    Afternoon,
    Evening,
}

impl TimePeriod {
    /// 04:00-11:59 morning, 12:00-17:59 afternoon, everything else evening
    pub fn from_minutes(minutes: u32) -> Self {
        match minutes {
            240..=719 => TimePeriod::Morning,
            720..=1079 => TimePeriod::Afternoon,
            _ => TimePeriod::Evening,
        }
    }

    /// One-hot column for this bin; the afternoon baseline has none
    pub fn feature(&self) -> Option<&'static str> {
        match self {
            TimePeriod::Morning => Some("time_period_morning"),
            TimePeriod::Afternoon => None,
            TimePeriod::Evening => Some("time_period_evening"),
        }
    }
}

/// Parse a clock time into minutes after midnight.
///
/// Accepts 12-hour `h:mm AM|PM` (12 AM is midnight, 12 PM is noon) and
/// 24-hour `HH:MM`.
pub fn parse_clock(input: &str) -> Result<u32, ItineraryError> {
    let invalid = || ItineraryError::InvalidClock(input.to_string());
    let trimmed = input.trim();

    let (clock, period) = match trimmed.rsplit_once(char::is_whitespace) {
        Some((clock, period)) => (clock.trim(), Some(period.to_ascii_uppercase())),
        None => (trimmed, None),
    };
    let (hour, minute) = clock.split_once(':').ok_or_else(invalid)?;
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;
    if minute > 59 {
        return Err(invalid());
    }

    let hour = match period.as_deref() {
        Some("AM") if (1..=12).contains(&hour) => hour % 12,
        Some("PM") if (1..=12).contains(&hour) => hour % 12 + 12,
        None if hour < 24 => hour,
        _ => return Err(invalid()),
    };
    Ok(hour * 60 + minute)
}

/// Parse `YYYY-MM-DD` or the training data's `DD Mon YYYY`
pub fn parse_date(input: &str) -> Result<NaiveDate, ItineraryError> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d %b %Y"))
        .map_err(|_| ItineraryError::InvalidDate(input.to_string()))
}

/// Lowercase, with runs of non-alphanumerics collapsed to `_`
pub fn feature_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

/// Human-level description of a flight
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Itinerary {
    pub date: Option<NaiveDate>,
    /// Departure, in minutes after midnight
    pub departure_minutes: Option<u32>,
    pub airline: Option<String>,
    pub aircraft: Option<String>,
}

impl Itinerary {
    /// Derive model attributes. Fields left unset produce no attributes, so
    /// the materializer zero-fills and reports them.
    pub fn to_attributes(&self) -> RequestAttributes {
        let mut attrs = RequestAttributes::new();

        if let Some(date) = self.date {
            attrs.insert("day_of_week", f64::from(date.weekday().num_days_from_monday()));
        }
        if let Some(minutes) = self.departure_minutes {
            attrs.insert("time", f64::from(minutes));
            attrs.insert("scheduled_minutes", f64::from(minutes));
            if let Some(feature) = TimePeriod::from_minutes(minutes).feature() {
                attrs.insert(feature, 1.0);
            }
        }
        if let Some(airline) = &self.airline {
            if !airline.trim().eq_ignore_ascii_case(BASELINE_AIRLINE) {
                attrs.insert(format!("airline_{}", feature_slug(airline)), 1.0);
            }
        }
        if let Some(aircraft) = &self.aircraft {
            if !aircraft.trim().eq_ignore_ascii_case(BASELINE_AIRCRAFT) {
                attrs.insert(format!("aircraft_{}", feature_slug(aircraft)), 1.0);
            }
        }
        attrs
    }
}
