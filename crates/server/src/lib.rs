//! HTTP serving layer for the flight price and delay models

pub mod api;
pub mod config;
