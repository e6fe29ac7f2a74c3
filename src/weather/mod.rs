//! Weather lookup for crisis detection.
//!
//! A day at a location is a "disaster" when its wind, precipitation, or
//! snowfall aggregate exceeds the configured thresholds.

pub mod client;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::DisasterThresholds;

pub use client::VisualCrossingClient;

/// Daily aggregates returned by the weather service (US units).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyWeather {
    /// Max wind speed, mph.
    #[serde(default)]
    pub windspeedmax: Option<f64>,
    /// Precipitation, inches.
    #[serde(default)]
    pub precip: Option<f64>,
    /// Snowfall, inches.
    #[serde(default)]
    pub snow: Option<f64>,
}

impl DailyWeather {
    pub fn is_disaster(&self, thresholds: &DisasterThresholds) -> bool {
        let exceeds = |value: Option<f64>, limit: f64| value.map(|v| v > limit).unwrap_or(false);
        exceeds(self.windspeedmax, thresholds.max_wind_mph)
            || exceeds(self.precip, thresholds.precip_inches)
            || exceeds(self.snow, thresholds.snow_inches)
    }
}

/// Errors from weather lookups. Callers treat every variant as "no crisis".
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Request timed out")]
    Timeout,
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
    #[error("Weather API error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Failed to parse weather response: {0}")]
    Parse(String),
}

/// A single-day weather lookup keyed by location and date.
#[async_trait]
pub trait WeatherLookup: Send + Sync {
    /// Returns `None` when the service has no data for that day.
    async fn daily(
        &self,
        location: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyWeather>, WeatherError>;
}
