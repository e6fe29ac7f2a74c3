//! Visual Crossing timeline API client.
//!
//! One request per (location, day):
//! `{base}/{location}/{date}/{date}?unitGroup=us&include=days&elements=windspeedmax,precip,snow`

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use url::Url;

use super::{DailyWeather, WeatherError, WeatherLookup};
use crate::types::WeatherConfig;

pub struct VisualCrossingClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    days: Vec<DailyWeather>,
}

impl VisualCrossingClient {
    pub fn new(config: &WeatherConfig, api_key: &str) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WeatherError::Network(e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn query_url(&self, location: &str, date: NaiveDate) -> Result<Url, WeatherError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| WeatherError::InvalidUrl(e.to_string()))?;
        let day = date.format("%Y-%m-%d").to_string();
        url.path_segments_mut()
            .map_err(|_| WeatherError::InvalidUrl(self.base_url.clone()))?
            .push(location)
            .push(&day)
            .push(&day);
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("unitGroup", "us")
            .append_pair("include", "days")
            .append_pair("elements", "windspeedmax,precip,snow");
        Ok(url)
    }
}

#[async_trait]
impl WeatherLookup for VisualCrossingClient {
    async fn daily(
        &self,
        location: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyWeather>, WeatherError> {
        let url = self.query_url(location, date)?;
        let resp = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                WeatherError::Timeout
            } else {
                WeatherError::Network(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WeatherError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let timeline: TimelineResponse = resp
            .json()
            .await
            .map_err(|e| WeatherError::Parse(e.to_string()))?;
        Ok(timeline.days.into_iter().next())
    }
}
