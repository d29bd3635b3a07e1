//! Open-Meteo geocoding and forecast client.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

use super::{Location, WeatherReport, WeatherSource};

pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,precipitation,weather_code,wind_speed_10m,wind_direction_10m";
const DAILY_FIELDS: &str =
    "temperature_2m_max,temperature_2m_min,precipitation_sum,weather_code,wind_speed_10m_max";

/// [`WeatherSource`] backed by the public Open-Meteo APIs.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    http: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
}

impl OpenMeteoClient {
    pub fn new(
        geocoding_url: impl Into<String>,
        forecast_url: impl Into<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            geocoding_url: geocoding_url.into(),
            forecast_url: forecast_url.into(),
        })
    }

    async fn get_report(&self, query: &[(&str, String)]) -> anyhow::Result<WeatherReport> {
        let report = self
            .http
            .get(&self.forecast_url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json::<WeatherReport>()
            .await
            .context("invalid forecast response")?;
        Ok(report)
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn search_locations(&self, name: &str, count: u32) -> anyhow::Result<Vec<Location>> {
        tracing::info!(name = %name, count, "Searching for locations");
        let count = count.to_string();

        let body: Value = self
            .http
            .get(&self.geocoding_url)
            .query(&[("name", name), ("count", count.as_str()), ("format", "json")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("invalid geocoding response")?;

        match body.get("results") {
            Some(results @ Value::Array(_)) => {
                Ok(serde_json::from_value(results.clone()).context("invalid geocoding results")?)
            }
            _ => Ok(Vec::new()),
        }
    }

    async fn current_weather(&self, latitude: f64, longitude: f64) -> anyhow::Result<WeatherReport> {
        tracing::info!(latitude, longitude, "Fetching current weather");
        self.get_report(&[
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("timezone", "auto".to_string()),
        ])
        .await
    }

    async fn forecast(&self, latitude: f64, longitude: f64, days: u32) -> anyhow::Result<WeatherReport> {
        tracing::info!(latitude, longitude, days, "Fetching forecast");
        self.get_report(&[
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("timezone", "auto".to_string()),
            ("forecast_days", days.to_string()),
        ])
        .await
    }
}
