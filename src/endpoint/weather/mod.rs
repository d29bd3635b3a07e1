//! Weather tool catalog served by the reference endpoint.
//!
//! Three tools, backed by a [`WeatherSource`]:
//!
//! - `search_location`: geocode a place name
//! - `get_current_weather`: conditions at a coordinate
//! - `get_weather_forecast`: daily forecast for 1 to 16 days

pub mod format;
pub mod open_meteo;

use std::sync::Arc;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub use open_meteo::OpenMeteoClient;

use crate::endpoint::dispatcher::ToolHandler;
use crate::mcp::types::McpTool;

/// Search result count when none is given.
pub const DEFAULT_LOCATION_COUNT: u32 = 5;
/// Forecast length when none (or an out-of-range value) is given.
pub const DEFAULT_FORECAST_DAYS: u32 = 7;
pub const MAX_FORECAST_DAYS: u32 = 16;

/// A geocoding match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub admin1: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub elevation: Option<f64>,
}

/// Forecast API response, trimmed to what the tools render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub current: Option<CurrentWeather>,
    #[serde(default)]
    pub daily: Option<DailyWeather>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub temperature_2m: Option<f64>,
    #[serde(default)]
    pub relative_humidity_2m: Option<f64>,
    #[serde(default)]
    pub apparent_temperature: Option<f64>,
    #[serde(default)]
    pub precipitation: Option<f64>,
    #[serde(default)]
    pub weather_code: Option<i32>,
    #[serde(default)]
    pub wind_speed_10m: Option<f64>,
    #[serde(default)]
    pub wind_direction_10m: Option<f64>,
}

/// Column-oriented daily series; index `i` of every vector is day `i`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyWeather {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    pub temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    pub weather_code: Vec<Option<i32>>,
    #[serde(default)]
    pub wind_speed_10m_max: Vec<Option<f64>>,
}

/// Where weather data comes from.
#[async_trait]
pub trait WeatherSource: Send + Sync + std::fmt::Debug {
    async fn search_locations(&self, name: &str, count: u32) -> anyhow::Result<Vec<Location>>;

    async fn current_weather(&self, latitude: f64, longitude: f64) -> anyhow::Result<WeatherReport>;

    async fn forecast(&self, latitude: f64, longitude: f64, days: u32) -> anyhow::Result<WeatherReport>;
}

/// The three weather tools, in catalog order.
pub fn weather_tools(source: Arc<dyn WeatherSource>) -> Vec<Arc<dyn ToolHandler>> {
    vec![
        Arc::new(SearchLocationTool {
            source: Arc::clone(&source),
        }),
        Arc::new(CurrentWeatherTool {
            source: Arc::clone(&source),
        }),
        Arc::new(ForecastTool { source }),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument helpers
// ─────────────────────────────────────────────────────────────────────────────

fn required_f64(args: &Map<String, Value>, key: &str) -> anyhow::Result<f64> {
    match args.get(key) {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| anyhow!("{key} is not a number")),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .with_context(|| format!("{key} is not a number")),
        _ => Err(anyhow!("{key} is required")),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn optional_i64(args: &Map<String, Value>, key: &str) -> Option<i64> {
    match args.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coordinate_schema() -> (Value, Value) {
    (
        json!({ "type": "number", "description": "Latitude coordinate (e.g., 52.52)" }),
        json!({ "type": "number", "description": "Longitude coordinate (e.g., 13.41)" }),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct SearchLocationTool {
    source: Arc<dyn WeatherSource>,
}

#[async_trait]
impl ToolHandler for SearchLocationTool {
    fn definition(&self) -> McpTool {
        McpTool {
            name: "search_location".to_string(),
            description: Some(
                "Search for a location by name to get coordinates for weather queries. \
                 Returns latitude, longitude, country and timezone. Only works with city names in English."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Location name in English (e.g., 'Berlin', 'New York', 'Tokyo')"
                    },
                    "count": {
                        "type": "integer",
                        "description": "Maximum number of results to return (default: 5)",
                        "default": DEFAULT_LOCATION_COUNT
                    }
                },
                "required": ["name"]
            }),
        }
    }

    async fn call(&self, arguments: Map<String, Value>) -> anyhow::Result<String> {
        let name = arguments
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("name is required"))?;
        let count = optional_i64(&arguments, "count")
            .filter(|&c| c > 0)
            .and_then(|c| u32::try_from(c).ok())
            .unwrap_or(DEFAULT_LOCATION_COUNT);

        let locations = self.source.search_locations(name, count).await?;
        Ok(format::format_locations(&locations))
    }
}

#[derive(Debug)]
struct CurrentWeatherTool {
    source: Arc<dyn WeatherSource>,
}

#[async_trait]
impl ToolHandler for CurrentWeatherTool {
    fn definition(&self) -> McpTool {
        let (latitude, longitude) = coordinate_schema();
        McpTool {
            name: "get_current_weather".to_string(),
            description: Some(
                "Get current weather conditions for a location using coordinates. \
                 Includes temperature, humidity, precipitation, wind and conditions."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": { "latitude": latitude, "longitude": longitude },
                "required": ["latitude", "longitude"]
            }),
        }
    }

    async fn call(&self, arguments: Map<String, Value>) -> anyhow::Result<String> {
        let latitude = required_f64(&arguments, "latitude")?;
        let longitude = required_f64(&arguments, "longitude")?;

        let report = self.source.current_weather(latitude, longitude).await?;
        if report.current.is_none() {
            return Ok(format!(
                "No weather data found for coordinates: {latitude}, {longitude}"
            ));
        }
        Ok(format::format_current(&report))
    }
}

#[derive(Debug)]
struct ForecastTool {
    source: Arc<dyn WeatherSource>,
}

#[async_trait]
impl ToolHandler for ForecastTool {
    fn definition(&self) -> McpTool {
        let (latitude, longitude) = coordinate_schema();
        McpTool {
            name: "get_weather_forecast".to_string(),
            description: Some(
                "Get the daily weather forecast for a location using coordinates, \
                 including temperature range, precipitation and conditions."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "latitude": latitude,
                    "longitude": longitude,
                    "days": {
                        "type": "integer",
                        "description": "Number of forecast days (1-16, default: 7)",
                        "default": DEFAULT_FORECAST_DAYS,
                        "minimum": 1,
                        "maximum": MAX_FORECAST_DAYS
                    }
                },
                "required": ["latitude", "longitude"]
            }),
        }
    }

    async fn call(&self, arguments: Map<String, Value>) -> anyhow::Result<String> {
        let latitude = required_f64(&arguments, "latitude")?;
        let longitude = required_f64(&arguments, "longitude")?;
        let days = optional_i64(&arguments, "days")
            .and_then(|d| u32::try_from(d).ok())
            .filter(|d| (1..=MAX_FORECAST_DAYS).contains(d))
            .unwrap_or(DEFAULT_FORECAST_DAYS);

        let report = self.source.forecast(latitude, longitude, days).await?;
        if report.daily.is_none() {
            return Ok(format!(
                "No forecast data found for coordinates: {latitude}, {longitude}"
            ));
        }
        Ok(format::format_forecast(&report))
    }
}
