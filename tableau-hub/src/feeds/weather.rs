//! Open-Meteo weather feed

use super::{check_status, http_client, Feed, FeedError};
use crate::config::WeatherConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const CURRENT_FIELDS: &str =
    "temperature_2m,apparent_temperature,relative_humidity_2m,weather_code,wind_speed_10m";
const DAILY_FIELDS: &str =
    "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max";

/// Current conditions plus a short daily forecast
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub temperature: f64,
    pub feels_like: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub code: u8,
    pub description: String,
    pub temperature_unit: String,
    /// Local observation time as reported by the provider
    pub observed_at: Option<String>,
    pub forecast: Vec<DailyForecast>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyForecast {
    pub date: String,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub code: Option<u8>,
    pub description: Option<String>,
    pub precipitation_chance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentBlock,
    #[serde(default)]
    daily: Option<DailyBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    time: Option<String>,
    temperature_2m: f64,
    apparent_temperature: Option<f64>,
    relative_humidity_2m: Option<f64>,
    weather_code: u8,
    wind_speed_10m: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DailyBlock {
    time: Vec<String>,
    weather_code: Vec<Option<u8>>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    precipitation_probability_max: Vec<Option<f64>>,
}

/// WMO weather interpretation code to text
pub fn describe_weather_code(code: u8) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing drizzle",
        61 => "Light rain",
        63 => "Rain",
        65 => "Heavy rain",
        66 | 67 => "Freezing rain",
        71 => "Light snow",
        73 => "Snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unknown",
    }
}

fn into_report(response: ForecastResponse, temperature_unit: &str) -> WeatherReport {
    let current = response.current;
    let daily = response.daily.unwrap_or_default();

    let forecast = daily
        .time
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let code = daily.weather_code.get(i).copied().flatten();
            DailyForecast {
                date: date.clone(),
                high: daily.temperature_2m_max.get(i).copied().flatten(),
                low: daily.temperature_2m_min.get(i).copied().flatten(),
                code,
                description: code.map(|c| describe_weather_code(c).to_string()),
                precipitation_chance: daily.precipitation_probability_max.get(i).copied().flatten(),
            }
        })
        .collect();

    WeatherReport {
        temperature: current.temperature_2m,
        feels_like: current.apparent_temperature,
        humidity: current.relative_humidity_2m,
        wind_speed: current.wind_speed_10m,
        code: current.weather_code,
        description: describe_weather_code(current.weather_code).to_string(),
        temperature_unit: temperature_unit.to_string(),
        observed_at: current.time,
        forecast,
    }
}

pub struct WeatherFeed {
    client: reqwest::Client,
    config: WeatherConfig,
}

impl WeatherFeed {
    pub fn new(config: WeatherConfig) -> Result<Self, FeedError> {
        Ok(Self {
            client: http_client(config.timeout_seconds)?,
            config,
        })
    }
}

#[async_trait]
impl Feed<WeatherReport> for WeatherFeed {
    fn name(&self) -> &'static str {
        "weather"
    }

    async fn fetch(&self) -> Result<WeatherReport, FeedError> {
        let (Some(latitude), Some(longitude)) = (self.config.latitude, self.config.longitude) else {
            return Err(FeedError::NotConfigured("Weather location"));
        };

        let params = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("temperature_unit", self.config.temperature_unit.clone()),
            ("wind_speed_unit", self.config.wind_speed_unit.clone()),
            ("forecast_days", self.config.forecast_days.to_string()),
            ("timezone", "auto".to_string()),
        ];

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&params)
            .send()
            .await?;
        let body: ForecastResponse = check_status(response).await?.json().await?;

        debug!(code = body.current.weather_code, "Weather fetched");
        Ok(into_report(body, &self.config.temperature_unit))
    }
}
