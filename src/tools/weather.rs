// Weather lookup backed by the wttr.in JSON forecast

use super::{ToolError, check_status, endpoint_url, parse_endpoint};
use crate::config::WeatherConfig;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Forecast for one location and day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Forecast {
    pub date: String,
    pub location: String,
    pub avg_temperature: f64,
    pub highest_temperature: f64,
    pub lowest_temperature: f64,
    pub snowfall: f64,
    pub precipitation: f64,
    pub sunrise: String,
    pub sunset: String,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Forecast for `date`, or `None` when the service has no data for that day
    async fn forecast(&self, location: &str, date: NaiveDate) -> Result<Option<Forecast>, ToolError>;
}

pub struct WttrProvider {
    client: reqwest::Client,
    endpoint: Url,
}

impl WttrProvider {
    pub fn new(config: &WeatherConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ToolError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: parse_endpoint(&config.endpoint)?,
        })
    }

    /// `{endpoint}/{location}?format=j1` with the location as one path segment
    fn forecast_url(&self, location: &str) -> Result<Url, ToolError> {
        let mut url = endpoint_url(&self.endpoint, &[location])?;
        url.query_pairs_mut().append_pair("format", "j1");
        Ok(url)
    }
}

#[async_trait]
impl WeatherProvider for WttrProvider {
    async fn forecast(&self, location: &str, date: NaiveDate) -> Result<Option<Forecast>, ToolError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(ToolError::InvalidArguments("location is empty".to_string()));
        }

        let response = self
            .client
            .get(self.forecast_url(location)?)
            .send()
            .await?;
        let report: WttrReport = check_status(response).await?.json().await?;

        Ok(select_day(&report, location, date))
    }
}

#[derive(Debug, Deserialize)]
struct WttrReport {
    #[serde(default)]
    weather: Vec<WttrDay>,
}

#[derive(Debug, Deserialize)]
struct WttrDay {
    date: String,
    #[serde(rename = "avgtempC", default)]
    avg_temp_c: String,
    #[serde(rename = "maxtempC", default)]
    max_temp_c: String,
    #[serde(rename = "mintempC", default)]
    min_temp_c: String,
    #[serde(rename = "totalSnow_cm", default)]
    total_snow_cm: String,
    #[serde(default)]
    astronomy: Vec<WttrAstronomy>,
    #[serde(default)]
    hourly: Vec<WttrHour>,
}

#[derive(Debug, Deserialize)]
struct WttrAstronomy {
    #[serde(default)]
    sunrise: String,
    #[serde(default)]
    sunset: String,
}

#[derive(Debug, Deserialize)]
struct WttrHour {
    #[serde(rename = "precipMM", default)]
    precip_mm: String,
}

fn number(value: &str) -> f64 {
    value.trim().parse().unwrap_or_default()
}

fn select_day(report: &WttrReport, location: &str, date: NaiveDate) -> Option<Forecast> {
    let wanted = date.format("%Y-%m-%d").to_string();
    let day = report.weather.iter().find(|d| d.date == wanted)?;
    let astronomy = day.astronomy.first();

    Some(Forecast {
        date: wanted,
        location: location.to_string(),
        avg_temperature: number(&day.avg_temp_c),
        highest_temperature: number(&day.max_temp_c),
        lowest_temperature: number(&day.min_temp_c),
        snowfall: number(&day.total_snow_cm),
        precipitation: day.hourly.iter().map(|h| number(&h.precip_mm)).sum(),
        sunrise: astronomy.map(|a| a.sunrise.clone()).unwrap_or_default(),
        sunset: astronomy.map(|a| a.sunset.clone()).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "weather": [
            {
                "date": "2025-06-06",
                "avgtempC": "18",
                "maxtempC": "23",
                "mintempC": "12",
                "totalSnow_cm": "0.0",
                "astronomy": [{"sunrise": "05:14 AM", "sunset": "09:03 PM"}],
                "hourly": [{"precipMM": "0.4"}, {"precipMM": "1.1"}]
            },
            {
                "date": "2025-06-07",
                "avgtempC": "15",
                "maxtempC": "19",
                "mintempC": "9",
                "totalSnow_cm": "",
                "astronomy": [],
                "hourly": []
            }
        ]
    }"#;

    #[test]
    fn test_select_matching_day() {
        let report: WttrReport = serde_json::from_str(REPORT).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 6).unwrap();
        let forecast = select_day(&report, "Trento", date).unwrap();

        assert_eq!(forecast.location, "Trento");
        assert_eq!(forecast.highest_temperature, 23.0);
        assert_eq!(forecast.lowest_temperature, 12.0);
        assert!((forecast.precipitation - 1.5).abs() < 1e-9);
        assert_eq!(forecast.sunrise, "05:14 AM");
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let report: WttrReport = serde_json::from_str(REPORT).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 7).unwrap();
        let forecast = select_day(&report, "Trento", date).unwrap();

        assert_eq!(forecast.snowfall, 0.0);
        assert_eq!(forecast.precipitation, 0.0);
        assert!(forecast.sunset.is_empty());
    }

    #[test]
    fn test_location_is_one_path_segment() {
        let provider = WttrProvider::new(&WeatherConfig::default()).unwrap();

        assert_eq!(
            provider.forecast_url("Bolzano/Bozen").unwrap().as_str(),
            "https://wttr.in/Bolzano%2FBozen?format=j1"
        );
        assert_eq!(
            provider.forecast_url("Trento #1").unwrap().as_str(),
            "https://wttr.in/Trento%20%231?format=j1"
        );
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let config = WeatherConfig {
            endpoint: "wttr.in".to_string(),
            ..WeatherConfig::default()
        };
        assert!(matches!(WttrProvider::new(&config), Err(ToolError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_day_outside_forecast_range() {
        let report: WttrReport = serde_json::from_str(REPORT).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert!(select_day(&report, "Trento", date).is_none());
    }
}
