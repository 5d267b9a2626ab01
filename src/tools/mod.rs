// External capabilities wrapped by the sub-agents

pub mod activities;
pub mod calendar;
pub mod weather;

pub use activities::{ActivityFilter, ActivityStore, SupabaseStore};
pub use calendar::{CalendarEvent, CalendarProvider, DaySchedule, GoogleCalendar};
pub use weather::{Forecast, WeatherProvider, WttrProvider};

use chrono::NaiveDate;
use reqwest::Url;

/// Parse a `YYYY-MM-DD` date as sent by the model
pub fn parse_date(date: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| ToolError::InvalidArguments(format!("expected YYYY-MM-DD date, got '{}'", date)))
}

/// Parse a configured service endpoint
pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url, ToolError> {
    let url = Url::parse(endpoint.trim()).map_err(|e| ToolError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
    if url.cannot_be_a_base() {
        return Err(ToolError::InvalidEndpoint(endpoint.to_string()));
    }
    Ok(url)
}

/// Append path segments to `base`, percent-encoding each one
pub(crate) fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url, ToolError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ToolError::InvalidEndpoint(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ToolError::ParseError(err.to_string())
        } else {
            ToolError::NetworkError(err.to_string())
        }
    }
}

/// Turn a non-success HTTP response into a `ServiceError`
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ToolError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ToolError::ServiceError(format!("{}: {}", status, body)))
}
