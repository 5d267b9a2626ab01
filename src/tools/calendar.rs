// Read-only calendar access through the Google Calendar v3 events API

use super::{ToolError, check_status, endpoint_url, parse_endpoint};
use crate::config::CalendarConfig;
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DAY_START: &str = "00:00";
const DAY_END: &str = "23:59";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEvent {
    pub start: String,
    pub end: String,
    pub summary: String,
}

/// All events touching one day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaySchedule {
    pub date: String,
    pub events: Vec<CalendarEvent>,
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn events_on(&self, date: NaiveDate) -> Result<DaySchedule, ToolError>;
}

pub struct GoogleCalendar {
    client: reqwest::Client,
    endpoint: Url,
    calendar_id: String,
    access_token: String,
}

impl GoogleCalendar {
    pub fn new(config: &CalendarConfig) -> Result<Self, ToolError> {
        let access_token = config
            .access_token
            .clone()
            .ok_or(ToolError::MissingCredential("GOOGLE_CALENDAR_TOKEN"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ToolError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: parse_endpoint(&config.endpoint)?,
            calendar_id: config.calendar_id.clone(),
            access_token,
        })
    }

    fn events_url(&self) -> Result<Url, ToolError> {
        endpoint_url(&self.endpoint, &["calendars", self.calendar_id.as_str(), "events"])
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendar {
    async fn events_on(&self, date: NaiveDate) -> Result<DaySchedule, ToolError> {
        let (start, end) = day_window(date, &Local)?;

        let response = self
            .client
            .get(self.events_url()?)
            .bearer_auth(&self.access_token)
            .query(&[
                ("timeMin", start.to_rfc3339()),
                ("timeMax", end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ])
            .send()
            .await?;
        let events: EventsResponse = check_status(response).await?.json().await?;

        Ok(DaySchedule {
            date: date.format("%Y-%m-%d").to_string(),
            events: day_events(&events, date, &Local),
        })
    }
}

/// First and last instant of `date` in the given timezone
fn day_window<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Result<(DateTime<Tz>, DateTime<Tz>), ToolError> {
    let start = tz
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest();
    let end = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
        .and_then(|t| tz.from_local_datetime(&date.and_time(t)).latest());

    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(ToolError::InvalidArguments(format!("no local day boundaries for {}", date))),
    }
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<EventItem>,
}

#[derive(Debug, Deserialize)]
struct EventItem {
    summary: Option<String>,
    #[serde(default)]
    start: EventTime,
    #[serde(default)]
    end: EventTime,
}

/// All-day events only carry a `date`, which is ignored: they cover the whole day
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<String>,
}

#[derive(Clone, Copy)]
enum Edge {
    Start,
    End,
}

/// `HH:MM` of an event edge on `day`, clamped to the day for all-day and
/// multi-day events
fn clock_time<Tz: TimeZone>(time: &EventTime, day: NaiveDate, edge: Edge, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let full_day = match edge {
        Edge::Start => DAY_START,
        Edge::End => DAY_END,
    };

    let Some(raw) = &time.date_time else {
        return full_day.to_string();
    };
    let Ok(parsed) = DateTime::parse_from_rfc3339(raw) else {
        return full_day.to_string();
    };

    let local = parsed.with_timezone(tz);
    if local.date_naive() != day {
        return full_day.to_string();
    }
    local.format("%H:%M").to_string()
}

fn day_events<Tz: TimeZone>(response: &EventsResponse, day: NaiveDate, tz: &Tz) -> Vec<CalendarEvent>
where
    Tz::Offset: std::fmt::Display,
{
    response
        .items
        .iter()
        .map(|item| CalendarEvent {
            start: clock_time(&item.start, day, Edge::Start, tz),
            end: clock_time(&item.end, day, Edge::End, tz),
            summary: item
                .summary
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "No title".to_string()),
        })
        .collect()
}
