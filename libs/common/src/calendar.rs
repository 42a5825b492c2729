//! Calendar API client for the Room Booking application
//!
//! This module talks to the Microsoft Graph calendar endpoints: it reads the
//! signed-in user's calendar view for a time window and creates new events
//! with a room attached as a resource attendee. Every call is authenticated
//! with the bearer token of the current session.

use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info};

use crate::error::{UpstreamError, UpstreamResult};

/// Default Graph API root
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Time zone used for the `Prefer` header and for created events
pub const DEFAULT_TIMEZONE: &str = "Asia/Tokyo";

/// Number of days shown on the booking page
pub const UPCOMING_WINDOW_DAYS: i64 = 7;

const GRAPH_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DISPLAY_FORMAT: &str = "%Y/%m/%d %H:%M";

/// Configuration for the calendar client
#[derive(Debug, Clone)]
pub struct CalendarConfig {
    /// Graph API root, without trailing slash
    pub base_url: String,
    /// IANA time zone name sent to the API
    pub timezone: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

/// Calendar event as shown on the booking page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    /// Start time formatted as `YYYY/MM/DD HH:MM`
    pub start: String,
    pub subject: String,
    /// Display name of the event location
    pub location: String,
}

/// Meeting room reservation to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub subject: String,
    pub room: Room,
    /// Local start time in the calendar time zone
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Bookable room, addressed by its resource mailbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub email: String,
    pub display_name: String,
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.email, self.display_name)
    }
}

impl NewEvent {
    /// Reservation of `length_minutes` starting at `start`
    ///
    /// Returns `None` when the end falls outside the representable range.
    pub fn new(subject: String, room: Room, start: NaiveDateTime, length_minutes: i64) -> Option<Self> {
        let end = Duration::try_minutes(length_minutes)
            .and_then(|length| start.checked_add_signed(length))?;

        Some(Self {
            subject,
            room,
            start,
            end,
        })
    }

    /// Build the Graph event body for this reservation
    pub fn payload(&self, timezone: &str) -> EventPayload {
        EventPayload {
            subject: self.subject.clone(),
            start: DateTimeTimeZone::new(self.start, timezone),
            end: DateTimeTimeZone::new(self.end, timezone),
            location: Location {
                location_email_address: self.room.email.clone(),
                display_name: self.room.display_name.clone(),
            },
            attendees: vec![Attendee {
                email_address: EmailAddress {
                    address: self.room.email.clone(),
                },
                kind: AttendeeType::Resource,
            }],
        }
    }
}

/// Event body accepted by `POST /me/calendar/events`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub subject: String,
    pub start: DateTimeTimeZone,
    pub end: DateTimeTimeZone,
    pub location: Location,
    pub attendees: Vec<Attendee>,
}

/// Date and time paired with the zone it is expressed in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeTimeZone {
    pub date_time: String,
    #[serde(default)]
    pub time_zone: String,
}

impl DateTimeTimeZone {
    fn new(date_time: NaiveDateTime, timezone: &str) -> Self {
        Self {
            date_time: date_time.format(GRAPH_DATE_TIME_FORMAT).to_string(),
            time_zone: timezone.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub location_email_address: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email_address: EmailAddress,
    #[serde(rename = "type")]
    pub kind: AttendeeType,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailAddress {
    pub address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendeeType {
    Resource,
}

/// Calendar view response
#[derive(Debug, Deserialize)]
struct CalendarViewResponse {
    #[serde(default)]
    value: Vec<GraphEvent>,
}

/// Subset of the Graph event resource used for display
#[derive(Debug, Deserialize)]
struct GraphEvent {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    start: Option<DateTimeTimeZone>,
    #[serde(default)]
    location: Option<GraphLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphLocation {
    #[serde(default)]
    display_name: Option<String>,
}

impl From<GraphEvent> for CalendarEvent {
    fn from(event: GraphEvent) -> Self {
        let start = event
            .start
            .map(|start| format_start(&start.date_time))
            .unwrap_or_default();

        Self {
            start,
            subject: event.subject.unwrap_or_default(),
            location: event
                .location
                .and_then(|location| location.display_name)
                .unwrap_or_default(),
        }
    }
}

/// Format a Graph `dateTime` for display, keeping it verbatim when unparsable
fn format_start(date_time: &str) -> String {
    NaiveDateTime::parse_from_str(date_time, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|parsed| parsed.format(DISPLAY_FORMAT).to_string())
        .unwrap_or_else(|_| date_time.to_string())
}

/// Graph calendar client
#[derive(Debug, Clone)]
pub struct CalendarClient {
    http: Client,
    config: CalendarConfig,
}

impl CalendarClient {
    /// Create a new calendar client
    pub fn new(config: CalendarConfig) -> Self {
        info!("Calendar client initialized with base URL: {}", config.base_url);
        Self {
            http: Client::new(),
            config,
        }
    }

    /// Time zone used for reading and writing events
    pub fn timezone(&self) -> &str {
        &self.config.timezone
    }

    /// List the events of the upcoming week, starting now
    pub async fn list_upcoming_events(&self, access_token: &str) -> UpstreamResult<Vec<CalendarEvent>> {
        let start = Utc::now();
        let end = start + Duration::days(UPCOMING_WINDOW_DAYS);
        self.list_events(access_token, start, end).await
    }

    /// List the events between `start` and `end`, ordered by start time
    pub async fn list_events(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> UpstreamResult<Vec<CalendarEvent>> {
        info!("Fetching calendar view from {} to {}", start, end);

        let response = self
            .http
            .get(format!("{}/me/calendar/calendarView", self.config.base_url))
            .query(&[
                ("startDateTime", start.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ("endDateTime", end.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ("$orderby", "start/dateTime".to_string()),
            ])
            .bearer_auth(access_token)
            .header("Prefer", self.prefer_header())
            .send()
            .await?;

        let view: CalendarViewResponse = ensure_success(response).await?.json().await?;

        Ok(view.value.into_iter().map(CalendarEvent::from).collect())
    }

    /// Create an event in the signed-in user's calendar
    pub async fn create_event(&self, access_token: &str, event: &NewEvent) -> UpstreamResult<()> {
        info!(
            "Booking {} from {} to {}",
            event.room, event.start, event.end
        );

        let response = self
            .http
            .post(format!("{}/me/calendar/events", self.config.base_url))
            .bearer_auth(access_token)
            .header("Prefer", self.prefer_header())
            .json(&event.payload(&self.config.timezone))
            .send()
            .await?;

        ensure_success(response).await?;

        Ok(())
    }

    fn prefer_header(&self) -> String {
        format!("outlook.timezone=\"{}\"", self.config.timezone)
    }
}

/// Turn a non-success response into an upstream error carrying its body
async fn ensure_success(response: Response) -> UpstreamResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await?;
    error!("Calendar API returned {}: {}", status, body);

    Err(UpstreamError::Upstream {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_event() -> NewEvent {
        NewEvent::new("Weekly sync".to_string(), room(), start(2024, 5, 1, 23, 45), 30)
            .expect("end in range")
    }

    fn room() -> Room {
        Room {
            email: "room@x.com".to_string(),
            display_name: "Room A".to_string(),
        }
    }

    fn start(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .expect("valid date")
    }

    #[test]
    fn test_end_crosses_midnight() {
        let event = sample_event();
        assert_eq!(
            event.end.format(GRAPH_DATE_TIME_FORMAT).to_string(),
            "2024-05-02T00:15:00"
        );
    }

    #[test]
    fn test_end_out_of_range() {
        let subject = || "Weekly sync".to_string();

        assert!(NewEvent::new(subject(), room(), start(2024, 5, 1, 10, 0), 1_000_000_000_000).is_none());
        assert!(NewEvent::new(subject(), room(), start(2024, 5, 1, 10, 0), i64::MAX).is_none());
        assert!(NewEvent::new(subject(), room(), start(262142, 12, 31, 23, 59), 60).is_none());
    }

    #[test]
    fn test_payload_shape() {
        let payload = serde_json::to_value(sample_event().payload("Asia/Tokyo")).unwrap();

        assert_eq!(payload["subject"], "Weekly sync");
        assert_eq!(payload["start"]["dateTime"], "2024-05-01T23:45:00");
        assert_eq!(payload["start"]["timeZone"], "Asia/Tokyo");
        assert_eq!(payload["end"]["dateTime"], "2024-05-02T00:15:00");
        assert_eq!(payload["location"]["locationEmailAddress"], "room@x.com");
        assert_eq!(payload["location"]["displayName"], "Room A");
        assert_eq!(payload["attendees"][0]["emailAddress"]["address"], "room@x.com");
        assert_eq!(payload["attendees"][0]["type"], "resource");
        assert_eq!(payload["attendees"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_graph_event_projection() {
        let event: GraphEvent = serde_json::from_value(serde_json::json!({
            "id": "AAMk",
            "subject": "Design review",
            "start": {"dateTime": "2024-05-01T10:00:00.0000000", "timeZone": "Tokyo Standard Time"},
            "end": {"dateTime": "2024-05-01T11:00:00.0000000", "timeZone": "Tokyo Standard Time"},
            "location": {"displayName": "Room A", "locationType": "default"}
        }))
        .unwrap();

        assert_eq!(
            CalendarEvent::from(event),
            CalendarEvent {
                start: "2024/05/01 10:00".to_string(),
                subject: "Design review".to_string(),
                location: "Room A".to_string(),
            }
        );
    }

    #[test]
    fn test_graph_event_without_optional_fields() {
        let event: GraphEvent = serde_json::from_value(serde_json::json!({})).unwrap();
        let event = CalendarEvent::from(event);

        assert_eq!(event.subject, "");
        assert_eq!(event.location, "");
        assert_eq!(event.start, "");
    }

    #[test]
    fn test_format_start_keeps_unparsable_value() {
        assert_eq!(format_start("2024-05-01T10:00:00"), "2024/05/01 10:00");
        assert_eq!(format_start("tomorrow"), "tomorrow");
    }
}
