//! Booking form parsing

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use common::calendar::{NewEvent, Room};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

const LOCATION_SEPARATOR: char = '/';

/// Fields posted by the booking form
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingForm {
    pub subject: String,
    /// `email/displayName` of the room
    pub location: String,
    /// `YYYY/MM/DD`
    pub start_date: String,
    /// `HH:MM`
    pub start_time: String,
    /// Duration in minutes
    pub length: String,
}

impl BookingForm {
    /// Turn the submitted fields into a reservation
    pub fn into_event(self) -> AppResult<NewEvent> {
        let room = parse_location(&self.location)?;
        let start = parse_start(&self.start_date, &self.start_time)?;
        let length_minutes = parse_length(&self.length)?;

        NewEvent::new(self.subject, room, start, length_minutes).ok_or_else(|| {
            AppError::BadRequest(format!(
                "length '{}' puts the end of the booking out of range",
                self.length
            ))
        })
    }
}

/// Split `email/displayName`; anything after a second `/` is dropped
pub fn parse_location(location: &str) -> AppResult<Room> {
    let mut parts = location.split(LOCATION_SEPARATOR);
    let email = parts.next().unwrap_or_default();
    let display_name = parts.next().ok_or_else(|| {
        AppError::BadRequest(format!(
            "location '{location}' must be formatted as email/displayName"
        ))
    })?;

    if email.is_empty() {
        return Err(AppError::BadRequest(format!(
            "location '{location}' has no email address"
        )));
    }

    Ok(Room {
        email: email.to_string(),
        display_name: display_name.to_string(),
    })
}

/// Combine `YYYY/MM/DD` and `HH:MM` into a local date and time
pub fn parse_start(date: &str, time: &str) -> AppResult<NaiveDateTime> {
    let [year, month, day] = components::<3>(date, '/', "startDate")?;
    let [hour, minute] = components::<2>(time, ':', "startTime")?;

    let date = i32::try_from(year)
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, month, day))
        .ok_or_else(|| AppError::BadRequest(format!("startDate '{date}' is not a valid date")))?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| AppError::BadRequest(format!("startTime '{time}' is not a valid time")))?;

    Ok(date.and_time(time))
}

fn parse_length(length: &str) -> AppResult<i64> {
    match length.trim().parse::<i64>() {
        Ok(minutes) if minutes > 0 => Ok(minutes),
        _ => Err(AppError::BadRequest(format!(
            "length '{length}' must be a positive number of minutes"
        ))),
    }
}

fn components<const N: usize>(value: &str, separator: char, field: &str) -> AppResult<[u32; N]> {
    let invalid = || AppError::BadRequest(format!("{field} '{value}' is malformed"));

    let numbers = value
        .split(separator)
        .map(|part| part.trim().parse::<u32>().map_err(|_| invalid()))
        .collect::<AppResult<Vec<u32>>>()?;

    numbers.try_into().map_err(|_| invalid())
}
