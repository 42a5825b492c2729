//! Common library for the Room Booking application
//!
//! This crate provides the pieces shared by the booking service that do not
//! depend on the web layer: the calendar API client, its models, and the
//! error type used for every outbound call.
//!
//! ```rust,no_run
//! use common::calendar::{CalendarClient, CalendarConfig};
//!
//! # async fn run() -> Result<(), common::error::UpstreamError> {
//! let client = CalendarClient::new(CalendarConfig::default());
//! for event in client.list_upcoming_events("access-token").await? {
//!     println!("{} {} @ {}", event.start, event.subject, event.location);
//! }
//! # Ok(())
//! # }
//! ```

pub mod calendar;
pub mod error;
